//! Validation for the endpoint manifest (manifest/endpoints.toml).
//!
//! Keeps the manifest syntactically valid and in step with the facade: every
//! directory query must be listed, and every relationship endpoint must be
//! flagged as an advanced query.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Manifest {
    meta: Meta,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Meta {
    schema_version: u32,
    api_version: String,
    last_validated: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Endpoint {
    family: String,
    name: String,
    method: String,
    path: String,
    advanced: bool,
    permissions: Vec<String>,
    implemented: bool,
    #[serde(default)]
    notes: String,
}

fn load() -> Manifest {
    let content = std::fs::read_to_string("manifest/endpoints.toml")
        .expect("manifest/endpoints.toml should exist and be readable");
    toml::from_str(&content).expect("manifest/endpoints.toml should be valid TOML")
}

#[test]
fn manifest_endpoints_toml_is_valid() {
    let manifest = load();

    assert!(manifest.meta.schema_version >= 1);
    assert_eq!(manifest.meta.api_version, "v1.0");
    assert!(!manifest.endpoints.is_empty());

    for ep in &manifest.endpoints {
        assert!(!ep.family.is_empty(), "endpoint family must not be empty");
        assert!(!ep.name.is_empty(), "endpoint name must not be empty");
        assert!(ep.path.starts_with('/'), "path of '{}' must be absolute", ep.name);
    }
}

#[test]
fn manifest_lists_every_directory_query() {
    let manifest = load();
    let implemented: Vec<&str> = manifest
        .endpoints
        .iter()
        .filter(|ep| ep.implemented)
        .map(|ep| ep.name.as_str())
        .collect();

    for expected in [
        "get_token",
        "list_users",
        "list_all_users",
        "get_user_photo",
        "list_groups",
        "list_users_in_group",
        "list_groups_for_user",
        "list_devices_for_user",
        "list_devices_in_domain",
    ] {
        assert!(
            implemented.contains(&expected),
            "endpoint '{expected}' should be marked as implemented"
        );
    }
}

#[test]
fn relationship_endpoints_are_advanced_queries() {
    let manifest = load();
    for ep in &manifest.endpoints {
        let is_relationship = ["/members", "/memberOf", "/ownedDevices"]
            .iter()
            .any(|suffix| ep.path.ends_with(suffix));
        if is_relationship {
            assert!(ep.advanced, "relationship endpoint '{}' must be advanced", ep.name);
        }
    }
}

#[test]
fn directory_endpoints_are_read_only() {
    let manifest = load();
    for ep in manifest.endpoints.iter().filter(|ep| ep.family != "auth") {
        assert_eq!(ep.method, "GET", "endpoint '{}' must be a GET", ep.name);
    }
}
