//! Configuration loading: a TOML file with environment overrides.
//!
//! The client secret is never read from the file. It comes from the
//! `GRAPH_CLIENT_SECRET` environment variable (or `--secret`) and is joined
//! with the file's tenant/client ids into [`Settings`].

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{GraphError, Result};

/// Environment variable holding the app registration's client secret.
pub const CLIENT_SECRET_ENV: &str = "GRAPH_CLIENT_SECRET";
/// Environment override for `settings.tenant_id`.
pub const TENANT_ID_ENV: &str = "GRAPH_TENANT_ID";
/// Environment override for `settings.client_id`.
pub const CLIENT_ID_ENV: &str = "GRAPH_CLIENT_ID";

/// Default configuration file, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "graph-client.toml";

/// Identity of the app registration used for app-only authentication.
///
/// Immutable once built. `Debug` redacts the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl Settings {
    /// Settings are not checked here; see [`Settings::validate`].
    pub fn new(tenant_id: &str, client_id: &str, client_secret: &str) -> Self {
        Settings {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Azure AD tenant (directory) id.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Application (client) id of the app registration.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret of the app registration.
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Fails with [`GraphError::Configuration`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(GraphError::Configuration(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Root of `graph-client.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[settings]`
    pub settings: IdentityConfig,
    /// `[graph]`
    pub graph: GraphConfig,
    /// `[photos]`
    pub photos: PhotoConfig,
    /// `[domains]`
    pub domains: DomainConfig,
    /// `[logging]`
    pub logging: LoggingConfig,
}

/// App registration ids. The secret never lives here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Azure AD tenant id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
}

/// Endpoints and request deadline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Graph root, e.g. `https://graph.microsoft.com/v1.0/`.
    pub base_url: String,
    /// Azure AD authority the token path is appended to.
    pub authority: String,
    /// Deadline for one Graph request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            base_url: crate::client::GRAPH_BASE_URL.to_string(),
            authority: crate::auth::DEFAULT_AUTHORITY.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl GraphConfig {
    /// Request deadline, at least one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Where profile photos go and whether they are opened.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// Relative paths resolve against the working directory.
    pub directory: String,
    /// Open each saved photo in the default viewer.
    pub open_viewer: bool,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        PhotoConfig {
            directory: "Trials/ProfilePhotos".to_string(),
            open_viewer: false,
        }
    }
}

/// Domains offered by the "devices by domain" menu entry. When empty the
/// console asks for a domain name instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Domain names, in menu order.
    pub names: Vec<String>,
}

/// Log filter used when `RUST_LOG` is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parses a configuration document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GraphError::Configuration(format!("invalid configuration: {e}")))
    }

    /// Reads `path`. A missing file yields the defaults; any other read or
    /// parse failure is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    path = %path.display(),
                    "configuration file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(GraphError::Configuration(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Applies `GRAPH_TENANT_ID`, `GRAPH_CLIENT_ID` and `RUST_LOG` from the
    /// process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Same as [`AppConfig::apply_env_overrides`] with an explicit lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(tenant_id) = lookup(TENANT_ID_ENV) {
            self.settings.tenant_id = tenant_id;
        }
        if let Some(client_id) = lookup(CLIENT_ID_ENV) {
            self.settings.client_id = client_id;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Joins the configured ids with the environment-provided secret.
    ///
    /// A missing or empty secret is a fatal configuration error.
    pub fn settings(&self, client_secret: Option<&str>) -> Result<Settings> {
        let secret = client_secret
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                GraphError::Configuration(format!(
                    "{CLIENT_SECRET_ENV} environment variable is not set"
                ))
            })?;
        let settings = Settings::new(&self.settings.tenant_id, &self.settings.client_id, secret);
        settings.validate()?;
        Ok(settings)
    }
}
