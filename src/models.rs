//! Read-only projections of Graph directory objects.
//!
//! Field names use camelCase to match the Graph wire format. Every property
//! except `id` is optional because `$select` and tenant data decide what the
//! server sends back.

use serde::{Deserialize, Serialize};

/// Implemented by the directory object kinds the facade returns.
///
/// Relationship collections (`members`, `memberOf`, `ownedDevices`) mix
/// users, groups, devices and service principals; each item carries
/// `@odata.type`, which [`of_type`] uses to keep only the requested kind.
pub trait DirectoryEntity {
    /// Graph type discriminator, e.g. `#microsoft.graph.user`.
    const ODATA_TYPE: &'static str;

    /// The item's `@odata.type`, if the server sent one.
    fn odata_type(&self) -> Option<&str>;
}

/// A Graph user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Directory object id.
    pub id: String,
    /// Display name, if set.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Primary SMTP address, if set.
    #[serde(default)]
    pub mail: Option<String>,
    /// Type tag, only present in relationship collections.
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
}

/// A Graph group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Directory object id.
    pub id: String,
    /// Display name, if set.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Type tag, only present in relationship collections.
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
}

/// A Graph (Entra-registered) device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Directory object id.
    pub id: String,
    /// Display name, if set.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Type tag, only present in relationship collections.
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
}

impl DirectoryEntity for User {
    const ODATA_TYPE: &'static str = "#microsoft.graph.user";

    fn odata_type(&self) -> Option<&str> {
        self.odata_type.as_deref()
    }
}

impl DirectoryEntity for Group {
    const ODATA_TYPE: &'static str = "#microsoft.graph.group";

    fn odata_type(&self) -> Option<&str> {
        self.odata_type.as_deref()
    }
}

impl DirectoryEntity for Device {
    const ODATA_TYPE: &'static str = "#microsoft.graph.device";

    fn odata_type(&self) -> Option<&str> {
        self.odata_type.as_deref()
    }
}

/// Keeps items whose `@odata.type` matches `T`. Untagged items are kept;
/// top-level collections don't tag their entries.
pub fn of_type<T: DirectoryEntity>(items: Vec<T>) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| item.odata_type().map_or(true, |t| t == T::ODATA_TYPE))
        .collect()
}

/// OData collection wrapper returned by list endpoints.
#[derive(Debug, Deserialize)]
pub struct ODataList<T> {
    /// Items of this page.
    pub value: Vec<T>,
    /// Absolute URL of the next page, present iff more results exist.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
    /// Total count, only sent when `$count=true` was requested.
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
}

/// Opaque marker for the next page of a server-paginated result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation(String);

impl Continuation {
    /// The absolute next-page URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a server-paginated result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items of this page, in server order.
    pub items: Vec<T>,
    /// Present iff more pages exist.
    pub continuation: Option<Continuation>,
}

impl<T> Page<T> {
    /// True when a further page can be fetched.
    pub fn has_more(&self) -> bool {
        self.continuation.is_some()
    }
}

impl<T> From<ODataList<T>> for Page<T> {
    fn from(list: ODataList<T>) -> Self {
        Page {
            items: list.value,
            continuation: list
                .next_link
                .filter(|link| !link.is_empty())
                .map(Continuation),
        }
    }
}
