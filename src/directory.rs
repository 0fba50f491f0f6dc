//! Directory queries against Microsoft Graph.
//!
//! [`Directory`] is the facade the console talks to: one method per query,
//! a shared [`CredentialManager`], and a single HTTP client built lazily on
//! first use once settings are in place. No request is issued before the
//! credential has been initialized.
//!
//! Every method returns a `Result`. Failures are wrapped as
//! [`GraphError::Query`] carrying the method name and logged at `error`
//! level before being returned, so callers can treat an `Err` as "no result"
//! without losing the diagnostic.
//!
//! Queries against relationships (group members, a user's groups, a user's
//! devices) and the counted user/device lists carry
//! `ConsistencyLevel: eventual` and `$count=true`. Plain top-level lists
//! don't.

use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::auth::CredentialManager;
use crate::client::{GraphClient, DEFAULT_REQUEST_TIMEOUT, GRAPH_BASE_URL};
use crate::config::Settings;
use crate::error::{GraphError, Result};
use crate::models::{of_type, Continuation, Device, Group, ODataList, Page, User};
use crate::query::{odata_string, GraphQuery};

/// Page size for user listings.
pub const USER_PAGE_SIZE: u32 = 25;

const USER_FIELDS: &[&str] = &["displayName", "id", "mail"];
const NAME_FIELDS: &[&str] = &["displayName", "id"];

/// Group display name to member list, in the order groups were returned.
///
/// Inserting a name that is already present replaces its members in place,
/// so two groups sharing a display name collapse into one entry holding the
/// members of whichever came last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersByGroup {
    entries: Vec<(String, Vec<User>)>,
}

impl UsersByGroup {
    /// Adds a group, replacing the members of an existing entry with the
    /// same name.
    pub fn insert(&mut self, group_name: String, users: Vec<User>) {
        match self.entries.iter_mut().find(|(name, _)| *name == group_name) {
            Some(entry) => entry.1 = users,
            None => self.entries.push((group_name, users)),
        }
    }

    /// Members of the group named `group_name`.
    pub fn get(&self, group_name: &str) -> Option<&[User]> {
        self.entries
            .iter()
            .find(|(name, _)| name == group_name)
            .map(|(_, users)| users.as_slice())
    }

    /// Number of distinct group names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no groups were returned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups in the order they were first seen.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[User])> {
        self.entries
            .iter()
            .map(|(name, users)| (name.as_str(), users.as_slice()))
    }
}

fn members_query() -> GraphQuery {
    GraphQuery::new()
        .select(USER_FIELDS)
        .top(USER_PAGE_SIZE)
        .order_by(&["displayName"])
        .advanced()
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}

/// Ids are spliced into the request path, so anything that would end the
/// segment or start a query or fragment is refused.
fn require_id(value: &str, what: &str) -> Result<()> {
    require(value, what)?;
    if value.contains(['/', '\\', '?', '#', '%']) {
        return Err(GraphError::InvalidArgument(format!(
            "{what} contains characters not allowed in a path segment: {value:?}"
        )));
    }
    Ok(())
}

/// Facade over the Graph directory endpoints.
pub struct Directory {
    credentials: Arc<CredentialManager>,
    base_url: String,
    request_timeout: Duration,
    client: OnceCell<GraphClient>,
}

impl Directory {
    /// Facade against the public Graph endpoint.
    pub fn new(credentials: Arc<CredentialManager>) -> Self {
        Self::with_base_url(credentials, GRAPH_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Points the facade at a different Graph root, e.g. a mock server.
    pub fn with_base_url(
        credentials: Arc<CredentialManager>,
        base_url: &str,
        request_timeout: Duration,
    ) -> Self {
        Directory {
            credentials,
            base_url: base_url.to_string(),
            request_timeout,
            client: OnceCell::new(),
        }
    }

    /// Supplies the app registration settings. See
    /// [`CredentialManager::initialize`] for the idempotency rules.
    pub fn initialize(&self, settings: &Settings) -> Result<()> {
        self.credentials.initialize(settings)
    }

    /// The shared client, built on first use.
    fn client(&self) -> Result<&GraphClient> {
        if !self.credentials.is_initialized() {
            return Err(GraphError::NotInitialized);
        }
        self.client.get_or_try_init(|| {
            debug!(base_url = %self.base_url, "building shared graph client");
            GraphClient::with_base_url(
                Arc::clone(&self.credentials),
                &self.base_url,
                self.request_timeout,
            )
        })
    }

    async fn run<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        fut.await.map_err(|e| {
            let e = e.in_operation(operation);
            error!(operation, error = %e, "directory query failed");
            e
        })
    }

    /// Current app-only bearer token.
    pub async fn access_token(&self) -> Result<String> {
        self.run("get_token", self.credentials.get_token()).await
    }

    /// First page of users: `displayName`, `id`, `mail`, 25 per page,
    /// ordered by display name.
    pub async fn list_users(&self) -> Result<Page<User>> {
        self.run("list_users", async {
            let query = GraphQuery::new()
                .select(USER_FIELDS)
                .top(USER_PAGE_SIZE)
                .order_by(&["displayName"]);
            let list: ODataList<User> = self.client()?.get("users", &query).await?;
            Ok(Page::from(list))
        })
        .await
    }

    /// Follows the continuation of a [`Directory::list_users`] page.
    pub async fn list_users_next(&self, continuation: &Continuation) -> Result<Page<User>> {
        self.run("list_users_next", async {
            let list: ODataList<User> = self.client()?.get_url(continuation.as_str()).await?;
            Ok(Page::from(list))
        })
        .await
    }

    /// Same shaping as [`Directory::list_users`] with an exact count.
    pub async fn list_all_users(&self) -> Result<Vec<User>> {
        self.run("list_all_users", async {
            let query = GraphQuery::new()
                .select(USER_FIELDS)
                .top(USER_PAGE_SIZE)
                .order_by(&["displayName"])
                .advanced();
            let list: ODataList<User> = self.client()?.get("users", &query).await?;
            Ok(list.value)
        })
        .await
    }

    /// Raw bytes of the user's profile photo, `None` if the user has none.
    pub async fn get_user_photo(&self, user_id: &str) -> Result<Option<Bytes>> {
        self.run("get_user_photo", async {
            require_id(user_id, "user id")?;
            let client = self.client()?;
            let photo = client
                .get_bytes(&format!("users/{user_id}/photo/$value"))
                .await?;
            if photo.is_none() {
                debug!(user_id, "user has no profile photo");
            }
            Ok(photo)
        })
        .await
    }

    /// Members of every group keyed by group display name.
    ///
    /// Groups without a display name are keyed by id. Members are fetched
    /// one group at a time in server order.
    pub async fn list_users_by_group(&self) -> Result<UsersByGroup> {
        self.run("list_users_by_group", async {
            let client = self.client()?;
            let groups: ODataList<Group> = client
                .get("groups", &GraphQuery::new().select(NAME_FIELDS))
                .await?;

            let mut users_by_group = UsersByGroup::default();
            for group in groups.value {
                let members: ODataList<User> = client
                    .get(&format!("groups/{}/members", group.id), &members_query())
                    .await?;
                let name = group.display_name.unwrap_or(group.id);
                users_by_group.insert(name, of_type(members.value));
            }
            Ok(users_by_group)
        })
        .await
    }

    /// All groups (`displayName`, `id`) in server order.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.run("list_groups", async {
            let list: ODataList<Group> = self
                .client()?
                .get("groups", &GraphQuery::new().select(NAME_FIELDS))
                .await?;
            Ok(list.value)
        })
        .await
    }

    /// Users that are direct members of the group.
    pub async fn list_users_in_group(&self, group_id: &str) -> Result<Vec<User>> {
        self.run("list_users_in_group", async {
            require_id(group_id, "group id")?;
            let list: ODataList<User> = self
                .client()?
                .get(&format!("groups/{group_id}/members"), &members_query())
                .await?;
            Ok(of_type(list.value))
        })
        .await
    }

    /// Groups the user is a direct member of.
    pub async fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<Group>> {
        self.run("list_groups_for_user", async {
            require_id(user_id, "user id")?;
            let query = GraphQuery::new().select(NAME_FIELDS).advanced();
            let list: ODataList<Group> = self
                .client()?
                .get(&format!("users/{user_id}/memberOf"), &query)
                .await?;
            Ok(of_type(list.value))
        })
        .await
    }

    /// Devices owned by the user.
    pub async fn list_devices_for_user(&self, user_id: &str) -> Result<Vec<Device>> {
        self.run("list_devices_for_user", async {
            require_id(user_id, "user id")?;
            let query = GraphQuery::new().select(NAME_FIELDS).advanced();
            let list: ODataList<Device> = self
                .client()?
                .get(&format!("users/{user_id}/ownedDevices"), &query)
                .await?;
            Ok(of_type(list.value))
        })
        .await
    }

    /// Devices whose `domain` property equals `domain`.
    pub async fn list_devices_in_domain(&self, domain: &str) -> Result<Vec<Device>> {
        self.run("list_devices_in_domain", async {
            require(domain, "domain")?;
            let query = GraphQuery::new()
                .select(NAME_FIELDS)
                .filter(format!("domain eq {}", odata_string(domain)))
                .advanced();
            let list: ODataList<Device> = self.client()?.get("devices", &query).await?;
            Ok(list.value)
        })
        .await
    }
}
