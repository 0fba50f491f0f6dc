//! Typed error hierarchy for the graph-client crate.
//!
//! Every variant maps to a real boundary: configuration loading, the Azure AD
//! token endpoint, the Microsoft Graph REST API, local disk. Facade
//! operations wrap whatever went wrong in [`GraphError::Query`] so the
//! operation name travels with the cause.

use reqwest::StatusCode;

/// Unified error type for all graph-client library operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Settings are missing, empty, or contradict settings already in use.
    /// Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Token issuance failed at the Azure AD token endpoint, or no
    /// credential has been initialized (then `source` is
    /// [`GraphError::NotInitialized`]).
    ///
    /// `message` carries the HTTP status and the AADSTS error body when the
    /// identity provider rejected the request.
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable description of the authentication failure.
        message: String,
        /// The underlying transport or parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A directory query was attempted before settings were supplied.
    #[error("graph has not been initialized for app-only auth")]
    NotInitialized,

    /// A required input (user id, group id, domain) was empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The Graph API returned a non-success HTTP status code. The body is
    /// kept because Graph error payloads carry the diagnostic code.
    #[error("API error {status}: {body}")]
    Api {
        /// The HTTP status code returned by Graph.
        status: StatusCode,
        /// The raw response body, or an empty string if unreadable.
        body: String,
    },

    /// JSON deserialization of a response body failed.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// DNS, TCP, TLS or deadline failure. No status code is available.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Local filesystem failure while storing a profile photo.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A directory facade operation failed. `operation` names the facade
    /// method so log lines and console output can be correlated.
    #[error("{operation} failed: {source}")]
    Query {
        /// Facade operation name, e.g. `list_users`.
        operation: &'static str,
        /// What actually went wrong.
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Builds an [`GraphError::Auth`] without an underlying cause.
    pub fn auth(message: impl Into<String>) -> Self {
        GraphError::Auth {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps `self` as a failure of the named facade operation.
    ///
    /// An error that is already a `Query` keeps its original operation name.
    pub fn in_operation(self, operation: &'static str) -> Self {
        match self {
            err @ GraphError::Query { .. } => err,
            other => GraphError::Query {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost non-`Query` error.
    pub fn root(&self) -> &GraphError {
        match self {
            GraphError::Query { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the failure means "no credential yet", either at the
    /// facade or as the cause of an [`GraphError::Auth`].
    pub fn is_not_initialized(&self) -> bool {
        match self.root() {
            GraphError::NotInitialized => true,
            GraphError::Auth {
                source: Some(source),
                ..
            } => matches!(
                source.downcast_ref::<GraphError>(),
                Some(GraphError::NotInitialized)
            ),
            _ => false,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, GraphError>;
