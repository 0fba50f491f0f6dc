//! Async Rust client for Microsoft Graph directory queries with app-only auth.
//!
//! Provides OAuth2 client-credentials authentication, an authenticated HTTP
//! client with 401 retry, and a facade of read-only directory queries
//! (users, groups, devices, profile photos) driven by a numbered console
//! menu.
//!
//! # Modules
//!
//! - [`auth`]: Client-credentials token provider and credential manager.
//! - [`client`]: Authenticated HTTP wrapper for the Graph REST API.
//! - [`config`]: TOML configuration, environment overrides, [`config::Settings`].
//! - [`console`]: Interactive menu loop.
//! - [`directory`]: One method per directory query.
//! - [`error`]: Typed error hierarchy (`GraphError`).
//! - [`models`]: Users, groups, devices and paging types.
//! - [`photos`]: Profile photo storage.
//! - [`query`]: OData query shaping.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use graph_client::auth::CredentialManager;
//! use graph_client::config::Settings;
//! use graph_client::directory::Directory;
//!
//! let directory = Directory::new(Arc::new(CredentialManager::new()));
//! directory.initialize(&Settings::new("tenant", "client_id", "secret"))?;
//! let groups = directory.list_groups().await?;
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod directory;
pub mod error;
pub mod models;
pub mod photos;
pub mod query;
