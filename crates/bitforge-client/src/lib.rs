//! Rust client for the Bitforge platform REST API
//!
//! Thin wrapper over `reqwest`: attaches the bearer token, normalizes every
//! failure into an [`ErrorKind`], and exposes one typed method per route.
//! Caching, optimistic updates and polling live in `bitforge-sdk`.
//!
//! # Example
//!
//! ```rust,no_run
//! use bitforge_client::{ApiClient, ClientConfig, FileTokenStore, LoginRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tokens = Arc::new(FileTokenStore::open(std::path::Path::new("/tmp/bitforge"))?);
//! let client = ApiClient::new(ClientConfig::default(), tokens.clone())?;
//!
//! let auth = client
//!     .login(&LoginRequest {
//!         email: "neo@example.com".into(),
//!         password: "hunter2".into(),
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::ApiClient;
pub use error::{ApiErrorBody, ClientError, ErrorKind, Result};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::*;
