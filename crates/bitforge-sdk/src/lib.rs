//! Bitforge SDK - client-side data sync for the Bitforge platform
//!
//! Sits between screens and the REST API ([`bitforge_client`]):
//!
//! - **Entity cache**: fetched records keyed by `(kind, id)`, plus ordered
//!   lists keyed by their full query
//! - **Mutation executor**: optimistic local patch, then commit with the
//!   server's representation or roll back to the snapshot
//! - **Scheduler**: cancellable polling and debounced tasks
//! - **Session store**: the single writer of the signed-in identity
//! - **Views**: one binding per screen, publishing a [`ViewState`]
//!
//! # Example
//!
//! ```rust,ignore
//! use bitforge_sdk::{AppContext, SyncConfig, views::{ProfileView, View}};
//!
//! let ctx = AppContext::new(client, SyncConfig::default());
//! ctx.session.restore().await?;
//!
//! let profile = ProfileView::new(ctx.clone(), "u2");
//! profile.load().await;
//! profile.follow().await?; // label flips to "Linked" before the server answers
//! ```

// Local cache of remote entities
pub mod cache;

// Entity trait and kinds
pub mod entity;

// Optimistic mutations
pub mod mutation;

// Polling and debounce
pub mod schedule;

// Signed-in identity
pub mod session;

// Role-based capabilities
pub mod capability;

// Local input checks
pub mod validation;

// Timing configuration
pub mod config;

// Shared collaborators
pub mod context;

// Screen bindings
pub mod views;

// Error types
pub mod error;

pub use cache::{CacheEvent, EntityCache, QueryKey};
pub use capability::{capabilities, Capability, CapabilitySet};
pub use config::SyncConfig;
pub use context::AppContext;
pub use entity::{Entity, EntityKind};
pub use error::{Result, SdkError};
pub use mutation::{Mutation, MutationExecutor, MutationOutcome, MutationStatus, PendingMutation};
pub use schedule::{Scheduler, TaskHandle};
pub use session::{Session, SessionHandle, SessionStore};
pub use views::{View, ViewState};

pub use bitforge_client::{ApiClient, ClientConfig, ClientError, ErrorKind};
