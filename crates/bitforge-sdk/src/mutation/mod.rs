//! Optimistic mutations
//!
//! Every state-changing action goes through [`MutationExecutor`]: local patch,
//! remote call, then commit (server wins) or rollback (snapshot restored).

mod executor;
mod pending;

pub use executor::{Mutation, MutationExecutor, MutationOutcome, Patch};
pub use pending::{changed_fields, MutationStatus, PendingMutation};
