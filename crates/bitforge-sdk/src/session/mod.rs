//! Session ownership
//!
//! [`SessionStore`] is the only writer of the current session. Everything
//! else reads it through a cloned [`SessionHandle`].

mod state;
mod store;

pub use state::Session;
pub use store::{SessionHandle, SessionStore};
