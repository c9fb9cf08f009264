//! Cancellable polling and debounced tasks

mod scheduler;

pub use scheduler::{Scheduler, TaskHandle};
