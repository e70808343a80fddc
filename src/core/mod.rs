//! Core supervision types.

mod builder;
mod config;
mod membership;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::{SupervisorConfig, WatchEntry};
pub use supervisor::{Supervisor, SupervisorState};
