//! Resolve and merge tuned profile hierarchies to inspect the configuration
//! the daemon would apply, without applying it.

pub mod cli;
pub mod config;
pub mod error;
pub mod profile;

pub use error::{ProfileError, ProfileResult};
