//! Shared identifier types for the transfer saga workspace.

pub mod types;

pub use types::{AccountId, RunId};
