//! Shared fixtures for unit tests: a connected in-process store, mock watch
//! builders and polling helpers for push-driven state.
mod common;
mod mock;

pub use common::*;
pub use mock::*;
