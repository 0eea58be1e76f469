//! Watch-backed cache of candidate path values.

mod tri_state;
mod watch_cache;

pub(crate) use tri_state::AtomicTriState;
pub use tri_state::TriState;
pub use watch_cache::*;
