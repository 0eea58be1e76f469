mod host;
mod scoped_timer;

pub use host::*;
pub(crate) use scoped_timer::*;
