//! Feature key naming rules and candidate path expansion.

mod path_builder;
mod validation;

pub use path_builder::*;
pub use validation::*;
