//! Boolean feature switches resolved from a watchable coordination store.
//!
//! A switch lookup walks an override chain, most specific first:
//!
//! ```text
//! <namespace><key>/<application>/<hostname>
//! <namespace><key>/<application>
//! <namespace><key>/<hostname>
//! <namespace><key>
//! ```
//!
//! The first path holding a recognized value decides; nothing set means off.
//! Every path consulted is watched once and kept current by store pushes, so
//! repeated lookups are served from memory.
//!
//! ## Quick start
//!
//! ```ignore
//! use d_switch::{FeatureSwitch, FeatureSwitchService};
//!
//! let service = FeatureSwitchService::from_env()?;
//! service.set_application_name("checkout")?;
//! service.start().await?;
//!
//! if service.is_enabled("new-flow").await? {
//!     // ...
//! }
//!
//! service.stop().await?;
//! ```

mod cache;
mod config;
mod constants;
mod coordination;
mod errors;
mod key;
pub mod metrics;
mod resolver;
mod service;
mod utils;

pub use cache::*;
pub use config::*;
pub use constants::*;
pub use coordination::*;
pub use errors::*;
pub use key::*;
pub use resolver::*;
pub use service::*;
pub use utils::HostnameResolver;
#[cfg(test)]
pub use utils::MockHostnameResolver;
pub use utils::SystemHostname;

//-----------------------------------------------------------
// Test utils


#[cfg(test)]
pub mod test_utils;
