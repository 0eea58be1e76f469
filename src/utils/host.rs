#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::ConnectivityError;
use crate::Result;

/// Source of the name used by the host override tier
#[cfg_attr(test, automock)]
pub trait HostnameResolver: Send + Sync + 'static {
    fn local_hostname(&self) -> Result<String>;
}

/// Asks the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHostname;

impl HostnameResolver for SystemHostname {
    fn local_hostname(&self) -> Result<String> {
        local_hostname()
    }
}

/// Name of the local machine as used by the host override tier
pub(crate) fn local_hostname() -> Result<String> {
    let name = hostname::get().map_err(|e| ConnectivityError::Hostname(e.to_string()))?;
    let name = name
        .into_string()
        .map_err(|raw| ConnectivityError::Hostname(format!("hostname {raw:?} is not valid UTF-8")))?;

    if name.is_empty() {
        return Err(ConnectivityError::Hostname("hostname is empty".to_string()).into());
    }

    debug!(hostname = %name, "Resolved local hostname");
    Ok(name)
}
