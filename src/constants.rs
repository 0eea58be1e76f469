/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "/zkfss/";

pub const DEFAULT_CONNECT_STRING: &str = "localhost:2181";

pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Path separator of the coordination tree
pub const PATH_SEPARATOR: char = '/';
