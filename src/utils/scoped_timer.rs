use tokio::time::Instant;
use tracing::trace;

/// Traces how long a scope took when dropped
pub(crate) struct ScopedTimer {
    start: Instant,
    name: &'static str,
    path: String,
}

impl ScopedTimer {
    pub(crate) fn new(
        name: &'static str,
        path: &str,
    ) -> Self {
        Self {
            start: Instant::now(),
            name,
            path: path.to_string(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        trace!(path = %self.path, "[TIMING] {} took {} ms", self.name, elapsed.as_millis());
    }
}
