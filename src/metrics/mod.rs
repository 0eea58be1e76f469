//! Prometheus counters for lookups and the watch cache.
//!
//! Collectors are process-wide. Embedders scrape them by registering into
//! their own registry with [`register_custom_metrics`], or read the crate's
//! [`REGISTRY`] through [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;


lazy_static! {
    /// Lookups by outcome: `enabled`, `disabled`, `default` (nothing set) or `error`
    pub static ref LOOKUP_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("switch_lookup_total", "Feature switch lookups by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    /// Candidate lookups answered from an installed watch
    pub static ref CACHE_HIT_TOTAL: IntCounter = IntCounter::new(
        "switch_cache_hit_total",
        "Candidate path lookups served from the watch cache"
    )
    .expect("metric can not be created");

    /// Watch installs by result: `ok` or `failed`
    pub static ref WATCH_INSTALL_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("switch_watch_install_total", "Watch installations by result"),
        &["result"]
    )
    .expect("metric can not be created");

    /// Push events applied to cache entries, by kind
    pub static ref WATCH_EVENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("switch_watch_event_total", "Watch events applied by kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    /// Paths currently watched across all running services
    pub static ref WATCHED_PATHS: IntGauge = IntGauge::new(
        "switch_watched_paths",
        "Paths with a live watch"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry).expect("collector can be registered");
        registry
    };
}

pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(LOOKUP_TOTAL.clone()))?;
    registry.register(Box::new(CACHE_HIT_TOTAL.clone()))?;
    registry.register(Box::new(WATCH_INSTALL_TOTAL.clone()))?;
    registry.register(Box::new(WATCH_EVENT_TOTAL.clone()))?;
    registry.register(Box::new(WATCHED_PATHS.clone()))?;
    Ok(())
}

/// Text exposition of [`REGISTRY`]
pub fn encode_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode switch metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(body) => body,
        Err(e) => {
            warn!("switch metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
