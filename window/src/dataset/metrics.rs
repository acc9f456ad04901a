use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for a [super::Dataset].
#[derive(Default)]
pub struct Metrics {
    /// Number of fetches issued to the source.
    pub fetches: Counter,
    /// Number of fetches that resolved a pending page.
    pub resolved: Counter,
    /// Number of fetches that rejected a pending page.
    pub rejected: Counter,
    /// Number of completions dropped because their page was no longer pending.
    pub stale: Counter,
    /// Number of evicted pages released back to the source.
    pub unfetched: Counter,
    /// Number of fetches awaiting completion.
    pub in_flight: Gauge,
    /// Number of pages currently indexed.
    pub pages: Gauge,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "fetches",
            "Number of fetches issued to the source",
            metrics.fetches.clone(),
        );
        registry.register(
            "resolved",
            "Number of fetches that resolved a pending page",
            metrics.resolved.clone(),
        );
        registry.register(
            "rejected",
            "Number of fetches that rejected a pending page",
            metrics.rejected.clone(),
        );
        registry.register(
            "stale",
            "Number of completions dropped because their page was no longer pending",
            metrics.stale.clone(),
        );
        registry.register(
            "unfetched",
            "Number of evicted pages released back to the source",
            metrics.unfetched.clone(),
        );
        registry.register(
            "in_flight",
            "Number of fetches awaiting completion",
            metrics.in_flight.clone(),
        );
        registry.register(
            "pages",
            "Number of pages currently indexed",
            metrics.pages.clone(),
        );
        metrics
    }
}
