use super::{metrics::Metrics, Fetched, Observer, Source};
use crate::{
    store::{Config, Store},
    Error,
};
use futures::{stream::FuturesUnordered, StreamExt};
use prometheus_client::registry::Registry;
use std::{future::Future, pin::Pin, sync::Arc};
use tracing::{debug, trace, warn};

/// The outcome of a fetch, tagged with the offset of the page it was issued for.
struct Completion<R, E> {
    offset: u64,
    result: Result<Fetched<R>, E>,
}

type InFlight<R, E> = FuturesUnordered<Pin<Box<dyn Future<Output = Completion<R, E>> + Send>>>;

/// Drives a [Store] against a [Source].
///
/// Every transition of the underlying store is followed by a sync: each unrequested page is
/// fetched from the source and each unfetchable page is released back to it. The resulting
/// snapshot is then handed to the [Observer].
pub struct Dataset<S: Source, O: Observer<S::Record>> {
    source: S,
    observer: O,
    store: Arc<Store<S::Record>>,
    in_flight: InFlight<S::Record, S::Error>,
    metrics: Metrics,
}

impl<S: Source, O: Observer<S::Record>> Dataset<S, O> {
    /// Create a new [Dataset], registering its metrics with `registry`.
    ///
    /// If `cfg.read_offset` is set, the pages within its load horizon are fetched immediately.
    pub fn new(
        cfg: Config,
        source: S,
        observer: O,
        registry: &mut Registry,
    ) -> Result<Self, Error> {
        let store = Store::new(cfg)?;
        let mut dataset = Self {
            source,
            observer,
            store: Arc::new(store.clone()),
            in_flight: FuturesUnordered::new(),
            metrics: Metrics::init(registry),
        };
        dataset.apply(store);
        Ok(dataset)
    }

    /// The current snapshot.
    pub fn store(&self) -> Arc<Store<S::Record>> {
        self.store.clone()
    }

    /// The number of fetches awaiting completion (including those whose page has since been
    /// evicted).
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Move the read offset to `offset`.
    pub fn set_read_offset(&mut self, offset: i64) {
        debug!(offset, "moving read offset");
        let store = self.store.set_read_offset(offset);
        self.apply(store);
    }

    /// Wait for the next in-flight fetch to complete and apply it.
    ///
    /// Returns `false` if no fetches are in flight. Completions for pages that are no longer
    /// pending are dropped.
    pub async fn next(&mut self) -> bool {
        let Some(Completion { offset, result }) = self.in_flight.next().await else {
            return false;
        };
        self.metrics.in_flight.set(self.in_flight.len() as i64);
        if !self.store.page(offset).is_some_and(|page| page.is_pending()) {
            debug!(offset, "dropping stale completion");
            self.metrics.stale.inc();
            return true;
        }

        let store = match result {
            Ok(Fetched { records, stats }) => {
                trace!(offset, records = records.len(), "fetch resolved");
                self.metrics.resolved.inc();
                self.store.resolve(records, offset, stats)
            }
            Err(err) => {
                warn!(offset, ?err, "fetch failed");
                self.metrics.rejected.inc();
                self.store.reject(err, offset, None)
            }
        };
        self.apply(store);
        true
    }

    /// Apply every in-flight fetch (including those issued while settling).
    pub async fn settle(&mut self) {
        while self.next().await {}
    }

    /// Fetch unrequested pages, release unfetchable pages, and publish the result.
    fn apply(&mut self, store: Store<S::Record>) {
        let unrequested: Vec<_> = store.unrequested().cloned().collect();
        let stats = store.stats();
        for page in &unrequested {
            let offset = page.offset();
            let size = page.size();
            let mut source = self.source.clone();
            self.in_flight.push(Box::pin(async move {
                let result = source.fetch(offset, size, stats).await;
                Completion { offset, result }
            }));
            trace!(offset, "fetching page");
            self.metrics.fetches.inc();
        }
        let store = store.fetch(&unrequested);

        let unfetchable = store.unfetchable().to_vec();
        for page in &unfetchable {
            debug!(offset = page.offset(), "releasing page");
            self.source.unfetch(page.offset(), page.records());
            self.metrics.unfetched.inc();
        }
        let store = store.unfetch(&unfetchable);

        self.metrics.in_flight.set(self.in_flight.len() as i64);
        self.metrics.pages.set(store.pages().count() as i64);
        self.store = Arc::new(store);
        self.observer.observe(&self.store);
    }
}
