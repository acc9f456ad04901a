//! Drive a [crate::store::Store] against an asynchronous source of records.
//!
//! A [Dataset] owns the current store snapshot and performs the side effects that each transition
//! implies:
//!
//! * Every page the store admits (i.e. every _unrequested_ page) is fetched from the [Source] and
//!   immediately marked pending.
//! * Every page the store evicts with records still attached (i.e. every _unfetchable_ page) is
//!   released to the [Source] via [Source::unfetch] and then acknowledged.
//!
//! Fetches run concurrently and complete in any order. [Dataset::next] applies one completion at a
//! time; completions for pages that were evicted (or settled by another fetch) in the meantime are
//! dropped rather than cancelled.
//!
//! After every transition the new snapshot is handed to an [Observer].
//!
//! # Metrics
//!
//! The following metrics are registered when the [Dataset] is created:
//!
//! * `fetches`: fetches issued to the source
//! * `resolved` / `rejected`: completions applied to a pending page
//! * `stale`: completions dropped
//! * `unfetched`: evicted pages released to the source
//! * `in_flight`: fetches awaiting completion
//! * `pages`: pages currently indexed

use crate::store::{Stats, Store};
use std::{future::Future, sync::Arc};

mod engine;
mod metrics;

pub use engine::Dataset;

/// The records of a page, as returned by a [Source].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched<R> {
    /// At most one page of records. Fewer records indicate a short (final) page.
    pub records: Vec<R>,

    /// What the source learned about the record set while fetching (if anything).
    pub stats: Option<Stats>,
}

/// Source is the interface responsible for fetching pages of records.
pub trait Source: Clone + Send + 'static {
    /// The type of record served.
    type Record: Send + Sync + 'static;

    /// The error returned by a failed fetch.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the `size` records of the page at `offset`.
    fn fetch(
        &mut self,
        offset: u64,
        size: u64,
        stats: Stats,
    ) -> impl Future<Output = Result<Fetched<Self::Record>, Self::Error>> + Send;

    /// Release the records of an evicted page.
    fn unfetch(&mut self, offset: u64, records: &[Self::Record]);
}

/// Observer is notified of every new snapshot.
pub trait Observer<R> {
    fn observe(&mut self, store: &Arc<Store<R>>);
}

impl<R, F: FnMut(&Arc<Store<R>>)> Observer<R> for F {
    fn observe(&mut self, store: &Arc<Store<R>>) {
        self(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mocks, store::Config};
    use commonware_macros::test_traced;
    use futures::executor::block_on;
    use prometheus_client::{encoding::text::encode, registry::Registry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(page_size: u64, load_horizon: u64, unload_horizon: Option<u64>) -> Config {
        Config {
            page_size,
            load_horizon,
            unload_horizon,
            ..Default::default()
        }
    }

    fn ignore(_: &Arc<Store<u64>>) {}

    fn offsets(store: &Store<u64>) -> Vec<u64> {
        store.pages().map(|page| page.offset()).collect()
    }

    #[test_traced]
    fn test_dataset_invalid_config() {
        let source = mocks::Source::new(0..10u64);
        let mut registry = Registry::default();
        let result = Dataset::new(config(0, 0, None), source, ignore, &mut registry);
        assert!(matches!(result, Err(crate::Error::MissingPageSize)));
    }

    #[test_traced]
    fn test_dataset_scroll() {
        block_on(async {
            let source = mocks::Source::new(0..100u64);
            let observed = Arc::new(AtomicUsize::new(0));
            let observer = {
                let observed = observed.clone();
                move |_: &Arc<Store<u64>>| {
                    observed.fetch_add(1, Ordering::Relaxed);
                }
            };
            let mut registry = Registry::default();
            let mut dataset = Dataset::new(
                config(10, 10, Some(20)),
                source.clone(),
                observer,
                &mut registry,
            )
            .unwrap();
            assert_eq!(dataset.in_flight(), 0);
            assert!(!dataset.next().await);

            // Read from the start
            dataset.set_read_offset(0);
            assert_eq!(dataset.in_flight(), 1);
            assert_eq!(dataset.store().pending().count(), 1);
            dataset.settle().await;
            assert_eq!(dataset.in_flight(), 0);
            assert_eq!(dataset.store().get(3), Some(&3));

            // Scroll forward
            dataset.set_read_offset(25);
            assert_eq!(dataset.in_flight(), 3);
            dataset.settle().await;
            let store = dataset.store();
            assert_eq!(offsets(&store), vec![0, 1, 2, 3]);
            assert_eq!(store.len(), 40);
            assert_eq!(store.get(39), Some(&39));

            // Scroll far enough that every resolved page is released
            dataset.set_read_offset(75);
            assert!(dataset.store().unfetchable().is_empty());
            assert_eq!(
                source.unfetched(),
                vec![(0, 10), (1, 10), (2, 10), (3, 10)]
            );
            dataset.settle().await;
            let store = dataset.store();
            assert_eq!(offsets(&store), vec![6, 7, 8]);
            assert_eq!(store.len(), 90);
            assert_eq!(store.get(65), Some(&65));

            let mut fetched = source.fetched();
            fetched.sort();
            assert_eq!(fetched, vec![0, 1, 2, 3, 6, 7, 8]);
            assert_eq!(observed.load(Ordering::Relaxed), 11);

            let mut buffer = String::new();
            encode(&mut buffer, &registry).unwrap();
            assert!(buffer.contains("fetches_total 7\n"));
            assert!(buffer.contains("resolved_total 7\n"));
            assert!(buffer.contains("rejected_total 0\n"));
            assert!(buffer.contains("stale_total 0\n"));
            assert!(buffer.contains("unfetched_total 4\n"));
            assert!(buffer.contains("in_flight 0\n"));
            assert!(buffer.contains("pages 3\n"));
        });
    }

    #[test_traced]
    fn test_dataset_rejection() {
        block_on(async {
            let source = mocks::Source::new(0..100u64);
            source.fail(1);
            let mut registry = Registry::default();
            let mut dataset =
                Dataset::new(config(10, 10, None), source, ignore, &mut registry).unwrap();
            dataset.set_read_offset(15);
            dataset.settle().await;

            // The rejected page is removed from the virtual array
            let store = dataset.store();
            assert_eq!(store.rejected().count(), 1);
            let error = store.page(1).unwrap().error().unwrap().to_string();
            assert_eq!(error, "page unavailable: 1");
            assert_eq!(store.len(), 20);
            assert_eq!(store.get(9), Some(&9));
            assert_eq!(store.get(10), Some(&20));

            let mut buffer = String::new();
            encode(&mut buffer, &registry).unwrap();
            assert!(buffer.contains("resolved_total 2\n"));
            assert!(buffer.contains("rejected_total 1\n"));
        });
    }

    #[test_traced]
    fn test_dataset_stale_completion() {
        block_on(async {
            let source = mocks::Source::new(0..1_000u64);
            let gate = source.hold(0);
            let mut registry = Registry::default();
            let mut dataset =
                Dataset::new(config(10, 0, Some(0)), source.clone(), ignore, &mut registry)
                    .unwrap();

            // Scroll away before the first page arrives
            dataset.set_read_offset(0);
            dataset.set_read_offset(500);
            assert_eq!(dataset.in_flight(), 2);
            assert_eq!(offsets(&dataset.store()), vec![50]);

            // The late completion does not resurrect the evicted page
            gate.send(()).unwrap();
            dataset.settle().await;
            let store = dataset.store();
            assert_eq!(offsets(&store), vec![50]);
            assert_eq!(store.resolved().count(), 1);
            assert_eq!(store.get(500), Some(&500));
            assert!(source.unfetched().is_empty());

            let mut buffer = String::new();
            encode(&mut buffer, &registry).unwrap();
            assert!(buffer.contains("stale_total 1\n"));
            assert!(buffer.contains("resolved_total 1\n"));
        });
    }

    #[test_traced]
    fn test_dataset_total_pages() {
        block_on(async {
            let source = mocks::Source::new(0..25u64).with_total();
            let mut registry = Registry::default();
            let mut dataset =
                Dataset::new(config(10, 50, None), source, ignore, &mut registry).unwrap();

            // Before the total is known, the whole load horizon is fetched
            dataset.set_read_offset(0);
            assert_eq!(dataset.in_flight(), 5);
            dataset.settle().await;

            // Pages beyond the reported total are dropped
            let store = dataset.store();
            assert_eq!(store.stats().total_pages, Some(3));
            assert_eq!(offsets(&store), vec![0, 1, 2]);
            assert_eq!(store.len(), 30);
            assert_eq!(store.get(24), Some(&24));
            assert_eq!(store.get(25), None);
            assert!(store.unfetchable().is_empty());
        });
    }

    #[test_traced]
    fn test_dataset_initial_read_offset() {
        block_on(async {
            let source = mocks::Source::new(0..100u64);
            let mut registry = Registry::default();
            let cfg = Config {
                read_offset: Some(42),
                ..config(10, 0, None)
            };
            let mut dataset = Dataset::new(cfg, source.clone(), ignore, &mut registry).unwrap();
            assert_eq!(dataset.in_flight(), 1);
            assert!(dataset.next().await);
            assert!(!dataset.next().await);
            assert_eq!(source.fetched(), vec![4]);
            assert_eq!(dataset.store().page(4).unwrap().records()[2], 42);
        });
    }
}
