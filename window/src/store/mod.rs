//! An immutable, windowed view over a large record set.
//!
//! A [Store] divides the record space into pages of `page_size` records and tracks which of those
//! pages are currently of interest, as determined by a moving _read offset_.
//!
//! # Horizons
//!
//! Two windows are derived from the read offset (see [Horizons]):
//!
//! * The _load horizon_ (`load_horizon` records in either direction) is the span of pages that must
//!   be present. Any page in this window that is not yet indexed is admitted as unrequested.
//! * The _unload horizon_ (`unload_horizon` records in either direction, unbounded by default) is
//!   the span of pages that may be retained. Pages beyond it are evicted.
//!
//! Between the two, settled (resolved or rejected) pages are retained while unsettled (unrequested
//! or pending) pages are dropped. This hysteresis avoids re-fetching pages the reader has only just
//! scrolled past, while never holding on to in-flight work the reader no longer needs.
//!
//! Resolved pages that are evicted are moved to [Store::unfetchable] until the caller acknowledges
//! their release with [Store::unfetch].
//!
//! # Stale Completions
//!
//! [Store::resolve] and [Store::reject] only apply to a page that is still pending at the given
//! offset. A fetch that completes after its page was evicted (or after another fetch settled it) is
//! ignored, so in-flight fetches never need to be cancelled explicitly.
//!
//! # Virtual Array
//!
//! [Store::get], [Store::records], and [Store::slice] address the records of all pages as a single
//! array of [Store::len] slots. Rejected pages are presumed permanently absent and do not occupy
//! any slots.
//!
//! # Example
//!
//! ```rust
//! use commonware_window::store::{Config, Store};
//!
//! let store = Store::<u64>::new(Config {
//!     page_size: 10,
//!     load_horizon: 10,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! // Start reading from the beginning
//! let store = store.set_read_offset(0);
//! let unrequested: Vec<_> = store.unrequested().cloned().collect();
//! assert_eq!(unrequested.len(), 1);
//!
//! // Fetch and resolve the first page
//! let store = store.fetch(&unrequested);
//! let store = store.resolve((0..10).collect(), 0, None);
//! assert_eq!(store.len(), 10);
//! assert_eq!(store.get(3), Some(&3));
//! ```

mod horizon;
mod records;
mod storage;

pub use horizon::{Horizons, Window};
pub use records::Records;
pub use storage::Store;

/// Aggregate facts about the record set reported by the data source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// The total number of pages in the record set, if known.
    pub total_pages: Option<u64>,
}

impl Stats {
    /// Overlay the facts known by `other` on top of `self`.
    pub fn merge(self, other: Stats) -> Self {
        Self {
            total_pages: other.total_pages.or(self.total_pages),
        }
    }
}

/// Configuration for a [Store].
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// The number of records in each page. Must be non-zero.
    pub page_size: u64,

    /// The number of records on either side of the read offset that must be loaded.
    pub load_horizon: u64,

    /// The number of records on either side of the read offset beyond which pages are evicted
    /// (`None` if unbounded). Must be at least `load_horizon`.
    pub unload_horizon: Option<u64>,

    /// The initial read offset (if any). Offsets beyond `i64::MAX` are clamped to it.
    pub read_offset: Option<u64>,

    /// What is initially known about the record set.
    pub stats: Stats,
}
