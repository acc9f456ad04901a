use super::{Config, Horizons, Records, Stats};
use crate::{
    index::Index,
    page::{Page, Rejection},
    Error,
};
use std::{ops::RangeBounds, sync::Arc};
use tracing::{debug, trace};

/// An immutable snapshot of a windowed record set.
///
/// Every transition (`set_read_offset`, `fetch`, `unfetch`, `resolve`, `reject`) returns a new
/// [Store] and leaves the receiver untouched. Pages not affected by a transition are shared (by
/// [Arc]) between the old and new snapshot.
#[derive(Debug)]
pub struct Store<R> {
    page_size: u64,
    load_horizon: u64,
    unload_horizon: Option<u64>,
    read_offset: Option<u64>,
    stats: Stats,

    // The pages currently within the unload horizon, keyed by offset.
    pages: Index<R>,

    // Resolved pages evicted from `pages` whose records have not yet been released.
    unfetchable: Vec<Arc<Page<R>>>,

    // Derived from `pages` and `stats` whenever either changes.
    len: u64,
    rejected_offsets: Vec<u64>,
}

impl<R> Clone for Store<R> {
    fn clone(&self) -> Self {
        Self {
            page_size: self.page_size,
            load_horizon: self.load_horizon,
            unload_horizon: self.unload_horizon,
            read_offset: self.read_offset,
            stats: self.stats,
            pages: self.pages.clone(),
            unfetchable: self.unfetchable.clone(),
            len: self.len,
            rejected_offsets: self.rejected_offsets.clone(),
        }
    }
}

impl<R> Store<R> {
    /// Create a new [Store] from the given configuration.
    ///
    /// If `cfg.read_offset` is set, the pages within its load horizon are admitted immediately.
    /// Like [Store::set_read_offset], the read offset is limited to `i64::MAX`.
    pub fn new(cfg: Config) -> Result<Self, Error> {
        if cfg.page_size == 0 {
            return Err(Error::MissingPageSize);
        }
        if let Some(unload) = cfg.unload_horizon {
            if unload < cfg.load_horizon {
                return Err(Error::InvalidHorizons {
                    load: cfg.load_horizon,
                    unload,
                });
            }
        }
        let mut store = Self {
            page_size: cfg.page_size,
            load_horizon: cfg.load_horizon,
            unload_horizon: cfg.unload_horizon,
            read_offset: cfg.read_offset.map(|offset| offset.min(i64::MAX as u64)),
            stats: cfg.stats,
            pages: Index::new(),
            unfetchable: Vec::new(),
            len: 0,
            rejected_offsets: Vec::new(),
        };
        store.update();
        Ok(store)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn load_horizon(&self) -> u64 {
        self.load_horizon
    }

    /// The unload horizon (`None` if unbounded).
    pub fn unload_horizon(&self) -> Option<u64> {
        self.unload_horizon
    }

    /// The record index currently being read (`None` until first set).
    pub fn read_offset(&self) -> Option<u64> {
        self.read_offset
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The horizons for the current read offset (`None` until a read offset is set).
    pub fn horizons(&self) -> Option<Horizons> {
        let read_offset = self.read_offset?;
        Some(self.horizons_at(read_offset))
    }

    /// Return a new [Store] reading from `offset`. Negative offsets are clamped to zero.
    pub fn set_read_offset(&self, offset: i64) -> Self {
        let mut next = self.clone();
        next.read_offset = Some(offset.max(0) as u64);
        next.update();
        next
    }

    /// Return a new [Store] where each of the given `pages` that is currently indexed and
    /// unrequested has been marked pending.
    pub fn fetch(&self, pages: &[Arc<Page<R>>]) -> Self {
        let mut next = self.clone();
        if pages.is_empty() {
            return next;
        }
        for page in pages {
            let offset = page.offset();
            let Some(current) = next.pages.get(offset) else {
                trace!(offset, "skipping fetch of unindexed page");
                continue;
            };
            match current.request() {
                Ok(pending) => {
                    next.pages.replace(offset, Arc::new(pending));
                }
                Err(err) => trace!(?err, "skipping fetch"),
            }
        }
        next.update();
        next
    }

    /// Return a new [Store] that no longer tracks the given `pages` as unfetchable (i.e. their
    /// records have been released).
    pub fn unfetch(&self, pages: &[Arc<Page<R>>]) -> Self {
        let mut next = self.clone();
        next.unfetchable
            .retain(|page| !pages.iter().any(|released| Arc::ptr_eq(page, released)));
        next
    }

    /// Return a new [Store] where the pending page at `offset` has resolved to `records`.
    ///
    /// If no page is pending at `offset` (it was evicted or already settled), the completion is
    /// stale and an identical snapshot is returned.
    pub fn resolve(&self, records: Vec<R>, offset: u64, stats: Option<Stats>) -> Self {
        let Some(page) = self.pages.get(offset) else {
            debug!(offset, "ignoring resolution of evicted page");
            return self.clone();
        };
        match page.resolve(records) {
            Ok(resolved) => self.settle(offset, resolved, stats),
            Err(err) => {
                debug!(?err, "ignoring stale resolution");
                self.clone()
            }
        }
    }

    /// Return a new [Store] where the pending page at `offset` has been rejected with `error`.
    ///
    /// Stale rejections are ignored, as with [Store::resolve].
    pub fn reject(
        &self,
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
        offset: u64,
        stats: Option<Stats>,
    ) -> Self {
        let Some(page) = self.pages.get(offset) else {
            debug!(offset, "ignoring rejection of evicted page");
            return self.clone();
        };
        let error: Box<dyn std::error::Error + Send + Sync> = error.into();
        let error: Rejection = Arc::from(error);
        match page.reject(error) {
            Ok(rejected) => self.settle(offset, rejected, stats),
            Err(err) => {
                debug!(?err, "ignoring stale rejection");
                self.clone()
            }
        }
    }

    /// The page indexed at `offset` (if any).
    pub fn page(&self, offset: u64) -> Option<&Arc<Page<R>>> {
        self.pages.get(offset)
    }

    /// All indexed pages, in ascending offset order.
    pub fn pages(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages.iter()
    }

    pub fn unrequested(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages().filter(|page| !page.is_requested())
    }

    pub fn pending(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages().filter(|page| page.is_pending())
    }

    pub fn resolved(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages().filter(|page| page.is_resolved())
    }

    pub fn rejected(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages().filter(|page| page.is_rejected())
    }

    /// Pages that are pending, resolved, or rejected.
    pub fn requested(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages().filter(|page| page.is_requested())
    }

    /// Resolved pages that have been evicted but whose records have not yet been released.
    pub fn unfetchable(&self) -> &[Arc<Page<R>>] {
        &self.unfetchable
    }

    /// The number of records in the virtual array.
    ///
    /// This spans every page up to the largest indexed offset (or `stats.total_pages`, if larger),
    /// less one page for every rejected page.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the record at `index` in the virtual array.
    ///
    /// Returns `None` if `index` is out of bounds or the page holding it is not resolved. Rejected
    /// pages are not addressable: the records of later pages shift down to fill their place.
    pub fn get(&self, index: u64) -> Option<&R> {
        if index >= self.len {
            return None;
        }
        let offset = self.page_offset(index / self.page_size);
        self.pages.get(offset)?.get(index % self.page_size)
    }

    /// Iterate over every slot of the virtual array.
    pub fn records(&self) -> Records<'_, R> {
        Records::new(self, 0, self.len)
    }

    /// Iterate over the slots of the virtual array within `range` (clamped to [Store::len]).
    pub fn slice(&self, range: impl RangeBounds<u64>) -> Records<'_, R> {
        use std::ops::Bound::*;
        let start = match range.start_bound() {
            Included(start) => *start,
            Excluded(start) => start.saturating_add(1),
            Unbounded => 0,
        };
        let end = match range.end_bound() {
            Included(end) => end.saturating_add(1),
            Excluded(end) => *end,
            Unbounded => self.len,
        };
        let end = end.min(self.len);
        Records::new(self, start.min(end), end)
    }

    /// Map a page of the virtual array (which excludes rejected pages) to its offset in page
    /// space.
    fn page_offset(&self, virtual_offset: u64) -> u64 {
        let mut offset = virtual_offset;
        for rejected in &self.rejected_offsets {
            if *rejected > offset {
                break;
            }
            offset += 1;
        }
        offset
    }

    fn horizons_at(&self, read_offset: u64) -> Horizons {
        Horizons::compute(
            read_offset,
            self.page_size,
            self.load_horizon,
            self.unload_horizon,
            self.stats.total_pages,
            self.pages.last_key(),
        )
    }

    /// Replace the page at `offset` with its settled successor and merge `stats`.
    fn settle(&self, offset: u64, page: Page<R>, stats: Option<Stats>) -> Self {
        let mut next = self.clone();
        next.pages.replace(offset, Arc::new(page));
        if let Some(stats) = stats {
            next.stats = next.stats.merge(stats);
        }
        next.update();
        next
    }

    /// Evict pages outside the horizons of the current read offset, admit missing pages within
    /// the load horizon, and refresh derived state.
    fn update(&mut self) {
        if let Some(read_offset) = self.read_offset {
            let horizons = self.horizons_at(read_offset);
            debug!(read_offset, ?horizons, "updating horizons");
            self.unload(&horizons);
            self.admit(&horizons);
        }

        let observed = self.pages.last_key().map_or(0, |last| last.saturating_add(1));
        let total = observed.max(self.stats.total_pages.unwrap_or(0));
        self.rejected_offsets = self.rejected().map(|page| page.offset()).collect();
        self.len = total
            .saturating_sub(self.rejected_offsets.len() as u64)
            .saturating_mul(self.page_size);
    }

    fn unload(&mut self, horizons: &Horizons) {
        let load = horizons.load;
        let unload = horizons.unload;

        // Everything beyond the unload horizon
        let mut evicted = match unload.max {
            Some(max) => self.pages.select(max, None, |_| true),
            None => Vec::new(),
        };

        // Unsettled pages between the load and unload horizons
        if let Some(max) = load.max {
            evicted.extend(self.pages.select(max, unload.max, |page| !page.is_settled()));
        }
        evicted.extend(
            self.pages
                .select(unload.min, Some(load.min), |page| !page.is_settled()),
        );

        // Everything before the unload horizon
        evicted.extend(self.pages.select(0, Some(unload.min), |_| true));

        for offset in evicted {
            let Some(page) = self.pages.remove(offset) else {
                continue;
            };
            if page.is_resolved() {
                debug!(offset, "evicted resolved page");
                self.unfetchable.push(page);
            } else {
                trace!(offset, status = ?page.status(), "evicted page");
            }
        }
    }

    fn admit(&mut self, horizons: &Horizons) {
        let Some(max) = horizons.load.max else {
            return;
        };
        let size = self.page_size;
        for offset in horizons.load.min..max {
            if self.pages.insert_with(offset, || Page::new(offset, size)) {
                trace!(offset, "admitted page");
            }
        }
    }
}
