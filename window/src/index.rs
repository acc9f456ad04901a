//! An ordered index of pages keyed by page offset.
//!
//! [Index] is a thin adapter over a [BTreeMap] that enforces key uniqueness and exposes the
//! point, extremum, and range lookups used to compute horizons. Pages are held behind [Arc]s so
//! cloning an index (to derive a new store snapshot) copies only the tree, never the records.

use crate::{page::Page, Error};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::Arc,
};

/// An ordered map from page offset to [Page].
#[derive(Debug)]
pub struct Index<R> {
    pages: BTreeMap<u64, Arc<Page<R>>>,
}

impl<R> Default for Index<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Index<R> {
    fn clone(&self) -> Self {
        Self {
            pages: self.pages.clone(),
        }
    }
}

impl<R> Index<R> {
    /// Return a new (empty) `Index`.
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Insert `page` at `offset`, failing if a page is already indexed there.
    pub fn insert(&mut self, offset: u64, page: Arc<Page<R>>) -> Result<(), Error> {
        if self.pages.contains_key(&offset) {
            return Err(Error::DuplicatePage(offset));
        }
        self.pages.insert(offset, page);
        Ok(())
    }

    /// Insert the page built by `page` at `offset` if no page is indexed there, returning whether
    /// an insertion occurred.
    pub(crate) fn insert_with(&mut self, offset: u64, page: impl FnOnce() -> Page<R>) -> bool {
        match self.pages.entry(offset) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(page()));
                true
            }
        }
    }

    /// Replace the page at `offset` (which must already be indexed), returning the previous page.
    pub(crate) fn replace(&mut self, offset: u64, page: Arc<Page<R>>) -> Option<Arc<Page<R>>> {
        let slot = self.pages.get_mut(&offset)?;
        Some(std::mem::replace(slot, page))
    }

    /// Remove and return the page at `offset`.
    pub fn remove(&mut self, offset: u64) -> Option<Arc<Page<R>>> {
        self.pages.remove(&offset)
    }

    /// Get the page at `offset`.
    pub fn get(&self, offset: u64) -> Option<&Arc<Page<R>>> {
        self.pages.get(&offset)
    }

    /// The smallest indexed offset.
    pub fn first_key(&self) -> Option<u64> {
        self.pages.keys().next().copied()
    }

    /// The largest indexed offset.
    pub fn last_key(&self) -> Option<u64> {
        self.pages.keys().next_back().copied()
    }

    /// Iterate over pages with offsets in `[low, high)` in ascending order. A `high` of `None` is
    /// unbounded.
    pub fn range(
        &self,
        low: u64,
        high: Option<u64>,
    ) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        let pages = match high {
            Some(high) if high <= low => None,
            Some(high) => Some(self.pages.range(low..high)),
            None => Some(self.pages.range(low..)),
        };
        pages.into_iter().flatten().map(|(_, page)| page)
    }

    /// Iterate over every page in ascending offset order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<Page<R>>> {
        self.pages.values()
    }

    /// The offsets of pages in `[low, high)` matching `predicate`.
    pub(crate) fn select(
        &self,
        low: u64,
        high: Option<u64>,
        predicate: impl Fn(&Page<R>) -> bool,
    ) -> Vec<u64> {
        self.range(low, high)
            .filter(|page| predicate(page))
            .map(|page| page.offset())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_macros::test_traced;

    fn page(offset: u64) -> Arc<Page<u8>> {
        Arc::new(Page::new(offset, 10))
    }

    fn offsets<'a>(pages: impl Iterator<Item = &'a Arc<Page<u8>>>) -> Vec<u64> {
        pages.map(|page| page.offset()).collect()
    }

    #[test_traced]
    fn test_index_empty() {
        let index = Index::<u8>::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.first_key(), None);
        assert_eq!(index.last_key(), None);
        assert!(index.get(0).is_none());
        assert_eq!(index.range(0, None).count(), 0);
    }

    #[test_traced]
    fn test_index_insert_unique() {
        let mut index = Index::new();
        index.insert(4, page(4)).unwrap();
        index.insert(1, page(1)).unwrap();
        index.insert(9, page(9)).unwrap();
        assert_eq!(index.insert(4, page(4)), Err(Error::DuplicatePage(4)));
        assert_eq!(index.len(), 3);
        assert_eq!(index.first_key(), Some(1));
        assert_eq!(index.last_key(), Some(9));
        assert_eq!(offsets(index.iter()), vec![1, 4, 9]);

        assert!(!index.insert_with(9, || Page::new(9, 10)));
        assert!(index.insert_with(6, || Page::new(6, 10)));
        assert_eq!(offsets(index.iter()), vec![1, 4, 6, 9]);

        let removed = index.remove(4).unwrap();
        assert_eq!(removed.offset(), 4);
        assert!(index.remove(4).is_none());
        assert!(index.get(4).is_none());
        assert_eq!(index.get(9).unwrap().offset(), 9);
        assert_eq!(index.len(), 3);
    }

    #[test_traced]
    fn test_index_range() {
        let mut index = Index::new();
        for offset in [0, 2, 3, 5, 8] {
            index.insert(offset, page(offset)).unwrap();
        }
        assert_eq!(offsets(index.range(2, Some(5))), vec![2, 3]);
        assert_eq!(offsets(index.range(3, None)), vec![3, 5, 8]);
        assert_eq!(offsets(index.range(0, Some(1))), vec![0]);
        assert_eq!(offsets(index.range(6, Some(8))), Vec::<u64>::new());
        assert_eq!(offsets(index.range(9, None)), Vec::<u64>::new());

        // Empty and inverted ranges yield nothing
        assert_eq!(index.range(5, Some(5)).count(), 0);
        assert_eq!(index.range(5, Some(2)).count(), 0);

        // Ranges can be walked from the back
        assert_eq!(offsets(index.range(0, None).rev()), vec![8, 5, 3, 2, 0]);
    }

    #[test_traced]
    fn test_index_clone_shares_pages() {
        let mut index = Index::new();
        index.insert(0, page(0)).unwrap();
        let mut copy = index.clone();
        assert!(Arc::ptr_eq(index.get(0).unwrap(), copy.get(0).unwrap()));

        // Mutating the copy leaves the source index intact
        copy.insert(1, page(1)).unwrap();
        let previous = copy.replace(0, page(0)).unwrap();
        assert!(Arc::ptr_eq(&previous, index.get(0).unwrap()));
        assert!(copy.replace(7, page(7)).is_none());
        assert_eq!(index.len(), 1);
        assert_eq!(copy.len(), 2);
    }
}
