use super::Store;
use std::iter::FusedIterator;

/// A lazy iterator over a contiguous span of a [Store]'s virtual array.
///
/// Yields `Some(record)` for slots backed by a resolved page and `None` for slots that are not
/// (yet) available. Clone the iterator to restart it.
pub struct Records<'a, R> {
    store: &'a Store<R>,
    front: u64,
    back: u64,
}

impl<R> Clone for Records<'_, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            front: self.front,
            back: self.back,
        }
    }
}

impl<'a, R> Records<'a, R> {
    pub(super) fn new(store: &'a Store<R>, front: u64, back: u64) -> Self {
        Self { store, front, back }
    }
}

impl<'a, R> Iterator for Records<'a, R> {
    type Item = Option<&'a R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let record = self.store.get(self.front);
        self.front += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.back - self.front) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.front = self.front.saturating_add(n as u64).min(self.back);
        self.next()
    }
}

impl<R> DoubleEndedIterator for Records<'_, R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.store.get(self.back))
    }
}

impl<R> ExactSizeIterator for Records<'_, R> {}

impl<R> FusedIterator for Records<'_, R> {}
