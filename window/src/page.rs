//! A fixed-size slice of the record space and the state machine that governs it.
//!
//! Every [Page] begins [Status::Unrequested], becomes [Status::Pending] once a fetch is issued,
//! and settles exactly once into either [Status::Resolved] (holding its records) or
//! [Status::Rejected] (holding the fetch error). Pages are never mutated: each transition returns a
//! new [Page] and leaves the receiver untouched, so a page can be shared across store snapshots.

use crate::Error;
use std::sync::Arc;
use tracing::{trace, warn};

/// The error a page was rejected with.
pub type Rejection = Arc<dyn std::error::Error + Send + Sync>;

/// The externally visible status of a [Page].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Unrequested,
    Pending,
    Resolved,
    Rejected,
}

#[derive(Debug)]
enum State<R> {
    Unrequested,
    Pending,
    Resolved(Vec<R>),
    Rejected(Rejection),
}

/// A page of records at some offset in page space.
#[derive(Debug)]
pub struct Page<R> {
    offset: u64,
    size: u64,
    state: State<R>,
}

impl<R> Page<R> {
    /// Create a new, unrequested page at `offset` (measured in pages) holding up to `size` records.
    pub fn new(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size,
            state: State::Unrequested,
        }
    }

    /// The position of this page in page space.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The number of records this page spans.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn status(&self) -> Status {
        match self.state {
            State::Unrequested => Status::Unrequested,
            State::Pending => Status::Pending,
            State::Resolved(_) => Status::Resolved,
            State::Rejected(_) => Status::Rejected,
        }
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self.state, State::Unrequested)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, State::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.state, State::Rejected(_))
    }

    /// Whether the fetch for this page has terminated (either resolved or rejected).
    pub fn is_settled(&self) -> bool {
        self.is_resolved() || self.is_rejected()
    }

    /// The records held by a resolved page (empty otherwise).
    ///
    /// A short final page holds fewer than [Page::size] records.
    pub fn records(&self) -> &[R] {
        match &self.state {
            State::Resolved(records) => records,
            _ => &[],
        }
    }

    /// The error a rejected page was rejected with.
    pub fn error(&self) -> Option<&Rejection> {
        match &self.state {
            State::Rejected(err) => Some(err),
            _ => None,
        }
    }

    /// Get the record at position `index` within this page, if the page is resolved and the
    /// record is present.
    pub fn get(&self, index: u64) -> Option<&R> {
        if index >= self.size {
            return None;
        }
        self.records().get(index as usize)
    }

    /// Transition from unrequested to pending.
    pub fn request(&self) -> Result<Self, Error> {
        if !matches!(self.state, State::Unrequested) {
            return Err(self.invalid());
        }
        trace!(offset = self.offset, "requested page");
        Ok(self.with(State::Pending))
    }

    /// Transition from pending to resolved, taking ownership of `records`.
    ///
    /// Records beyond [Page::size] are dropped.
    pub fn resolve(&self, mut records: Vec<R>) -> Result<Self, Error> {
        if !self.is_pending() {
            return Err(self.invalid());
        }
        if records.len() as u64 > self.size {
            warn!(
                offset = self.offset,
                size = self.size,
                received = records.len(),
                "truncating oversized page"
            );
            records.truncate(self.size as usize);
        }
        trace!(offset = self.offset, len = records.len(), "resolved page");
        Ok(self.with(State::Resolved(records)))
    }

    /// Transition from pending to rejected.
    pub fn reject(&self, error: Rejection) -> Result<Self, Error> {
        if !self.is_pending() {
            return Err(self.invalid());
        }
        trace!(offset = self.offset, ?error, "rejected page");
        Ok(self.with(State::Rejected(error)))
    }

    fn with(&self, state: State<R>) -> Self {
        Self {
            offset: self.offset,
            size: self.size,
            state,
        }
    }

    fn invalid(&self) -> Error {
        Error::InvalidTransition {
            offset: self.offset,
            from: self.status(),
        }
    }
}
