//! A scripted, in-memory [dataset::Source] for testing.

use crate::{
    dataset::{self, Fetched},
    store::Stats,
};
use futures::channel::oneshot;
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Mutex},
};
use thiserror::Error;

/// Errors returned by a mock [Source].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("page unavailable: {0}")]
    Unavailable(u64),
}

#[derive(Default)]
struct State {
    failures: HashSet<u64>,
    gates: HashMap<u64, oneshot::Receiver<()>>,
    fetched: Vec<u64>,
    unfetched: Vec<(u64, usize)>,
}

/// A source that serves pages of a fixed record set.
///
/// Clones share their scripted failures, gates, and history.
#[derive(Clone)]
pub struct Source<R> {
    records: Arc<Vec<R>>,
    report_total: bool,
    state: Arc<Mutex<State>>,
}

impl<R> Source<R> {
    /// Create a new source serving `records`.
    pub fn new(records: impl IntoIterator<Item = R>) -> Self {
        Self {
            records: Arc::new(records.into_iter().collect()),
            report_total: false,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Report the total number of pages with every fetch.
    pub fn with_total(mut self) -> Self {
        self.report_total = true;
        self
    }

    /// Reject every subsequent fetch of the page at `offset`.
    pub fn fail(&self, offset: u64) {
        self.state.lock().unwrap().failures.insert(offset);
    }

    /// Delay the next fetch of the page at `offset` until the returned sender fires (or is
    /// dropped).
    pub fn hold(&self, offset: u64) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.state.lock().unwrap().gates.insert(offset, receiver);
        sender
    }

    /// The offsets fetched so far, in the order the fetches began.
    pub fn fetched(&self) -> Vec<u64> {
        self.state.lock().unwrap().fetched.clone()
    }

    /// The offsets (and record counts) released so far.
    pub fn unfetched(&self) -> Vec<(u64, usize)> {
        self.state.lock().unwrap().unfetched.clone()
    }
}

impl<R: Clone> Source<R> {
    fn page(&self, offset: u64, size: u64) -> Vec<R> {
        let len = self.records.len();
        let start = (offset.saturating_mul(size) as usize).min(len);
        let end = (offset.saturating_add(1).saturating_mul(size) as usize).min(len);
        self.records[start..end].to_vec()
    }
}

impl<R: Clone + Send + Sync + 'static> dataset::Source for Source<R> {
    type Record = R;
    type Error = Error;

    fn fetch(
        &mut self,
        offset: u64,
        size: u64,
        _stats: Stats,
    ) -> impl Future<Output = Result<Fetched<R>, Error>> + Send {
        let (gate, failed) = {
            let mut state = self.state.lock().unwrap();
            state.fetched.push(offset);
            (state.gates.remove(&offset), state.failures.contains(&offset))
        };
        let records = self.page(offset, size);
        let stats = self.report_total.then(|| Stats {
            total_pages: Some((self.records.len() as u64).div_ceil(size)),
        });
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if failed {
                return Err(Error::Unavailable(offset));
            }
            Ok(Fetched { records, stats })
        }
    }

    fn unfetch(&mut self, offset: u64, records: &[R]) {
        self.state
            .lock()
            .unwrap()
            .unfetched
            .push((offset, records.len()));
    }
}
