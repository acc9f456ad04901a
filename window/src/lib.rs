//! Window a large (or unbounded) record set into lazily fetched, evictable pages.
//!
//! A [store::Store] presents a virtual array of records that is backed by fixed-size
//! [page::Page]s. As the read offset moves, the store admits pages that fall within the _load
//! horizon_ (so they can be fetched) and evicts pages that drift beyond the _unload horizon_ (so
//! their records can be released). Every transition returns a new, immutable snapshot, so callers
//! may hold on to older snapshots (e.g. while rendering) without coordination.
//!
//! The [dataset::Dataset] drives a store against a [dataset::Source], issuing fetches for newly
//! admitted pages and releasing evicted ones.
//!
//! # Status
//!
//! `commonware-window` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.

use thiserror::Error;

pub mod dataset;
pub mod index;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod page;
pub mod store;

/// Errors that can occur when configuring or transitioning a store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("page size must be provided and non-zero")]
    MissingPageSize,
    #[error("unload horizon ({unload}) is less than load horizon ({load})")]
    InvalidHorizons { load: u64, unload: u64 },
    #[error("invalid transition for page {offset} from {from:?}")]
    InvalidTransition { offset: u64, from: page::Status },
    #[error("page already indexed: {0}")]
    DuplicatePage(u64),
}
