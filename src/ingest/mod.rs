//! The ingestion pipeline: pick one stale feed per tick, fetch it, store its items.
//!
//! - [`selector`] - claims the most-due feed and stamps it
//! - [`persister`] - writes one item as a post, treating duplicate URLs as skips
//! - [`scheduler`] - the fixed-interval loop and its failure containment
//!
//! Failures are contained at the smallest scope that makes sense: a bad item
//! only loses that item, a bad feed only loses that tick.

mod persister;
mod scheduler;
mod selector;

use thiserror::Error;

use crate::feed::FetchError;
use crate::storage::DatabaseError;

pub use persister::{persist, PersistError, PersistOutcome};
pub use scheduler::{Aggregator, CycleReport, CycleSummary};
pub use selector::next_due;

/// Why a single cycle stopped early. None of these end the loop.
#[derive(Debug, Error)]
pub enum CycleError {
    /// There is no feed to fetch
    #[error("No feeds registered")]
    EmptyRegistry,

    /// The feed could not be retrieved or parsed
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The store failed while claiming a feed
    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl CycleError {
    /// HTTP status behind a fetch failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            CycleError::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }
}
