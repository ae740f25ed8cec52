//! Client side of thread voting: an optimistic tri-state vote controller
//! that keeps a displayed score in step with local clicks while an outbound
//! worker tells the aggregator about each change.

use shared::domain::{ThreadId, Vote};

pub mod error;
pub mod transport;
mod vote_controller;
mod vote_state;

pub use error::{ControllerClosed, VoteSyncError};
pub use transport::{HttpVoteNotifier, VoteNotifier};
pub use vote_controller::{RetryPolicy, VoteController, VoteSnapshot};
pub use vote_state::{next_vote, VoteState, VoteTransition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ReplyRequested {
        thread_id: ThreadId,
    },
    /// The aggregator accepted a notification and local state now mirrors it.
    VoteReconciled {
        thread_id: ThreadId,
        vote: Vote,
        displayed_count: i64,
    },
    /// The aggregator held a different vote than expected; its view replaced ours.
    VoteConflictResolved {
        thread_id: ThreadId,
        vote: Vote,
        displayed_count: i64,
    },
    VoteSyncFailed {
        thread_id: ThreadId,
        attempted: Vote,
        error: String,
        rolled_back: bool,
    },
}
