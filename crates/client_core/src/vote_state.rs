use shared::{
    domain::{ThreadId, Vote, VoteDirection},
    protocol::VoteTally,
};

/// One alumnus's vote on one thread together with the score shown for it.
///
/// `displayed_count` is the last server net score plus the weight change of
/// every local transition since the state was seeded or last reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteState {
    thread_id: ThreadId,
    vote: Vote,
    displayed_count: i64,
}

/// Outcome of a single click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub thread_id: ThreadId,
    pub previous: Vote,
    pub next: Vote,
    pub delta: i64,
    pub displayed_count: i64,
}

/// Clicking the standing direction retracts it; any other click replaces it.
pub fn next_vote(current: Vote, direction: VoteDirection) -> Vote {
    if current.direction() == Some(direction) {
        Vote::None
    } else {
        Vote::from(direction)
    }
}

impl VoteState {
    pub fn new(thread_id: ThreadId, vote: Vote, displayed_count: i64) -> Self {
        Self {
            thread_id,
            vote,
            displayed_count,
        }
    }

    pub fn from_tally(tally: &VoteTally) -> Self {
        Self::new(tally.thread_id, tally.vote(), tally.net_score())
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn vote(&self) -> Vote {
        self.vote
    }

    pub fn displayed_count(&self) -> i64 {
        self.displayed_count
    }

    pub fn click(&mut self, direction: VoteDirection) -> VoteTransition {
        let previous = self.vote;
        let next = next_vote(previous, direction);
        let delta = next.weight() - previous.weight();

        self.vote = next;
        self.displayed_count += delta;

        VoteTransition {
            thread_id: self.thread_id,
            previous,
            next,
            delta,
            displayed_count: self.displayed_count,
        }
    }

    /// Adopts the server's view. Tallies for other threads are ignored.
    pub fn reconcile(&mut self, tally: &VoteTally) -> bool {
        if tally.thread_id != self.thread_id {
            return false;
        }
        self.vote = tally.vote();
        self.displayed_count = tally.net_score();
        true
    }
}

#[cfg(test)]
#[path = "tests/vote_state_tests.rs"]
mod tests;
