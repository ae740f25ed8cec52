use shared::{
    domain::{AlumniId, ThreadId},
    error::ApiError,
    protocol::{SubmitVoteRequest, VoteTally},
};
use storage::{StoredVoteTally, VoteWrite};
use tracing::debug;

use crate::{internal, ApiContext};

/// Seed data for a vote widget: the thread's counts plus the caller's own vote.
pub async fn thread_votes(
    ctx: &ApiContext,
    thread_id: ThreadId,
    alumni_id: AlumniId,
) -> Result<VoteTally, ApiError> {
    ensure_thread(ctx, thread_id).await?;
    let tally = ctx
        .storage
        .thread_vote_tally(thread_id, alumni_id)
        .await
        .map_err(internal)?;
    Ok(to_tally(tally))
}

pub async fn submit_vote(
    ctx: &ApiContext,
    thread_id: ThreadId,
    req: &SubmitVoteRequest,
) -> Result<VoteTally, ApiError> {
    ensure_thread(ctx, thread_id).await?;
    ctx.storage
        .load_alumnus(req.alumni_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("alumnus not found"))?;

    let write = ctx
        .storage
        .apply_thread_vote(thread_id, req.alumni_id, req.prior, req.vote)
        .await
        .map_err(internal)?;

    match write {
        VoteWrite::Applied(tally) => {
            debug!(%thread_id, alumni_id = %req.alumni_id, vote = %req.vote, "vote applied");
            Ok(to_tally(tally))
        }
        VoteWrite::Conflict { stored } => {
            let expected = req.prior.map(|v| v.as_str()).unwrap_or_default();
            Err(ApiError::conflict(format!(
                "stored vote is {stored}, request expected {expected}"
            )))
        }
    }
}

async fn ensure_thread(ctx: &ApiContext, thread_id: ThreadId) -> Result<(), ApiError> {
    let exists = ctx
        .storage
        .thread_exists(thread_id)
        .await
        .map_err(internal)?;
    if !exists {
        return Err(ApiError::not_found("thread not found"));
    }
    Ok(())
}

fn to_tally(stored: StoredVoteTally) -> VoteTally {
    VoteTally {
        thread_id: stored.thread_id,
        upvotes: stored.upvotes,
        downvotes: stored.downvotes,
        user_vote: stored.user_vote.direction(),
    }
}

#[cfg(test)]
#[path = "tests/votes_tests.rs"]
mod tests;
