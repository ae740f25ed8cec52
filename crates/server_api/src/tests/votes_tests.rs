use super::*;
use shared::{
    domain::{Vote, VoteDirection},
    error::ErrorCode,
};
use storage::Storage;

async fn setup() -> (ApiContext, AlumniId, ThreadId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alumnus = storage
        .create_alumnus("eve@alumni.test", "Eve", "Moss")
        .await
        .expect("alumnus");
    let thread = storage
        .create_thread(alumnus, "Homecoming", None)
        .await
        .expect("thread");
    (ApiContext::new(storage), alumnus, thread)
}

fn vote(alumni_id: AlumniId, vote: Vote, prior: Option<Vote>) -> SubmitVoteRequest {
    SubmitVoteRequest {
        alumni_id,
        vote,
        prior,
    }
}

#[tokio::test]
async fn unknown_thread_is_not_found() {
    let (ctx, alumnus, _) = setup().await;
    let err = thread_votes(&ctx, ThreadId(999), alumnus)
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = submit_vote(&ctx, ThreadId(999), &vote(alumnus, Vote::Up, None))
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn unknown_alumnus_cannot_vote() {
    let (ctx, _, thread) = setup().await;
    let err = submit_vote(&ctx, thread, &vote(AlumniId(404), Vote::Up, None))
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn null_sentinel_retracts_vote() {
    let (ctx, alumnus, thread) = setup().await;
    let tally = submit_vote(&ctx, thread, &vote(alumnus, Vote::Up, Some(Vote::None)))
        .await
        .expect("vote");
    assert_eq!(tally.user_vote, Some(VoteDirection::Up));
    assert_eq!(tally.net_score(), 1);

    let tally = submit_vote(&ctx, thread, &vote(alumnus, Vote::None, Some(Vote::Up)))
        .await
        .expect("retract");
    assert_eq!(tally.user_vote, None);
    assert_eq!(tally.net_score(), 0);

    let seed = thread_votes(&ctx, thread, alumnus).await.expect("seed");
    assert_eq!(seed, tally);
}

#[tokio::test]
async fn stale_prior_is_a_conflict() {
    let (ctx, alumnus, thread) = setup().await;
    submit_vote(&ctx, thread, &vote(alumnus, Vote::Down, None))
        .await
        .expect("vote");

    let err = submit_vote(&ctx, thread, &vote(alumnus, Vote::Up, Some(Vote::None)))
        .await
        .expect_err("should conflict");
    assert_eq!(err.code, ErrorCode::Conflict);

    let seed = thread_votes(&ctx, thread, alumnus).await.expect("seed");
    assert_eq!(seed.user_vote, Some(VoteDirection::Down));
}
