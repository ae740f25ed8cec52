use super::*;

const THREAD: ThreadId = ThreadId(7);

fn seeded(vote: Vote, count: i64) -> VoteState {
    VoteState::new(THREAD, vote, count)
}

#[test]
fn transition_table_matches_toggle_and_switch_rules() {
    let cases = [
        (Vote::None, VoteDirection::Up, Vote::Up, 1),
        (Vote::None, VoteDirection::Down, Vote::Down, -1),
        (Vote::Up, VoteDirection::Up, Vote::None, -1),
        (Vote::Up, VoteDirection::Down, Vote::Down, -2),
        (Vote::Down, VoteDirection::Down, Vote::None, 1),
        (Vote::Down, VoteDirection::Up, Vote::Up, 2),
    ];

    for (current, direction, expected, delta) in cases {
        let mut state = seeded(current, 0);
        let transition = state.click(direction);
        assert_eq!(transition.previous, current);
        assert_eq!(transition.next, expected, "{current} + {direction:?}");
        assert_eq!(transition.delta, delta, "{current} + {direction:?}");
        assert_eq!(transition.displayed_count, delta);
        assert_eq!(state.vote(), expected);
    }
}

#[test]
fn fresh_upvote_toggle_and_downvote_walks_five_six_five_four() {
    let mut state = VoteState::from_tally(&VoteTally {
        thread_id: THREAD,
        upvotes: 5,
        downvotes: 0,
        user_vote: None,
    });

    let first = state.click(VoteDirection::Up);
    assert_eq!((first.next, first.displayed_count), (Vote::Up, 6));
    assert_eq!(first.next.as_str(), "upvote");

    let second = state.click(VoteDirection::Up);
    assert_eq!((second.next, second.displayed_count), (Vote::None, 5));
    assert_eq!(second.next.as_str(), "null");

    let third = state.click(VoteDirection::Down);
    assert_eq!((third.next, third.displayed_count), (Vote::Down, 4));
    assert_eq!(third.next.as_str(), "downvote");
}

#[test]
fn switching_from_seeded_upvote_swings_two() {
    let mut state = VoteState::from_tally(&VoteTally {
        thread_id: THREAD,
        upvotes: 12,
        downvotes: 2,
        user_vote: Some(VoteDirection::Up),
    });
    assert_eq!(state.displayed_count(), 10);

    let transition = state.click(VoteDirection::Down);
    assert_eq!(transition.next, Vote::Down);
    assert_eq!(transition.displayed_count, 8);
}

#[test]
fn every_click_sequence_up_to_four_keeps_count_in_step_with_vote() {
    let directions = [VoteDirection::Up, VoteDirection::Down];
    for seed in [Vote::None, Vote::Up, Vote::Down] {
        for len in 1..=4u32 {
            for mask in 0..(1u32 << len) {
                let mut state = seeded(seed, 100);
                let mut net_delta = 0;
                for step in 0..len {
                    let direction = directions[((mask >> step) & 1) as usize];
                    net_delta += state.click(direction).delta;
                }
                assert_eq!(state.displayed_count(), 100 + net_delta);
                assert_eq!(
                    state.displayed_count(),
                    100 - seed.weight() + state.vote().weight(),
                    "seed {seed}, mask {mask:b}, len {len}"
                );
            }
        }
    }
}

#[test]
fn double_click_returns_to_seed() {
    for seed in [Vote::None, Vote::Up, Vote::Down] {
        for direction in [VoteDirection::Up, VoteDirection::Down] {
            let mut state = seeded(seed, 3);
            let original = state;
            state.click(direction);
            state.click(direction);
            if seed == Vote::None || seed.direction() == Some(direction) {
                assert_eq!(state, original);
            }
        }
    }
}

#[test]
fn reconcile_rebases_on_server_tally() {
    let mut state = seeded(Vote::None, 5);
    state.click(VoteDirection::Up);

    let applied = state.reconcile(&VoteTally {
        thread_id: THREAD,
        upvotes: 9,
        downvotes: 1,
        user_vote: Some(VoteDirection::Up),
    });
    assert!(applied);
    assert_eq!(state.vote(), Vote::Up);
    assert_eq!(state.displayed_count(), 8);

    let transition = state.click(VoteDirection::Up);
    assert_eq!(transition.displayed_count, 7);
}

#[test]
fn reconcile_ignores_other_threads() {
    let mut state = seeded(Vote::Down, 2);
    let applied = state.reconcile(&VoteTally {
        thread_id: ThreadId(8),
        upvotes: 0,
        downvotes: 0,
        user_vote: None,
    });
    assert!(!applied);
    assert_eq!(state, seeded(Vote::Down, 2));
}
