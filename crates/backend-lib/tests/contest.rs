// ==========================
// crates/backend-lib/tests/contest.rs
// ==========================
//! End-to-end exercises of the contest actor over its channels, the way
//! connections drive it in production.

use soundclash_common::{ClientEvent, ServerEvent, Submission, User};
use soundclash_backend_lib::contest::{spawn_contest_actor, ContestHandle, Fanout};
use soundclash_backend_lib::error::ContestError;

fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        display_name: format!("user-{id}"),
        avatar_ref: None,
    }
}

fn submission(id: &str, submitter: &str) -> Submission {
    Submission {
        id: id.to_string(),
        source_link: format!("https://soundcloud.com/{submitter}/{id}"),
        track_ref: "1234".to_string(),
        audio_ref: format!("/uploads/{id}.mp3"),
        hearts: 0,
        submitter: user(submitter),
    }
}

async fn submit(handle: &ContestHandle, id: &str, submitter: &str) {
    handle.begin_submit(submitter).await.unwrap();
    handle.commit_submit(submission(id, submitter)).await.unwrap();
}

#[tokio::test]
async fn test_full_round_lifecycle() {
    let handle = spawn_contest_actor(10, 4);
    let operator = user("op");
    let alice = user("alice");

    handle.join(alice.clone()).await.unwrap();
    submit(&handle, "track-a", "bob").await;
    submit(&handle, "track-b", "carol").await;

    // open voting
    handle
        .dispatch(operator.clone(), ClientEvent::ToggleVoting)
        .await
        .unwrap();

    // alice spends three votes on track-a
    for expected_remaining in [9, 8, 7] {
        let replies = handle
            .dispatch(alice.clone(), ClientEvent::Heart { index: 0 })
            .await
            .unwrap();
        match replies[..] {
            [ServerEvent::UpdateHearts { hearts }] => assert_eq!(hearts, expected_remaining),
            ref other => panic!("unexpected replies: {other:?}"),
        }
    }

    // finalize freezes the session
    handle
        .dispatch(operator.clone(), ClientEvent::Finalize)
        .await
        .unwrap();
    let err = handle
        .dispatch(alice.clone(), ClientEvent::Heart { index: 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, ContestError::PhaseViolation));

    // override, then a fresh joiner sees the hearts that were cast
    handle
        .dispatch(
            operator.clone(),
            ClientEvent::OverrideLeaderboard { next_action: None },
        )
        .await
        .unwrap();
    let events = handle.join(user("late")).await.unwrap();
    let submissions = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::UpdateSubmissions { submissions } => Some(submissions.clone()),
            _ => None,
        })
        .expect("catch-up carries the submissions list");
    assert_eq!(submissions[0].hearts, 3);
    assert_eq!(submissions[1].hearts, 0);
}

#[tokio::test]
async fn test_fanout_reaches_every_subscriber() {
    let handle = spawn_contest_actor(10, 4);
    handle.join(user("alice")).await.unwrap();
    handle.join(user("bob")).await.unwrap();

    let mut rx_a = handle.subscribe();
    let mut rx_b = handle.subscribe();

    submit(&handle, "track-a", "carol").await;

    for rx in [&mut rx_a, &mut rx_b] {
        match rx.recv().await.unwrap() {
            Fanout::Event(ServerEvent::UpdateSubmissions { submissions }) => {
                assert_eq!(submissions.len(), 1);
                assert_eq!(submissions[0].id, "track-a");
            },
            other => panic!("unexpected fan-out: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_bracket_request_is_reply_only() {
    let handle = spawn_contest_actor(10, 4);
    submit(&handle, "track-a", "bob").await;
    submit(&handle, "track-b", "carol").await;

    let mut fanout_rx = handle.subscribe();
    let replies = handle
        .dispatch(user("alice"), ClientEvent::RequestBracket)
        .await
        .unwrap();

    match &replies[..] {
        [ServerEvent::Bracket { bracket }] => {
            assert_eq!(bracket.pairs.len(), 2);
            let real: Vec<_> = bracket
                .pairs
                .iter()
                .flat_map(|p| [&p.left, &p.right])
                .filter(|s| !s.is_bye())
                .collect();
            assert_eq!(real.len(), 2);
        },
        other => panic!("unexpected replies: {other:?}"),
    }

    // nothing was broadcast for a requester-only reply
    assert!(matches!(
        fanout_rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_create_bracket_broadcasts_redirect() {
    let handle = spawn_contest_actor(10, 4);
    submit(&handle, "track-a", "bob").await;

    let mut fanout_rx = handle.subscribe();
    handle
        .dispatch(user("op"), ClientEvent::CreateBracket)
        .await
        .unwrap();

    match fanout_rx.recv().await.unwrap() {
        Fanout::Event(ServerEvent::Redirect { url }) => assert_eq!(url, "/bracket.html"),
        other => panic!("unexpected fan-out: {other:?}"),
    }
}

#[tokio::test]
async fn test_reset_round_trip_over_the_wire() {
    let handle = spawn_contest_actor(10, 4);
    submit(&handle, "track-a", "bob").await;
    handle
        .dispatch(user("op"), ClientEvent::ToggleVoting)
        .await
        .unwrap();
    handle
        .dispatch(user("op"), ClientEvent::Finalize)
        .await
        .unwrap();

    let mut fanout_rx = handle.subscribe();
    handle
        .dispatch(user("op"), ClientEvent::Reset)
        .await
        .unwrap();
    assert!(matches!(
        fanout_rx.recv().await.unwrap(),
        Fanout::Event(ServerEvent::Reset)
    ));

    let events = handle.join(user("fresh")).await.unwrap();
    assert!(matches!(events[0], ServerEvent::User { hearts: 0, has_submitted: false, .. }));
    match &events[2] {
        ServerEvent::UpdateSubmissions { submissions } => assert!(submissions.is_empty()),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        events[3],
        ServerEvent::ToggleVoting { voting_enabled: false }
    ));

    // bob can submit again after the reset
    submit(&handle, "track-a", "bob").await;
}
