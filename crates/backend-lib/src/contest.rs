// ============================
// crates/backend-lib/src/contest.rs
// ============================
//! The contest actor: a single task owning the `SessionStore`.
//!
//! Every connection talks to the session through a `ContestHandle`.
//! Commands arrive on an mpsc channel and are applied one at a time, so
//! SessionStore operations are atomic without a lock. Fan-out to all
//! connected clients goes over a `tokio::sync::broadcast` channel that
//! each connection task subscribes to.
//!
//! `submit` is split in two: `BeginSubmit` validates the phase and
//! duplicate preconditions, the connection then performs the slow
//! external lookup/download with no claim on the session, and
//! `CommitSubmit` re-checks the preconditions before appending, since
//! the session may have moved on during the await.

use std::collections::HashMap;

use metrics::{counter, gauge};
use rand::rngs::StdRng;
use rand::SeedableRng;
use soundclash_common::{ClientEvent, ServerEvent, Submission, User};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::error::ContestError;
use crate::metrics as keys;
use crate::router;
use crate::session::SessionStore;

const FANOUT_CAPACITY: usize = 256;

/// Payload on the fan-out channel.
#[derive(Debug, Clone)]
pub enum Fanout {
    /// Delivered to every connection as-is.
    Event(ServerEvent),
    /// Per-user vote budgets after a round opened; each connection
    /// projects its own entry into an `initHearts` event.
    Budgets(HashMap<String, u32>),
}

/// Message sent *into* the actor.
#[derive(Debug)]
pub enum ActorMsg {
    Join {
        user: User,
        resp_tx: mpsc::UnboundedSender<Vec<ServerEvent>>,
    },
    Leave {
        user_id: String,
    },
    Event {
        user: User,
        event: ClientEvent,
        resp_tx: mpsc::UnboundedSender<Result<Vec<ServerEvent>, ContestError>>,
    },
    BeginSubmit {
        user_id: String,
        resp_tx: mpsc::UnboundedSender<Result<(), ContestError>>,
    },
    CommitSubmit {
        submission: Submission,
        resp_tx: mpsc::UnboundedSender<Result<(), ContestError>>,
    },
}

/// Handle that connections keep: command channel + fan-out sender.
#[derive(Clone)]
pub struct ContestHandle {
    cmd_tx: mpsc::UnboundedSender<ActorMsg>,
    fanout_tx: broadcast::Sender<Fanout>,
}

impl ContestHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Fanout> {
        self.fanout_tx.subscribe()
    }

    /// Admit a connection: register the user and get the ordered
    /// catch-up sequence for it.
    pub async fn join(&self, user: User) -> Result<Vec<ServerEvent>, ContestError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(ActorMsg::Join { user, resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| ContestError::Internal("contest actor is gone".to_string()))
    }

    pub fn leave(&self, user_id: &str) {
        let _ = self.cmd_tx.send(ActorMsg::Leave {
            user_id: user_id.to_string(),
        });
    }

    /// Route one inbound event; returns the replies for the originating
    /// connection. Broadcasts go out over the fan-out channel.
    pub async fn dispatch(
        &self,
        user: User,
        event: ClientEvent,
    ) -> Result<Vec<ServerEvent>, ContestError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(ActorMsg::Event {
            user,
            event,
            resp_tx,
        })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| ContestError::Internal("contest actor is gone".to_string()))?
    }

    /// Validate submit preconditions before the external calls start.
    pub async fn begin_submit(&self, user_id: &str) -> Result<(), ContestError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx.send(ActorMsg::BeginSubmit {
            user_id: user_id.to_string(),
            resp_tx,
        })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| ContestError::Internal("contest actor is gone".to_string()))?
    }

    /// Commit a prepared submission; preconditions are re-checked.
    pub async fn commit_submit(&self, submission: Submission) -> Result<(), ContestError> {
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        self.cmd_tx
            .send(ActorMsg::CommitSubmit { submission, resp_tx })?;
        resp_rx
            .recv()
            .await
            .ok_or_else(|| ContestError::Internal("contest actor is gone".to_string()))?
    }
}

pub struct ContestActor {
    store: SessionStore,
    bracket_size: usize,
    /// Refcount of open connections per user id; used to re-register
    /// everyone still connected after a reset wipes the budget table.
    connected: HashMap<String, usize>,
    fanout_tx: broadcast::Sender<Fanout>,
    rng: StdRng,
}

impl ContestActor {
    pub fn new(
        vote_allotment: u32,
        bracket_size: usize,
        fanout_tx: broadcast::Sender<Fanout>,
    ) -> Self {
        ContestActor {
            store: SessionStore::new(vote_allotment),
            bracket_size,
            connected: HashMap::new(),
            fanout_tx,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Ordered catch-up for a newly admitted connection: own identity
    /// and budget, the submissions list, the voting flag, and the
    /// leaderboard if it is showing.
    fn handle_join(&mut self, user: &User) -> Vec<ServerEvent> {
        self.store.register_user(&user.id);
        *self.connected.entry(user.id.clone()).or_insert(0) += 1;
        gauge!(keys::WS_ACTIVE).increment(1.0);

        let hearts = self.store.budget(&user.id);
        let mut events = vec![
            ServerEvent::User {
                user: user.clone(),
                hearts,
                has_submitted: self.store.has_submitted(&user.id),
            },
            ServerEvent::InitHearts { hearts },
            ServerEvent::UpdateSubmissions {
                submissions: self.store.submissions().to_vec(),
            },
            ServerEvent::ToggleVoting {
                voting_enabled: self.store.phase().voting_enabled(),
            },
        ];
        if self.store.phase().leaderboard_visible() {
            events.push(ServerEvent::ShowLeaderboard {
                submissions: self.store.submissions().to_vec(),
            });
        }
        events
    }

    fn handle_leave(&mut self, user_id: &str) {
        let Some(count) = self.connected.get_mut(user_id) else {
            debug!(user = %user_id, "leave without a matching join");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.connected.remove(user_id);
        }
        gauge!(keys::WS_ACTIVE).decrement(1.0);
    }

    fn handle_event(
        &mut self,
        user: &User,
        event: ClientEvent,
    ) -> Result<Vec<ServerEvent>, ContestError> {
        counter!(keys::EVENTS_ROUTED).increment(1);
        self.store.register_user(&user.id);

        let was_reset = matches!(event, ClientEvent::Reset);
        let built_bracket = matches!(
            event,
            ClientEvent::CreateBracket
                | ClientEvent::RequestBracket
                | ClientEvent::OverrideLeaderboard {
                    next_action: Some(_)
                }
        );

        let outcome = router::route(&mut self.store, user, event, self.bracket_size, &mut self.rng)?;

        if was_reset {
            counter!(keys::SESSION_RESETS).increment(1);
            // the wipe dropped every budget entry; users still connected
            // stay known to the session
            for user_id in self.connected.keys() {
                self.store.register_user(user_id);
            }
        }
        if built_bracket && self.store.bracket().is_some() {
            counter!(keys::BRACKETS_BUILT).increment(1);
        }

        for event in outcome.broadcasts {
            self.fan_out(Fanout::Event(event));
        }
        if let Some(budgets) = outcome.budget_sync {
            self.fan_out(Fanout::Budgets(budgets));
        }
        Ok(outcome.replies)
    }

    fn handle_commit_submit(&mut self, submission: Submission) -> Result<(), ContestError> {
        self.store.add_submission(submission)?;
        counter!(keys::SUBMISSIONS_ACCEPTED).increment(1);
        self.fan_out(Fanout::Event(ServerEvent::UpdateSubmissions {
            submissions: self.store.submissions().to_vec(),
        }));
        Ok(())
    }

    fn fan_out(&self, payload: Fanout) {
        // send() errs only when nobody is subscribed
        if self.fanout_tx.send(payload).is_err() {
            debug!("fan-out with no subscribers");
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ActorMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                ActorMsg::Join { user, resp_tx } => {
                    let events = self.handle_join(&user);
                    let _ = resp_tx.send(events);
                },
                ActorMsg::Leave { user_id } => self.handle_leave(&user_id),
                ActorMsg::Event {
                    user,
                    event,
                    resp_tx,
                } => {
                    let result = self.handle_event(&user, event);
                    let _ = resp_tx.send(result);
                },
                ActorMsg::BeginSubmit { user_id, resp_tx } => {
                    self.store.register_user(&user_id);
                    let _ = resp_tx.send(self.store.can_submit(&user_id));
                },
                ActorMsg::CommitSubmit {
                    submission,
                    resp_tx,
                } => {
                    let result = self.handle_commit_submit(submission);
                    let _ = resp_tx.send(result);
                },
            }
        }
        warn!("contest actor command channel closed, shutting down");
    }
}

/// Spawn the contest actor and return its handle.
pub fn spawn_contest_actor(vote_allotment: u32, bracket_size: usize) -> ContestHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (fanout_tx, _) = broadcast::channel(FANOUT_CAPACITY);
    let actor = ContestActor::new(vote_allotment, bracket_size, fanout_tx.clone());

    tokio::spawn(actor.run(cmd_rx));

    ContestHandle { cmd_tx, fanout_tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            display_name: id.to_string(),
            avatar_ref: None,
        }
    }

    fn submission(id: &str, submitter: &str) -> Submission {
        Submission {
            id: id.to_string(),
            source_link: format!("https://soundcloud.com/{submitter}/{id}"),
            track_ref: "1".to_string(),
            audio_ref: format!("/uploads/{id}.mp3"),
            hearts: 0,
            submitter: user(submitter),
        }
    }

    #[test]
    fn test_leave_without_join_is_ignored() {
        let (fanout_tx, _keep) = broadcast::channel(8);
        let mut actor = ContestActor::new(10, 8, fanout_tx);
        actor.handle_join(&user("alice"));
        actor.handle_join(&user("alice")); // second tab

        actor.handle_leave("ghost");
        assert_eq!(actor.connected.get("alice"), Some(&2));

        actor.handle_leave("alice");
        actor.handle_leave("alice");
        // stale leave after the last tab already closed
        actor.handle_leave("alice");
        assert!(actor.connected.is_empty());
    }

    #[tokio::test]
    async fn test_join_catch_up_order() {
        let handle = spawn_contest_actor(10, 8);
        handle.commit_submit(submission("t1", "bob")).await.unwrap();

        let events = handle.join(user("alice")).await.unwrap();
        assert!(matches!(events[0], ServerEvent::User { hearts: 0, .. }));
        assert!(matches!(events[1], ServerEvent::InitHearts { hearts: 0 }));
        match &events[2] {
            ServerEvent::UpdateSubmissions { submissions } => {
                assert_eq!(submissions.len(), 1);
            },
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            events[3],
            ServerEvent::ToggleVoting {
                voting_enabled: false
            }
        ));
        // no leaderboard tail while it is hidden
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn test_join_during_leaderboard_includes_it() {
        let handle = spawn_contest_actor(10, 8);
        handle
            .dispatch(user("op"), ClientEvent::Finalize)
            .await
            .unwrap();

        let events = handle.join(user("alice")).await.unwrap();
        assert!(matches!(
            events.last(),
            Some(ServerEvent::ShowLeaderboard { .. })
        ));
    }

    #[tokio::test]
    async fn test_begin_submit_blocks_duplicates_at_commit() {
        let handle = spawn_contest_actor(10, 8);
        handle.begin_submit("bob").await.unwrap();

        // another connection for the same user commits first
        handle.commit_submit(submission("t1", "bob")).await.unwrap();

        // the in-flight submit fails the commit-time re-check
        let err = handle
            .commit_submit(submission("t2", "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContestError::DuplicateSubmission));
        let err = handle.begin_submit("bob").await.unwrap_err();
        assert!(matches!(err, ContestError::DuplicateSubmission));
    }

    #[tokio::test]
    async fn test_budget_sync_fans_out_per_user_table() {
        let handle = spawn_contest_actor(10, 8);
        handle.join(user("alice")).await.unwrap();
        handle.join(user("bob")).await.unwrap();

        let mut fanout_rx = handle.subscribe();
        handle
            .dispatch(user("alice"), ClientEvent::ToggleVoting)
            .await
            .unwrap();

        let first = fanout_rx.recv().await.unwrap();
        assert!(matches!(
            first,
            Fanout::Event(ServerEvent::ToggleVoting {
                voting_enabled: true
            })
        ));
        match fanout_rx.recv().await.unwrap() {
            Fanout::Budgets(budgets) => {
                assert_eq!(budgets.get("alice"), Some(&10));
                assert_eq!(budgets.get("bob"), Some(&10));
            },
            other => panic!("unexpected fan-out: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reset_keeps_connected_users_known() {
        let handle = spawn_contest_actor(10, 8);
        handle.join(user("alice")).await.unwrap();
        handle.commit_submit(submission("t1", "bob")).await.unwrap();

        handle.dispatch(user("op"), ClientEvent::Reset).await.unwrap();

        // alice is still connected, so reopening voting hands her votes
        handle
            .dispatch(user("op"), ClientEvent::ToggleVoting)
            .await
            .unwrap();
        handle.commit_submit(submission("t2", "carol")).await.unwrap_err(); // voting open, submissions closed
        handle
            .dispatch(user("op"), ClientEvent::ToggleVoting)
            .await
            .unwrap();
        handle.commit_submit(submission("t2", "carol")).await.unwrap();
        handle
            .dispatch(user("op"), ClientEvent::ToggleVoting)
            .await
            .unwrap();

        let replies = handle
            .dispatch(user("alice"), ClientEvent::Heart { index: 0 })
            .await
            .unwrap();
        assert!(matches!(
            replies[..],
            [ServerEvent::UpdateHearts { hearts: 9 }]
        ));
    }
}
