// ============================
// crates/backend-lib/src/router.rs
// ============================
//! Event routing: validate an inbound event against the current phase,
//! mutate the session through its well-defined transitions, and decide
//! which outbound events to emit.
//!
//! `route` is synchronous and touches nothing but the store, which keeps
//! the whole transition table unit-testable without a runtime. The
//! contest actor owns the store and calls in here one event at a time.
//! `submit` never reaches `route`: it runs through the two-phase
//! pipeline in `websocket` (validate, external fetch, commit).

use std::collections::HashMap;

use rand::Rng;
use soundclash_common::{ClientEvent, ServerEvent, User};
use tracing::debug;

use crate::bracket::generate_bracket;
use crate::error::ContestError;
use crate::session::SessionStore;

/// What one routed event asks the fan-out layer to do.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Sent to every connected client, originator included.
    pub broadcasts: Vec<ServerEvent>,
    /// Sent to the originating connection only.
    pub replies: Vec<ServerEvent>,
    /// Per-user budget table; each connection projects its own entry
    /// into `initHearts`. Set when a vote round opens.
    pub budget_sync: Option<HashMap<String, u32>>,
}

impl Outcome {
    fn broadcast(event: ServerEvent) -> Self {
        Outcome {
            broadcasts: vec![event],
            ..Outcome::default()
        }
    }

    fn reply(event: ServerEvent) -> Self {
        Outcome {
            replies: vec![event],
            ..Outcome::default()
        }
    }
}

/// Apply one inbound event to the session.
///
/// While the leaderboard is visible everything except `reset` and
/// `overrideLeaderboard` bounces off the gate as a (silently dropped)
/// `PhaseViolation`; the terminal phase freezes all contest mutation.
pub fn route<R: Rng + ?Sized>(
    store: &mut SessionStore,
    user: &User,
    event: ClientEvent,
    bracket_size: usize,
    rng: &mut R,
) -> Result<Outcome, ContestError> {
    if store.phase().leaderboard_visible()
        && !matches!(
            event,
            ClientEvent::Reset | ClientEvent::OverrideLeaderboard { .. }
        )
    {
        debug!(user = %user.id, "leaderboard visible, dropping event");
        return Err(ContestError::PhaseViolation);
    }

    match event {
        ClientEvent::Submit { .. } => {
            // Enforced by construction in the websocket handler; a
            // submit landing here is a bug in the caller.
            Err(ContestError::Internal(
                "submit must go through the submission pipeline".to_string(),
            ))
        },

        ClientEvent::ToggleVoting => {
            let voting_enabled = store.toggle_voting();
            let mut outcome = Outcome::broadcast(ServerEvent::ToggleVoting { voting_enabled });
            if voting_enabled {
                outcome.budget_sync = Some(store.budgets_snapshot());
            }
            Ok(outcome)
        },

        ClientEvent::Heart { index } => {
            let remaining = store.cast_vote(&user.id, index)?;
            Ok(Outcome {
                broadcasts: vec![ServerEvent::UpdateSubmissions {
                    submissions: store.submissions().to_vec(),
                }],
                replies: vec![ServerEvent::UpdateHearts { hearts: remaining }],
                budget_sync: None,
            })
        },

        ClientEvent::Finalize => {
            store.finalize();
            Ok(Outcome {
                broadcasts: vec![
                    ServerEvent::ShowLeaderboard {
                        submissions: store.submissions().to_vec(),
                    },
                    ServerEvent::ToggleVoting {
                        voting_enabled: false,
                    },
                ],
                ..Outcome::default()
            })
        },

        ClientEvent::Reset => {
            store.reset();
            Ok(Outcome::broadcast(ServerEvent::Reset))
        },

        ClientEvent::OverrideLeaderboard { next_action } => {
            if !store.phase().leaderboard_visible() {
                debug!(user = %user.id, "overrideLeaderboard outside leaderboard phase");
                return Err(ContestError::PhaseViolation);
            }
            store.override_leaderboard();
            match next_action.as_deref() {
                Some("createBracket") => {
                    route(store, user, ClientEvent::CreateBracket, bracket_size, rng)
                },
                Some(other) => {
                    debug!(action = other, "unknown overrideLeaderboard next action");
                    Ok(Outcome::default())
                },
                None => Ok(Outcome::default()),
            }
        },

        ClientEvent::RemoveSubmission { id } => {
            if store.remove_submission(&id) {
                Ok(Outcome::broadcast(ServerEvent::UpdateSubmissions {
                    submissions: store.submissions().to_vec(),
                }))
            } else {
                Ok(Outcome::default())
            }
        },

        ClientEvent::CreateBracket => {
            let bracket = generate_bracket(store.submissions(), bracket_size, rng);
            store.set_bracket(bracket);
            Ok(Outcome::broadcast(ServerEvent::Redirect {
                url: "/bracket.html".to_string(),
            }))
        },

        ClientEvent::RequestBracket => {
            let bracket = generate_bracket(store.submissions(), bracket_size, rng);
            store.set_bracket(bracket.clone());
            Ok(Outcome::reply(ServerEvent::Bracket { bracket }))
        },
    }
}
