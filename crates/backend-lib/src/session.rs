// ============================
// crates/backend-lib/src/session.rs
// ============================
//! The authoritative in-memory contest session.
//!
//! `SessionStore` owns every piece of mutable contest state: the
//! submissions list, per-user vote budgets, per-user submitted flags, the
//! phase, and the last drawn bracket. All mutation goes through the
//! contest actor, so each operation here runs to completion with no
//! interleaving.

use std::collections::{HashMap, HashSet};

use soundclash_common::{Bracket, Submission};
use tracing::{debug, info};

use crate::error::ContestError;

/// Where the session currently is.
///
/// Modelled as one enum rather than two booleans so that "leaderboard
/// visible and voting open" cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Submissions open, voting closed. Initial state.
    #[default]
    Open,
    /// Submissions closed, voting open.
    Voting,
    /// Terminal display phase; only `reset` and `overrideLeaderboard`
    /// get through the gate.
    Leaderboard,
}

impl SessionPhase {
    /// Projection for the `toggleVoting` wire event.
    pub fn voting_enabled(self) -> bool {
        self == SessionPhase::Voting
    }

    /// Projection for the leaderboard gate.
    pub fn leaderboard_visible(self) -> bool {
        self == SessionPhase::Leaderboard
    }
}

/// Single process-wide contest state. Volatile: `reset` or a process
/// restart wipes it completely.
pub struct SessionStore {
    vote_allotment: u32,
    submissions: Vec<Submission>,
    budgets: HashMap<String, u32>,
    submitted: HashSet<String>,
    phase: SessionPhase,
    bracket: Option<Bracket>,
}

impl SessionStore {
    pub fn new(vote_allotment: u32) -> Self {
        SessionStore {
            vote_allotment,
            submissions: Vec::new(),
            budgets: HashMap::new(),
            submitted: HashSet::new(),
            phase: SessionPhase::Open,
            bracket: None,
        }
    }

    /// Make a user known to the session. Budgets start at 0; only an
    /// opening vote round hands out the allotment.
    pub fn register_user(&mut self, user_id: &str) {
        self.budgets.entry(user_id.to_string()).or_insert(0);
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn budget(&self, user_id: &str) -> u32 {
        self.budgets.get(user_id).copied().unwrap_or(0)
    }

    /// Snapshot of every known user's remaining votes, for the
    /// per-recipient `initHearts` sync when voting opens.
    pub fn budgets_snapshot(&self) -> HashMap<String, u32> {
        self.budgets.clone()
    }

    pub fn has_submitted(&self, user_id: &str) -> bool {
        self.submitted.contains(user_id)
    }

    /// Precondition check run *before* the external track lookup and
    /// download, so the slow calls never start for a doomed submit.
    pub fn can_submit(&self, user_id: &str) -> Result<(), ContestError> {
        if self.phase != SessionPhase::Open {
            return Err(ContestError::PhaseViolation);
        }
        if self.submitted.contains(user_id) {
            return Err(ContestError::DuplicateSubmission);
        }
        Ok(())
    }

    /// Commit a fully prepared submission.
    ///
    /// Preconditions are re-checked here: the session may have moved on
    /// while the audio was being fetched.
    pub fn add_submission(&mut self, submission: Submission) -> Result<(), ContestError> {
        if self.phase != SessionPhase::Open {
            return Err(ContestError::PhaseViolation);
        }
        if self.submitted.contains(&submission.submitter.id)
            || self.submissions.iter().any(|s| s.id == submission.id)
        {
            return Err(ContestError::DuplicateSubmission);
        }
        self.submitted.insert(submission.submitter.id.clone());
        self.register_user(&submission.submitter.id);
        info!(
            submission = %submission.id,
            user = %submission.submitter.id,
            "submission accepted"
        );
        self.submissions.push(submission);
        Ok(())
    }

    /// Flip the voting phase. Opening hands every known user the full
    /// allotment; closing leaves hearts already given untouched.
    /// Returns whether voting is now enabled.
    pub fn toggle_voting(&mut self) -> bool {
        match self.phase {
            SessionPhase::Open => {
                self.phase = SessionPhase::Voting;
                for votes in self.budgets.values_mut() {
                    *votes = self.vote_allotment;
                }
                info!(allotment = self.vote_allotment, "voting opened");
                true
            },
            SessionPhase::Voting => {
                self.phase = SessionPhase::Open;
                info!("voting closed");
                false
            },
            // The leaderboard gate drops toggleVoting before it gets here.
            SessionPhase::Leaderboard => false,
        }
    }

    /// Spend one vote on the submission at `index`. Returns the caller's
    /// remaining budget. Hearts and budgets stay non-negative by type.
    pub fn cast_vote(&mut self, user_id: &str, index: usize) -> Result<u32, ContestError> {
        if self.phase != SessionPhase::Voting {
            return Err(ContestError::PhaseViolation);
        }
        if index >= self.submissions.len() {
            return Err(ContestError::NoSuchSubmission(index));
        }
        let budget = self.budgets.entry(user_id.to_string()).or_insert(0);
        if *budget == 0 {
            return Err(ContestError::InsufficientVotes);
        }
        *budget -= 1;
        let remaining = *budget;
        self.submissions[index].hearts += 1;
        Ok(remaining)
    }

    /// Enter the terminal display phase. Voting is forced off.
    pub fn finalize(&mut self) {
        self.phase = SessionPhase::Leaderboard;
        info!("leaderboard finalized");
    }

    /// Operator escape hatch back out of the terminal phase without a
    /// full reset. Voting stays off (finalize forced it off).
    pub fn override_leaderboard(&mut self) {
        if self.phase == SessionPhase::Leaderboard {
            self.phase = SessionPhase::Open;
            info!("leaderboard overridden");
        }
    }

    /// Remove a submission by id. Idempotent: an unknown id is a logged
    /// no-op. Returns whether anything changed.
    pub fn remove_submission(&mut self, id: &str) -> bool {
        let before = self.submissions.len();
        self.submissions.retain(|s| s.id != id);
        if self.submissions.len() == before {
            debug!(submission = %id, "removeSubmission: id not found, nothing to do");
            false
        } else {
            info!(submission = %id, "submission removed");
            true
        }
    }

    pub fn set_bracket(&mut self, bracket: Bracket) {
        self.bracket = Some(bracket);
    }

    pub fn bracket(&self) -> Option<&Bracket> {
        self.bracket.as_ref()
    }

    /// Wipe everything back to the initial state.
    pub fn reset(&mut self) {
        *self = SessionStore::new(self.vote_allotment);
        info!("session reset");
    }
}
