// ================
// crates/common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the Soundclash client and server.
//! This module defines the WebSocket protocol events and supporting types.

use serde::{Deserialize, Serialize};

/// Authenticated participant identity.
///
/// Resolved by the identity collaborator before a connection is admitted.
/// The core holds it by value and never mutates it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque stable id from the identity provider
    pub id: String,
    /// Name shown next to submissions and votes
    pub display_name: String,
    /// Avatar locator, if the provider supplied one
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

/// One submitted track.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Unique within a session, derived from the sanitized track title
    pub id: String,
    /// Link the participant pasted in
    pub source_link: String,
    /// Opaque track id at the media source
    pub track_ref: String,
    /// Playable asset locator served to clients
    pub audio_ref: String,
    /// Votes received so far
    pub hearts: u32,
    /// Who submitted it
    pub submitter: User,
}

/// Events sent from client to server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Submit a track by link (only while submissions are open)
    Submit { link: String },
    /// Operator: flip the voting phase; opening resets every budget
    ToggleVoting,
    /// Spend one vote on the submission at `index`
    Heart { index: usize },
    /// Operator: freeze the session and show the leaderboard
    Finalize,
    /// Operator: wipe the session back to its initial state
    Reset,
    /// Operator: leave the leaderboard phase without a full reset.
    /// `next_action: "createBracket"` chains straight into a bracket draw.
    OverrideLeaderboard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_action: Option<String>,
    },
    /// Operator: drop a submission by id (idempotent)
    RemoveSubmission { id: String },
    /// Operator: draw a bracket from current standings and redirect everyone
    CreateBracket,
    /// Ask for a freshly drawn bracket; answered to the requester only
    RequestBracket,
}

/// Events sent from server to one or all clients.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Catch-up: the connection's own identity and session standing
    User {
        user: User,
        hearts: u32,
        has_submitted: bool,
    },
    /// Full submissions list after any change
    UpdateSubmissions { submissions: Vec<Submission> },
    /// Current voting flag
    ToggleVoting { voting_enabled: bool },
    /// The recipient's own vote budget (catch-up and voting-open sync)
    InitHearts { hearts: u32 },
    /// The requester's remaining budget after a successful vote
    UpdateHearts { hearts: u32 },
    /// Terminal display phase entered
    ShowLeaderboard { submissions: Vec<Submission> },
    /// A freshly drawn bracket, answered to the requester only
    Bracket { bracket: Bracket },
    /// Ask every client to navigate somewhere (bracket page)
    Redirect { url: String },
    /// Session wiped
    Reset,
    /// Failure local to the receiving connection
    Error { message: String },
}

/// One side of a first-round pairing: a real submission or a bye.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlot {
    /// Submitter's display name; blank for a bye
    pub display_name: String,
    /// Hearts at draw time; 0 for a bye
    pub hearts: u32,
    /// Backing submission id; `None` for a bye
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl BracketSlot {
    /// Synthetic placeholder used to pad short fields.
    pub fn bye() -> Self {
        BracketSlot {
            display_name: String::new(),
            hearts: 0,
            submission_id: None,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.submission_id.is_none()
    }
}

impl From<&Submission> for BracketSlot {
    fn from(submission: &Submission) -> Self {
        BracketSlot {
            display_name: submission.submitter.display_name.clone(),
            hearts: submission.hearts,
            submission_id: Some(submission.id.clone()),
        }
    }
}

/// A first-round match-up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BracketPair {
    pub left: BracketSlot,
    pub right: BracketSlot,
}

/// An ordered single-elimination first round.
///
/// Rebuilt from current standings on demand; never persisted between
/// generations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Bracket {
    pub pairs: Vec<BracketPair>,
}
