// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the Soundclash contest server.
//!
//! The contest itself lives in [`session`], [`router`], [`bracket`] and
//! [`contest`]; everything else is the thin shell around it: identity
//! ([`auth`]), track retrieval ([`media`]), asset storage ([`assets`]),
//! transport ([`ws_router`], [`websocket`]) and configuration
//! ([`config`]).

pub mod assets;
pub mod auth;
pub mod bracket;
pub mod config;
pub mod contest;
pub mod error;
pub mod media;
pub mod metrics;
pub mod router;
pub mod session;
pub mod validation;
pub mod websocket;
pub mod ws_router;

use std::sync::Arc;
use std::time::Duration;

use crate::assets::{AssetStore, FlatFileAssets};
use crate::auth::SessionManager;
use crate::config::Settings;
use crate::contest::{spawn_contest_actor, ContestHandle};
use crate::error::ContestError;
use crate::media::{MediaSource, SoundcloudSource};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the contest actor owning all session state
    pub contest: ContestHandle,
    /// Session token table for authenticated browsers
    pub sessions: Arc<SessionManager>,
    /// External media source
    pub media: Arc<dyn MediaSource>,
    /// Audio asset storage
    pub assets: Arc<dyn AssetStore>,
    /// Plain HTTP client for the OAuth exchange
    pub http: reqwest::Client,
    /// Settings manager
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create a new application state. Must run inside a tokio runtime:
    /// this spawns the contest actor and the session sweep.
    pub fn new(settings: Settings) -> Result<Self, ContestError> {
        settings.validate()?;

        let contest = spawn_contest_actor(settings.vote_allotment, settings.bracket_size);
        let sessions = Arc::new(SessionManager::new());
        let media = Arc::new(SoundcloudSource::new(
            settings.media.client_id.clone(),
            Duration::from_secs(settings.media.timeout_secs),
        )?);
        let assets = Arc::new(FlatFileAssets::new(&settings.upload_dir)?);
        let http = reqwest::Client::new();

        Ok(AppState {
            contest,
            sessions,
            media,
            assets,
            http,
            settings: Arc::new(settings),
        })
    }
}
