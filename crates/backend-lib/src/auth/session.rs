// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session token handling and management.
//!
//! Tokens map to the identity the OAuth callback resolved. The
//! WebSocket upgrade and the `/user` route both go through
//! [`SessionManager::resolve`]; an unresolvable token means the
//! connection is rejected before admission.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use metrics::{counter, gauge};
use soundclash_common::User;
use uuid::Uuid;

/// Session TTL (time to live)
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7); // 7 days

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
struct AuthSession {
    user: User,
    expires_at: SystemTime,
}

/// Token-to-identity table for authenticated browsers.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, AuthSession>>,
}

impl SessionManager {
    /// Create a new session manager and spawn its expiry sweep.
    pub fn new() -> Self {
        let manager = SessionManager {
            sessions: Arc::new(DashMap::new()),
        };

        let sweep = manager.clone();
        tokio::spawn(async move {
            sweep.cleanup_task().await;
        });

        manager
    }

    /// Mint a token for a freshly authenticated user.
    pub fn new_session(&self, user: User) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            AuthSession {
                user,
                expires_at: SystemTime::now() + SESSION_TTL,
            },
        );
        counter!("session.created").increment(1);
        gauge!("session.active").set(self.sessions.len() as f64);
        token
    }

    /// Resolve a token to its user, if the session is still live.
    pub fn resolve(&self, token: &str) -> Option<User> {
        let session = self.sessions.get(token)?;
        (SystemTime::now() < session.expires_at).then(|| session.user.clone())
    }

    /// Drop a session (logout).
    pub fn revoke(&self, token: &str) {
        if self.sessions.remove(token).is_some() {
            gauge!("session.active").set(self.sessions.len() as f64);
        }
    }

    async fn cleanup_task(&self) {
        loop {
            tokio::time::sleep(CLEANUP_INTERVAL).await;

            let now = SystemTime::now();
            let before = self.sessions.len();
            self.sessions.retain(|_, session| now < session.expires_at);
            let removed = before - self.sessions.len();

            if removed > 0 {
                counter!("session.expired").increment(removed as u64);
                gauge!("session.active").set(self.sessions.len() as f64);
            }
        }
    }
}
