// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Identity collaborators: session token management and the thin
//! Discord OAuth routes. The core never implements authentication; it
//! only consumes the resolved [`soundclash_common::User`].

pub mod discord;
pub mod session;

pub use session::SessionManager;

use axum::http::HeaderMap;

/// Name of the session cookie set by the OAuth callback.
pub const SESSION_COOKIE: &str = "soundclash_sid";

/// Pull the session token out of the Cookie header, if present.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
