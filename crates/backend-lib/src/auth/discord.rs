// ============================
// crates/backend-lib/src/auth/discord.rs
// ============================
//! Thin Discord OAuth2 flow (identify scope only).
//!
//! `/auth/discord` sends the browser to Discord, `/auth/callback`
//! exchanges the code and mints a session cookie, `/logout` revokes it,
//! `/user` echoes the resolved identity. None of this is contest logic;
//! the core only ever sees the resulting [`User`].

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use soundclash_common::User;

use super::{session_token, SESSION_COOKIE};
use crate::error::ContestError;
use crate::AppState;

const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const PROFILE_URL: &str = "https://discord.com/api/users/@me";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/discord", get(login))
        .route("/auth/callback", get(callback))
        .route("/logout", get(logout))
        .route("/user", get(user_info))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct DiscordProfile {
    id: String,
    username: String,
    global_name: Option<String>,
    avatar: Option<String>,
}

async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, ContestError> {
    let oauth = &state.settings.oauth;
    let url = reqwest::Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", oauth.callback_url.as_str()),
            ("response_type", "code"),
            ("scope", "identify"),
        ],
    )
    .map_err(|e| ContestError::Internal(e.to_string()))?;
    Ok(Redirect::to(url.as_str()))
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ContestError> {
    let oauth = &state.settings.oauth;

    let token: TokenResponse = state
        .http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", params.code.as_str()),
            ("redirect_uri", oauth.callback_url.as_str()),
        ])
        .send()
        .await
        .map_err(|_| ContestError::Unauthenticated)?
        .error_for_status()
        .map_err(|_| ContestError::Unauthenticated)?
        .json()
        .await
        .map_err(|_| ContestError::Unauthenticated)?;

    let profile: DiscordProfile = state
        .http
        .get(PROFILE_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|_| ContestError::Unauthenticated)?
        .error_for_status()
        .map_err(|_| ContestError::Unauthenticated)?
        .json()
        .await
        .map_err(|_| ContestError::Unauthenticated)?;

    let user = User {
        id: profile.id,
        display_name: profile.global_name.unwrap_or(profile.username),
        avatar_ref: profile.avatar,
    };
    info!(user = %user.id, name = %user.display_name, "user authenticated");

    let token = state.sessions.new_session(user);
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    ([(header::SET_COOKIE, cookie)], Redirect::to("/"))
}

async fn user_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, ContestError> {
    let token = session_token(&headers).ok_or(ContestError::Unauthenticated)?;
    let user = state
        .sessions
        .resolve(&token)
        .ok_or(ContestError::Unauthenticated)?;
    Ok(Json(user))
}
