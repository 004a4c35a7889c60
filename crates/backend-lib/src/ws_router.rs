// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! HTTP/WebSocket router and connection admission.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics::counter;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::debug;

use crate::auth::{self, discord};
use crate::metrics as keys;
use crate::websocket;
use crate::AppState;

/// Create the application router: the WebSocket endpoint, the thin auth
/// routes, and static serving of the client and the uploaded audio.
pub fn create_router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(&state.settings.upload_dir);
    let public = ServeDir::new(&state.settings.public_dir);

    Router::new()
        .route("/ws", get(ws_handler))
        .merge(discord::routes())
        .nest_service("/uploads", uploads)
        .fallback_service(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for WebSocket connections.
///
/// Identity is resolved *before* the upgrade: a connection without a
/// live session cookie is turned away with 401 and never reaches the
/// contest.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = auth::session_token(&headers).and_then(|token| state.sessions.resolve(&token));

    let Some(user) = user else {
        debug!("unauthenticated websocket upgrade rejected");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    counter!(keys::WS_CONNECTION).increment(1);
    ws.on_upgrade(move |socket| websocket::handle_connection(socket, state, user))
}
