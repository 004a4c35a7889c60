// ==================
// crates/backend-lib/src/websocket.rs
// ==================
//! Per-connection WebSocket handling.
//!
//! Each admitted connection runs three tasks: one forwarding outbound
//! events onto the socket, one projecting the contest fan-out channel
//! into this connection (mapping the per-user budget table to the
//! recipient's own `initHearts`), and the main loop parsing inbound
//! events and dispatching them to the contest actor.
//!
//! Admission order matters: the fan-out subscription is taken before
//! the catch-up request so nothing broadcast in between is lost, but
//! the pump only starts draining it after the catch-up is queued, so a
//! broadcast newer than the snapshot can never be displayed ahead of it.
//!
//! The submit pipeline lives here because it is the one slow path:
//! preconditions are validated by the actor, then the track lookup,
//! audio download and asset write happen on this task with no claim on
//! the session, then the commit re-checks before appending.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

use soundclash_common::{ClientEvent, ServerEvent, Submission, User};

use crate::contest::Fanout;
use crate::error::ContestError;
use crate::validation;
use crate::AppState;

pub async fn handle_connection(socket: WebSocket, state: Arc<AppState>, user: User) {
    info!(user = %user.id, name = %user.display_name, "websocket connected");

    let (mut socket_tx, mut socket_rx) = socket.split();

    // Channel for everything this connection sends out
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(32);

    // Task 1: serialize outbound events onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = client_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if socket_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Subscribe before catch-up; the receiver buffers until the pump
    // task starts draining it after the catch-up is queued.
    let fanout_rx = state.contest.subscribe();

    // Ordered catch-up so a late joiner reconstructs full session state
    match state.contest.join(user.clone()).await {
        Ok(events) => {
            forward(&client_tx, events).await;
        },
        Err(e) => warn!(user = %user.id, error = %e, "catch-up failed"),
    }

    // Task 2: project the session fan-out into this connection
    let fanout_task = tokio::spawn(run_fanout_pump(
        fanout_rx,
        client_tx.clone(),
        user.id.clone(),
    ));

    // Main loop: parse and dispatch inbound events
    'read: while let Some(Ok(message)) = socket_rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(ClientEvent::Submit { link }) => {
                    if let Err(e) = submit_track(&state, &user, &link).await {
                        deliver_error(&client_tx, &user, e).await;
                    }
                },
                Ok(event) => match state.contest.dispatch(user.clone(), event).await {
                    Ok(replies) => {
                        if !forward(&client_tx, replies).await {
                            // outbound channel is gone, stop reading
                            break 'read;
                        }
                    },
                    Err(e) => deliver_error(&client_tx, &user, e).await,
                },
                Err(e) => {
                    // unparseable payloads are dropped; the connection stays open
                    debug!(user = %user.id, error = %e, "malformed event dropped");
                },
            },
            Message::Close(_) => break,
            _ => {}, // Ignore other message types for now
        }
    }

    state.contest.leave(&user.id);
    info!(user = %user.id, "websocket disconnected");

    fanout_task.abort();
    send_task.abort();
}

/// Queue a batch of outbound events for the send task. Returns false
/// once the channel is closed and the connection should wind down.
async fn forward(client_tx: &mpsc::Sender<ServerEvent>, events: Vec<ServerEvent>) -> bool {
    for event in events {
        if client_tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

/// Relay session broadcasts to one connection, projecting the per-user
/// budget table to the recipient's own `initHearts`.
async fn run_fanout_pump(
    mut fanout_rx: broadcast::Receiver<Fanout>,
    client_tx: mpsc::Sender<ServerEvent>,
    user_id: String,
) {
    loop {
        match fanout_rx.recv().await {
            Ok(Fanout::Event(event)) => {
                if client_tx.send(event).await.is_err() {
                    break;
                }
            },
            Ok(Fanout::Budgets(budgets)) => {
                // each recipient sees its own budget, not the toggler's
                let hearts = budgets.get(&user_id).copied().unwrap_or(0);
                if client_tx
                    .send(ServerEvent::InitHearts { hearts })
                    .await
                    .is_err()
                {
                    break;
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(user = %user_id, skipped, "fan-out receiver lagged");
            },
            Err(RecvError::Closed) => break,
        }
    }
}

/// Surface an error to the originating connection only, or just log it
/// for the silent variants.
async fn deliver_error(client_tx: &mpsc::Sender<ServerEvent>, user: &User, error: ContestError) {
    if error.is_silent() {
        debug!(user = %user.id, error = %error, "event dropped");
        return;
    }
    let _ = client_tx
        .send(ServerEvent::Error {
            message: error.client_message(),
        })
        .await;
}

/// The full submit pipeline: validate, fetch, persist, commit.
///
/// The session is only held for the validate and commit steps; the
/// external calls in between are bounded by the media client timeout.
async fn submit_track(state: &Arc<AppState>, user: &User, link: &str) -> Result<(), ContestError> {
    let link = validation::validate_track_link(link)?;

    state.contest.begin_submit(&user.id).await?;

    let metadata = state.media.lookup(link).await?;
    let title = validation::sanitize_title(&metadata.title);

    let audio = state.media.fetch_audio(link).await?;
    let audio_ref = state.assets.persist(&audio, &title).await?;

    let submission = Submission {
        id: title.clone(),
        source_link: link.to_string(),
        track_ref: metadata.id,
        audio_ref,
        hearts: 0,
        submitter: user.clone(),
    };

    // duplicate precondition is re-checked here; state may have changed
    // while the audio was in flight
    if let Err(e) = state.contest.commit_submit(submission).await {
        // the session moved on, don't leave the orphaned audio behind
        if let Err(cleanup) = state.assets.remove(&title).await {
            warn!(title = %title, error = %cleanup, "orphaned audio cleanup failed");
        }
        return Err(e);
    }
    Ok(())
}
