//! WebSocket streaming of mission events.
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use survey_core::events::mission_topic;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::api::error::{caller_from_headers, ApiError};
use crate::notify::{EventReceiver, NotifyError};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StreamQuery {
    mission_id: Option<String>,
}

/// Handler for WebSocket connections.
///
/// With `mission_id` the stream follows that mission's topic; without it the
/// caller receives every event of their organization.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    let caller = caller_from_headers(&headers)?;

    let topic = match params.mission_id.as_deref() {
        Some(mission_id) => {
            // Ownership check: foreign missions look like missing ones.
            state.orchestrator().get_mission(&caller, mission_id).await?;
            Some(mission_topic(mission_id))
        }
        None => None,
    };
    let rx = match topic.as_deref() {
        Some(topic) => state.bus().subscribe(topic),
        None => state.bus().subscribe_all(),
    }
    .map_err(unavailable)?;

    let organization_id = caller.organization_id;
    let bus = state.bus().clone();
    Ok(ws
        .on_upgrade(move |socket| async move {
            handle_socket(socket, rx, organization_id).await;
            if let Some(topic) = topic {
                bus.forget_topic(&topic);
            }
        })
        .into_response())
}

fn unavailable(err: NotifyError) -> ApiError {
    ApiError::Mission(survey_core::MissionError::dependency(
        survey_core::MissionOperation::Read,
        "event stream",
        err,
    ))
}

/// Forward events until either side goes away; `rx` is dropped on return.
async fn handle_socket(mut socket: WebSocket, mut rx: EventReceiver, organization_id: String) {
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if event.organization_id != organization_id {
                            continue;
                        }
                        let payload = match serde_json::to_string(event.as_ref()) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("Dropping unserializable event for {}: {}", event.mission_id, e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Stream subscriber lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
}
