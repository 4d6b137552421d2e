//! HTTP routes: WebSocket upgrade, health, lobby and metrics.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use gambit::error::MatchError;
use gambit::types::{ConnectionId, MatchId, MatchView, ParticipantId};
use gambit::MatchRegistry;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::ws::handle_socket;

/// Shared application state.
pub struct AppState {
    /// The one registry every connection talks to.
    pub registry: Arc<MatchRegistry>,
    /// Prometheus registry the match metrics are registered with.
    pub prometheus: prometheus::Registry,
    /// Open sockets and the participant each one identified as.
    pub connections: DashMap<ConnectionId, Option<ParticipantId>>,
}

impl AppState {
    pub fn new(registry: Arc<MatchRegistry>, prometheus: prometheus::Registry) -> Self {
        Self {
            registry,
            prometheus,
            connections: DashMap::new(),
        }
    }

    /// Forget a closed socket.
    ///
    /// Returns the participant it belonged to if none of their other
    /// sockets is still open.
    pub fn release_connection(&self, connection: &ConnectionId) -> Option<ParticipantId> {
        let (_, participant) = self.connections.remove(connection)?;
        let participant = participant?;
        let still_connected = self
            .connections
            .iter()
            .any(|entry| entry.value().as_ref() == Some(&participant));
        (!still_connected).then_some(participant)
    }
}

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub matches: usize,
    pub connections: usize,
}

/// Lobby listing.
#[derive(Clone, Debug, Serialize)]
pub struct MatchesResponse {
    pub waiting: Vec<MatchView>,
    pub active: Vec<MatchView>,
}

/// Create the HTTP router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health_check))
        .route("/matches", get(list_matches))
        .route("/matches/:id", get(get_match))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        matches: state.registry.len(),
        connections: state.connections.len(),
    })
}

async fn list_matches(State(state): State<Arc<AppState>>) -> Json<MatchesResponse> {
    Json(MatchesResponse {
        waiting: state.registry.waiting_matches(),
        active: state.registry.active_matches(),
    })
}

async fn get_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MatchView>, AppError> {
    let match_id = MatchId::new(id).map_err(|e| AppError::bad_request(e.to_string()))?;
    Ok(Json(state.registry.snapshot(&match_id)?))
}

/// Prometheus text exposition.
async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.prometheus.gather(), &mut buffer)
        .map_err(|e| AppError::internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    ))
}

/// Error response carrying an HTTP status.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message,
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message,
        }
    }
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        let status = match err {
            MatchError::MatchNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(serde_json::json!({
                "error": self.message,
                "kind": self.kind,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_errors_map_to_statuses() {
        let err = AppError::from(MatchError::MatchNotFound {
            match_id: MatchId::new("gone").unwrap(),
        });
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.kind, "match_not_found");

        let err = AppError::from(MatchError::NoDrawOffer);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
