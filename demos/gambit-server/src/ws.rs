//! Per-connection WebSocket session.
//!
//! A connection joins a room for every match it creates, joins, plays in
//! or watches. Registry events are forwarded only for those rooms. Failed
//! requests are answered to this connection alone.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use gambit::error::MatchError;
use gambit::events::MatchEvent;
use gambit::types::{ConnectionId, MatchId, Participant, ParticipantId, Seats, Side};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::protocol::{ClientMessage, ServerMessage};

/// Why a client request could not be served.
#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error("send hello before anything else")]
    Unidentified,
    #[error(transparent)]
    Match(#[from] MatchError),
}

impl SessionError {
    fn into_message(self) -> ServerMessage {
        let kind = match &self {
            Self::Unidentified => "unidentified",
            Self::Match(err) => err.kind(),
        };
        ServerMessage::error(kind, self.to_string())
    }
}

struct Session {
    connection: ConnectionId,
    participant: Option<ParticipantId>,
    rooms: HashSet<MatchId>,
}

impl Session {
    fn participant(&self) -> Result<&ParticipantId, SessionError> {
        self.participant.as_ref().ok_or(SessionError::Unidentified)
    }
}

/// Top-level WebSocket handler, spawned per connection.
pub async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let mut session = Session {
        connection: ConnectionId::new(),
        participant: None,
        rooms: HashSet::new(),
    };
    state.connections.insert(session.connection, None);
    debug!(connection = %session.connection, "socket opened");

    // Subscribe before handling any request so our own events are not missed.
    let mut events = state.registry.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        let outgoing = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => forward(&mut session, event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(connection = %session.connection, skipped, "socket lagging behind match events");
                    None
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&state, &mut session, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    debug!(connection = %session.connection, error = %e, "socket error");
                    break;
                }
            },
        };

        if let Some(message) = outgoing {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }

    if let Some(participant_id) = state.release_connection(&session.connection) {
        state.registry.participant_disconnected(&participant_id);
    }
    debug!(connection = %session.connection, "socket closed");
}

/// Pass on events for rooms this connection is in.
fn forward(session: &mut Session, event: MatchEvent) -> Option<ServerMessage> {
    if !session.rooms.contains(event.match_id()) {
        return None;
    }
    if event.closes_room() {
        session.rooms.remove(event.match_id());
    }
    Some(ServerMessage::Event(event))
}

fn handle_text(state: &AppState, session: &mut Session, text: &str) -> Option<ServerMessage> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => return Some(ServerMessage::error("invalid_message", e.to_string())),
    };
    // Successful requests are mostly answered through the room's events.
    dispatch(state, session, message).unwrap_or_else(|err| Some(err.into_message()))
}

fn dispatch(
    state: &AppState,
    session: &mut Session,
    message: ClientMessage,
) -> Result<Option<ServerMessage>, SessionError> {
    let registry = &state.registry;
    match message {
        ClientMessage::Hello { participant_id } => {
            let current = registry.participant_connected(&participant_id, session.connection);
            if let Some(view) = &current {
                session.rooms.insert(view.match_id.clone());
            }
            state
                .connections
                .insert(session.connection, Some(participant_id.clone()));
            info!(connection = %session.connection, %participant_id, "participant identified");
            session.participant = Some(participant_id.clone());
            Ok(Some(ServerMessage::Welcome {
                participant_id,
                connection_id: session.connection,
                current,
            }))
        }
        ClientMessage::CreateMatch {
            wager,
            time_control,
            side,
        } => {
            let player = Participant::new(session.participant()?.clone())
                .with_connection(session.connection);
            let match_id = MatchId::generate();
            registry.create_match(
                match_id.clone(),
                Seats::one(side.unwrap_or(Side::White), player),
                wager,
                time_control.as_deref(),
            )?;
            // Events already queued are filtered when forwarded, after this.
            session.rooms.insert(match_id);
            Ok(None)
        }
        ClientMessage::JoinMatch { match_id } => {
            let player = Participant::new(session.participant()?.clone())
                .with_connection(session.connection);
            registry.join_match(&match_id, player)?;
            session.rooms.insert(match_id);
            Ok(None)
        }
        ClientMessage::MakeMove { match_id, mv } => {
            registry.apply_move(&match_id, session.participant()?, &mv)?;
            session.rooms.insert(match_id);
            Ok(None)
        }
        ClientMessage::CancelMatch { match_id } => {
            registry.cancel_match(&match_id, session.participant()?)?;
            session.rooms.remove(&match_id);
            Ok(None)
        }
        ClientMessage::Resign { match_id } => {
            registry.resign(&match_id, session.participant()?)?;
            Ok(None)
        }
        ClientMessage::OfferDraw { match_id } => {
            registry.offer_draw(&match_id, session.participant()?)?;
            Ok(None)
        }
        ClientMessage::AcceptDraw { match_id } => {
            registry.accept_draw(&match_id, session.participant()?)?;
            Ok(None)
        }
        ClientMessage::DeclineDraw { match_id } => {
            registry.decline_draw(&match_id, session.participant()?)?;
            Ok(None)
        }
        ClientMessage::Spectate { match_id } => {
            let participant_id = session.participant()?.clone();
            registry.add_spectator(&match_id, &participant_id)?;
            session.rooms.insert(match_id);
            Ok(None)
        }
        ClientMessage::StopSpectating { match_id } => {
            let participant_id = session.participant()?.clone();
            registry.remove_spectator(&match_id, &participant_id)?;
            session.rooms.remove(&match_id);
            Ok(None)
        }
        ClientMessage::ListMatches => Ok(Some(ServerMessage::Lobby {
            waiting: registry.waiting_matches(),
            active: registry.active_matches(),
        })),
    }
}
