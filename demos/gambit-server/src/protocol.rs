//! JSON messages exchanged over the WebSocket.
//!
//! Every message is an object with a `type` tag, e.g.
//! `{"type":"make_move","match_id":"pvp_1","move":"e2e4"}`.

use gambit::events::MatchEvent;
use gambit::types::{ConnectionId, MatchId, MatchView, MoveInput, ParticipantId, Side, Wager};
use serde::{Deserialize, Serialize};

/// Requests from a client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the connection. Must come first.
    Hello { participant_id: ParticipantId },
    /// Open a match and sit on `side` (white if omitted).
    CreateMatch {
        #[serde(default)]
        wager: Wager,
        #[serde(default)]
        time_control: Option<String>,
        #[serde(default)]
        side: Option<Side>,
    },
    JoinMatch { match_id: MatchId },
    /// Withdraw a match nobody has joined yet.
    CancelMatch { match_id: MatchId },
    MakeMove {
        match_id: MatchId,
        #[serde(rename = "move")]
        mv: MoveInput,
    },
    Resign { match_id: MatchId },
    OfferDraw { match_id: MatchId },
    AcceptDraw { match_id: MatchId },
    DeclineDraw { match_id: MatchId },
    Spectate { match_id: MatchId },
    StopSpectating { match_id: MatchId },
    ListMatches,
}

/// Messages to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `hello`. `current` is the match the player is seated in, if any.
    Welcome {
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        current: Option<MatchView>,
    },
    /// Something happened in a room this connection is in.
    Event(MatchEvent),
    Lobby {
        waiting: Vec<MatchView>,
        active: Vec<MatchView>,
    },
    /// A request from this connection failed.
    Error { kind: String, message: String },
}

impl ServerMessage {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
