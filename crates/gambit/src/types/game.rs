//! Match-related data shapes: seats, clocks, move records and the broadcast view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chess::Side;
use super::ids::{ConnectionId, MatchId, ParticipantId};
use super::outcome::{MatchStatus, Phase};
use super::time_control::TimeControl;
use crate::error::MatchError;

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: ParticipantId,
    /// Transport connection the player was last seen on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionId>,
}

impl Participant {
    #[must_use]
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            connection: None,
        }
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }
}

/// Who sits on each side. Either seat may be empty while waiting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    pub white: Option<Participant>,
    pub black: Option<Participant>,
}

impl Seats {
    /// Seat one participant on `side`, leaving the other seat open.
    #[must_use]
    pub fn one(side: Side, participant: Participant) -> Self {
        let mut seats = Self::default();
        *seats.get_mut(side) = Some(participant);
        seats
    }

    #[must_use]
    pub fn both(white: Participant, black: Participant) -> Self {
        Self {
            white: Some(white),
            black: Some(black),
        }
    }

    #[must_use]
    pub const fn get(&self, side: Side) -> Option<&Participant> {
        match side {
            Side::White => self.white.as_ref(),
            Side::Black => self.black.as_ref(),
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut Option<Participant> {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    /// Side occupied by the given participant.
    #[must_use]
    pub fn side_of(&self, participant_id: &ParticipantId) -> Option<Side> {
        Side::ALL.into_iter().find(|side| {
            self.get(*side)
                .is_some_and(|p| &p.participant_id == participant_id)
        })
    }

    /// Number of filled seats.
    #[must_use]
    pub fn filled(&self) -> usize {
        usize::from(self.white.is_some()) + usize::from(self.black.is_some())
    }

    /// First empty seat, white first.
    #[must_use]
    pub fn open_side(&self) -> Option<Side> {
        Side::ALL.into_iter().find(|side| self.get(*side).is_none())
    }

    /// Ids of the seated players.
    pub fn player_ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.white
            .iter()
            .chain(self.black.iter())
            .map(|p| &p.participant_id)
    }
}

/// Stake attached to a match. Informational only; settlement happens elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Wager(f64);

impl Wager {
    pub const ZERO: Self = Self(0.0);

    /// Accepts any finite, non-negative amount.
    pub fn new(amount: f64) -> Result<Self, MatchError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(MatchError::InvalidWager { amount });
        }
        Ok(Self(amount))
    }

    #[must_use]
    pub const fn amount(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Wager {
    type Error = MatchError;

    fn try_from(amount: f64) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Wager> for f64 {
    fn from(w: Wager) -> Self {
        w.0
    }
}

/// Remaining time per side, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clocks {
    pub white_ms: i64,
    pub black_ms: i64,
}

impl Clocks {
    #[must_use]
    pub const fn new(initial_ms: i64) -> Self {
        Self {
            white_ms: initial_ms,
            black_ms: initial_ms,
        }
    }

    #[must_use]
    pub const fn get(&self, side: Side) -> i64 {
        match side {
            Side::White => self.white_ms,
            Side::Black => self.black_ms,
        }
    }

    /// Store a value for `side`, clamped at zero.
    pub fn set(&mut self, side: Side, ms: i64) {
        let ms = ms.max(0);
        match side {
            Side::White => self.white_ms = ms,
            Side::Black => self.black_ms = ms,
        }
    }
}

/// Record of a single applied move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Half-move number, starting at 1.
    pub ply: u32,
    pub side: Side,
    pub participant_id: ParticipantId,
    pub san: String,
    pub uci: String,
    pub fen_after: String,
    /// When the move was accepted.
    pub at: DateTime<Utc>,
    /// Thinking time charged to the mover.
    pub elapsed_ms: i64,
    /// Mover's clock after the increment was added.
    pub clock_after_ms: i64,
}

/// An outstanding draw proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOffer {
    pub offered_by: Side,
    pub offered_at: DateTime<Utc>,
}

/// Read-only projection of a match, suitable for broadcasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub match_id: MatchId,
    pub seats: Seats,
    pub wager: Wager,
    pub time_control: TimeControl,
    pub clocks: Clocks,
    pub turn: Side,
    #[serde(flatten)]
    pub status: MatchStatus,
    /// Position in Forsyth-Edwards Notation.
    pub fen: String,
    pub in_check: bool,
    pub moves: Vec<MoveRecord>,
    pub spectators: Vec<ParticipantId>,
    pub draw_offer: Option<DrawOffer>,
    /// Basis of the running clock: the side to move has been thinking since then.
    pub last_move_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl MatchView {
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.status.phase()
    }
}
