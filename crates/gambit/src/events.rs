//! Outbound notifications produced by the registry.

use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::types::{MatchId, MatchView, Outcome, ParticipantId};

/// Something that happened to a match, for everyone watching it.
///
/// Events for one match are sent while that match is locked, so a
/// subscriber sees them in the order the state changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    /// A match was opened.
    Created { view: MatchView },
    /// The second player sat down and the clocks started.
    Started { view: MatchView },
    /// State changed (move, draw offer, spectator list).
    Snapshot { view: MatchView },
    /// A move attempt was refused.
    MoveRejected {
        match_id: MatchId,
        participant_id: ParticipantId,
        attempted: String,
        error: MatchError,
    },
    /// The game is over.
    Ended { outcome: Outcome, view: MatchView },
    /// A waiting match was withdrawn before anyone joined.
    Cancelled {
        match_id: MatchId,
        participant_id: ParticipantId,
    },
    /// The match was dropped from memory.
    Evicted { match_id: MatchId },
}

impl MatchEvent {
    /// Room the event belongs to.
    #[must_use]
    pub fn match_id(&self) -> &MatchId {
        match self {
            Self::Created { view }
            | Self::Started { view }
            | Self::Snapshot { view }
            | Self::Ended { view, .. } => &view.match_id,
            Self::MoveRejected { match_id, .. }
            | Self::Cancelled { match_id, .. }
            | Self::Evicted { match_id } => match_id,
        }
    }

    /// Whether the match is gone from the registry after this event.
    #[must_use]
    pub const fn closes_room(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Evicted { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Started { .. } => "started",
            Self::Snapshot { .. } => "snapshot",
            Self::MoveRejected { .. } => "move_rejected",
            Self::Ended { .. } => "ended",
            Self::Cancelled { .. } => "cancelled",
            Self::Evicted { .. } => "evicted",
        }
    }
}
