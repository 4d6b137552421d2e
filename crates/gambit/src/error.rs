use serde::{Deserialize, Serialize};

use crate::types::{MatchId, Phase, Side};

/// Errors returned by match and registry operations.
///
/// Every variant is an expected rejection: the caller reports it to the
/// client that caused it and carries on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchError {
    #[error("not your turn - it is {expected}'s turn")]
    NotYourTurn { expected: Side },

    #[error("match is not active (currently {phase})")]
    GameNotActive { phase: Phase },

    #[error("illegal move: {reason}")]
    IllegalMove { reason: String },

    #[error("participant is not in this match")]
    ParticipantNotInMatch,

    #[error("match {match_id} not found")]
    MatchNotFound { match_id: MatchId },

    #[error("match {match_id} already exists")]
    MatchAlreadyExists { match_id: MatchId },

    #[error("match is not open for joining (currently {phase})")]
    MatchNotJoinable { phase: Phase },

    #[error("only a waiting match can be cancelled (currently {phase})")]
    MatchNotCancellable { phase: Phase },

    #[error("participant already takes part in this match")]
    AlreadyInMatch,

    #[error("participant is already playing in match {match_id}")]
    ParticipantBusy { match_id: MatchId },

    #[error("invalid seating: {reason}")]
    InvalidSeating { reason: String },

    #[error("invalid time control {input:?}: {reason}")]
    InvalidTimeControl { input: String, reason: String },

    #[error("invalid wager {amount}")]
    InvalidWager { amount: f64 },

    #[error("no draw offer to accept")]
    NoDrawOffer,

    #[error("cannot accept your own draw offer")]
    CannotAcceptOwnOffer,

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl MatchError {
    /// Stable tag for the wire and for metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotYourTurn { .. } => "not_your_turn",
            Self::GameNotActive { .. } => "game_not_active",
            Self::IllegalMove { .. } => "illegal_move",
            Self::ParticipantNotInMatch => "participant_not_in_match",
            Self::MatchNotFound { .. } => "match_not_found",
            Self::MatchAlreadyExists { .. } => "match_already_exists",
            Self::MatchNotJoinable { .. } => "match_not_joinable",
            Self::MatchNotCancellable { .. } => "match_not_cancellable",
            Self::AlreadyInMatch => "already_in_match",
            Self::ParticipantBusy { .. } => "participant_busy",
            Self::InvalidSeating { .. } => "invalid_seating",
            Self::InvalidTimeControl { .. } => "invalid_time_control",
            Self::InvalidWager { .. } => "invalid_wager",
            Self::NoDrawOffer => "no_draw_offer",
            Self::CannotAcceptOwnOffer => "cannot_accept_own_offer",
            Self::InvalidConfig { .. } => "invalid_config",
        }
    }

    /// Whether this rejection is reported to the room as a rejected move.
    #[must_use]
    pub const fn is_move_rejection(&self) -> bool {
        matches!(self, Self::NotYourTurn { .. } | Self::IllegalMove { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = MatchError::NotYourTurn {
            expected: Side::Black,
        };
        assert_eq!(err.to_string(), "not your turn - it is black's turn");

        let err = MatchError::GameNotActive {
            phase: Phase::Finished,
        };
        assert_eq!(err.to_string(), "match is not active (currently finished)");
    }

    #[test]
    fn kind_matches_serde_tag() {
        let errors = [
            MatchError::IllegalMove {
                reason: "e2e5".into(),
            },
            MatchError::ParticipantNotInMatch,
            MatchError::NoDrawOffer,
            MatchError::GameNotActive {
                phase: Phase::Waiting,
            },
        ];
        for err in errors {
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["kind"], err.kind());
        }
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MatchError>();
    }
}
