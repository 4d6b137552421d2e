//! Lifecycle and result types.

use serde::{Deserialize, Serialize};

use super::chess::Side;

/// Coarse lifecycle stage of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// One seat is empty.
    Waiting,
    /// Both seats filled, moves accepted.
    Active,
    /// Terminal.
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Why a side won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinReason {
    Checkmate,
    Timeout,
    Resignation,
    Abandonment,
}

/// Why the game was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawReason {
    /// Both players agreed.
    Agreement,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

/// Flat reason tag, for logs, metrics and the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Checkmate,
    Timeout,
    Resignation,
    Abandonment,
    DrawAgreed,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

impl EndReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkmate => "checkmate",
            Self::Timeout => "timeout",
            Self::Resignation => "resignation",
            Self::Abandonment => "abandonment",
            Self::DrawAgreed => "draw-agreed",
            Self::Stalemate => "stalemate",
            Self::InsufficientMaterial => "insufficient-material",
            Self::ThreefoldRepetition => "threefold-repetition",
            Self::FiftyMoveRule => "fifty-move-rule",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// One side won.
    Decisive { winner: Side, reason: WinReason },
    /// Nobody won.
    Drawn { reason: DrawReason },
}

impl Outcome {
    #[must_use]
    pub const fn win(winner: Side, reason: WinReason) -> Self {
        Self::Decisive { winner, reason }
    }

    #[must_use]
    pub const fn draw(reason: DrawReason) -> Self {
        Self::Drawn { reason }
    }

    /// The winning side, if any.
    #[must_use]
    pub const fn winner(&self) -> Option<Side> {
        match self {
            Self::Decisive { winner, .. } => Some(*winner),
            Self::Drawn { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_draw(&self) -> bool {
        matches!(self, Self::Drawn { .. })
    }

    #[must_use]
    pub const fn reason(&self) -> EndReason {
        match self {
            Self::Decisive { reason, .. } => match reason {
                WinReason::Checkmate => EndReason::Checkmate,
                WinReason::Timeout => EndReason::Timeout,
                WinReason::Resignation => EndReason::Resignation,
                WinReason::Abandonment => EndReason::Abandonment,
            },
            Self::Drawn { reason } => match reason {
                DrawReason::Agreement => EndReason::DrawAgreed,
                DrawReason::Stalemate => EndReason::Stalemate,
                DrawReason::InsufficientMaterial => EndReason::InsufficientMaterial,
                DrawReason::ThreefoldRepetition => EndReason::ThreefoldRepetition,
                DrawReason::FiftyMoveRule => EndReason::FiftyMoveRule,
            },
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decisive { winner, .. } => write!(f, "{winner} wins by {}", self.reason()),
            Self::Drawn { .. } => write!(f, "draw by {}", self.reason()),
        }
    }
}

/// Lifecycle state together with the result, so a finished match always has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Active,
    Finished { outcome: Outcome },
}

impl MatchStatus {
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Waiting => Phase::Waiting,
            Self::Active => Phase::Active,
            Self::Finished { .. } => Phase::Finished,
        }
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Finished { outcome } => Some(*outcome),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered_by_lifecycle() {
        assert!(Phase::Waiting < Phase::Active);
        assert!(Phase::Active < Phase::Finished);
    }

    #[test]
    fn outcome_reason_tags() {
        let o = Outcome::win(Side::Black, WinReason::Timeout);
        assert_eq!(o.winner(), Some(Side::Black));
        assert_eq!(o.reason(), EndReason::Timeout);
        assert_eq!(o.to_string(), "black wins by timeout");

        let d = Outcome::draw(DrawReason::Agreement);
        assert!(d.is_draw());
        assert_eq!(d.reason().as_str(), "draw-agreed");
    }

    #[test]
    fn finished_status_serializes_with_outcome() {
        let status = MatchStatus::Finished {
            outcome: Outcome::win(Side::White, WinReason::Checkmate),
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["phase"], "finished");
        assert_eq!(json["outcome"]["result"], "decisive");
        assert_eq!(json["outcome"]["winner"], "white");
        assert_eq!(json["outcome"]["reason"], "checkmate");

        assert_eq!(MatchStatus::Active.outcome(), None);
        assert_eq!(status.phase(), Phase::Finished);
    }
}
