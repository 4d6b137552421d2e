//! Chess rules as an external collaborator.
//!
//! The match engine never decides legality or game termination itself. It
//! asks a [`RulesOracle`], which owns the representation of a position.
//! [`StandardRules`] is the shakmaty-backed implementation used everywhere
//! outside of tests.

pub mod standard;

pub use standard::{BoardState, StandardRules};

use crate::error::MatchError;
use crate::types::{DrawReason, LegalMove, MoveInput, Outcome, PlayedMove, Side, WinReason};

/// Errors reported by a rules oracle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// Text that is neither UCI nor SAN, or an unknown square.
    #[error("unreadable move: {0}")]
    InvalidNotation(String),

    /// Well-formed move that is not legal in the position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}

impl From<RulesError> for MatchError {
    fn from(err: RulesError) -> Self {
        let reason = match err {
            RulesError::InvalidNotation(m) => format!("unreadable move {m}"),
            RulesError::IllegalMove(m) => m,
            RulesError::InvalidFen(f) => format!("invalid position {f}"),
        };
        MatchError::IllegalMove { reason }
    }
}

/// Legality, move generation and termination detection for one variant.
pub trait RulesOracle: Send + Sync + 'static {
    /// Board state, replaced wholesale on each accepted move.
    type Position: Clone + Send + Sync + 'static;

    fn initial_position(&self) -> Self::Position;

    /// Play `mv` on `position`, returning the successor position.
    ///
    /// `position` is left untouched whether or not the move is accepted.
    fn apply_move(
        &self,
        position: &Self::Position,
        mv: &MoveInput,
    ) -> Result<(Self::Position, PlayedMove), RulesError>;

    fn is_checkmate(&self, position: &Self::Position) -> bool;

    fn is_stalemate(&self, position: &Self::Position) -> bool;

    /// Why the position is a draw, if it is one (stalemate included).
    fn draw_reason(&self, position: &Self::Position) -> Option<DrawReason>;

    fn is_drawn(&self, position: &Self::Position) -> bool {
        self.draw_reason(position).is_some()
    }

    fn is_check(&self, position: &Self::Position) -> bool;

    fn legal_moves(&self, position: &Self::Position) -> Vec<LegalMove>;

    /// Side to move.
    fn turn(&self, position: &Self::Position) -> Side;

    /// Portable notation (FEN) of the position.
    fn to_fen(&self, position: &Self::Position) -> String;

    /// Terminal result of the position, if the game is over on the board.
    fn termination(&self, position: &Self::Position) -> Option<Outcome> {
        if self.is_checkmate(position) {
            // The side to move is mated.
            let winner = self.turn(position).opposite();
            return Some(Outcome::win(winner, WinReason::Checkmate));
        }
        self.draw_reason(position).map(Outcome::draw)
    }
}
