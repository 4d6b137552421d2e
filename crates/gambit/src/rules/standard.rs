//! Standard chess rules backed by shakmaty.
//!
//! This module provides:
//! - Position management and FEN parsing
//! - Move parsing (UCI, SAN, explicit squares) and application
//! - Legal move generation
//! - Game end detection (checkmate, stalemate, draw conditions)

use std::collections::HashMap;

use shakmaty::{
    fen::Fen, san::San, san::SanPlus, uci::UciMove, CastlingMode, Chess, EnPassantMode, Move,
    Position, Role, Square,
};

use super::{RulesError, RulesOracle};
use crate::types::{DrawReason, LegalMove, MoveInput, PlayedMove, Promotion, Side};

/// Halfmove clock value at which the fifty-move rule applies.
const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// A shakmaty position plus the repetition history needed for threefold detection.
#[derive(Debug, Clone)]
pub struct BoardState {
    position: Chess,
    seen: HashMap<String, u8>,
}

impl BoardState {
    fn new(position: Chess) -> Self {
        let mut state = Self {
            position,
            seen: HashMap::new(),
        };
        state.record();
        state
    }

    /// Placement, side to move, castling rights and en passant square.
    fn repetition_key(&self) -> String {
        let fen = Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string();
        fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
    }

    fn record(&mut self) {
        *self.seen.entry(self.repetition_key()).or_insert(0) += 1;
    }

    fn repetitions(&self) -> u8 {
        self.seen
            .get(&self.repetition_key())
            .copied()
            .unwrap_or_default()
    }

    /// Halfmoves since the last capture or pawn move.
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.position.halfmoves()
    }

    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new(Chess::default())
    }
}

/// Orthodox chess.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    /// Build a position from a FEN string, e.g. for odds games or puzzles.
    pub fn position_from_fen(&self, fen: &str) -> Result<BoardState, RulesError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|e| RulesError::InvalidFen(format!("{e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidFen(format!("{e}")))?;
        Ok(BoardState::new(position))
    }

    /// Resolve client input to a shakmaty move in `position`.
    fn parse_move(position: &Chess, mv: &MoveInput) -> Result<Move, RulesError> {
        match mv {
            MoveInput::Squares {
                from,
                to,
                promotion,
            } => {
                let from: Square = from
                    .trim()
                    .parse()
                    .map_err(|_| RulesError::InvalidNotation(mv.describe()))?;
                let to: Square = to
                    .trim()
                    .parse()
                    .map_err(|_| RulesError::InvalidNotation(mv.describe()))?;
                let uci = UciMove::Normal {
                    from,
                    to,
                    promotion: promotion.map(role_of),
                };
                uci.to_move(position)
                    .map_err(|_| RulesError::IllegalMove(mv.describe()))
            }
            MoveInput::Notation(text) => {
                let text = text.trim();
                if let Ok(uci) = text.parse::<UciMove>() {
                    return uci
                        .to_move(position)
                        .map_err(|_| RulesError::IllegalMove(text.to_string()));
                }
                let san: San = text
                    .trim_end_matches(['+', '#'])
                    .parse()
                    .map_err(|_| RulesError::InvalidNotation(text.to_string()))?;
                san.to_move(position)
                    .map_err(|_| RulesError::IllegalMove(text.to_string()))
            }
        }
    }

    fn describe_legal_move(position: &Chess, m: &Move) -> LegalMove {
        let san = San::from_move(position, m);
        let uci = UciMove::from_move(m, CastlingMode::Standard);

        let mut after = position.clone();
        after.play_unchecked(m);

        LegalMove {
            uci: uci.to_string(),
            san: san.to_string(),
            from: m.from().map_or_else(String::new, |sq| sq.to_string()),
            to: m.to().to_string(),
            promotion: m.promotion().and_then(Promotion::from_role),
            is_capture: m.is_capture(),
            is_check: after.is_check(),
        }
    }
}

fn role_of(promotion: Promotion) -> Role {
    match promotion {
        Promotion::Knight => Role::Knight,
        Promotion::Bishop => Role::Bishop,
        Promotion::Rook => Role::Rook,
        Promotion::Queen => Role::Queen,
    }
}

impl RulesOracle for StandardRules {
    type Position = BoardState;

    fn initial_position(&self) -> BoardState {
        BoardState::default()
    }

    fn apply_move(
        &self,
        state: &BoardState,
        mv: &MoveInput,
    ) -> Result<(BoardState, PlayedMove), RulesError> {
        let m = Self::parse_move(&state.position, mv)?;
        if !state.position.is_legal(&m) {
            return Err(RulesError::IllegalMove(mv.describe()));
        }

        // SAN depends on the position before the move.
        let san = SanPlus::from_move(state.position.clone(), &m).to_string();
        let uci = UciMove::from_move(&m, CastlingMode::Standard).to_string();

        let position = state
            .position
            .clone()
            .play(&m)
            .map_err(|_| RulesError::IllegalMove(mv.describe()))?;

        let mut next = BoardState {
            position,
            seen: state.seen.clone(),
        };
        next.record();

        Ok((next, PlayedMove { san, uci }))
    }

    fn is_checkmate(&self, state: &BoardState) -> bool {
        state.position.is_checkmate()
    }

    fn is_stalemate(&self, state: &BoardState) -> bool {
        state.position.is_stalemate()
    }

    fn draw_reason(&self, state: &BoardState) -> Option<DrawReason> {
        if state.position.is_checkmate() {
            None
        } else if state.position.is_stalemate() {
            Some(DrawReason::Stalemate)
        } else if state.position.is_insufficient_material() {
            Some(DrawReason::InsufficientMaterial)
        } else if state.halfmove_clock() >= FIFTY_MOVE_HALFMOVES {
            Some(DrawReason::FiftyMoveRule)
        } else if state.repetitions() >= 3 {
            Some(DrawReason::ThreefoldRepetition)
        } else {
            None
        }
    }

    fn is_check(&self, state: &BoardState) -> bool {
        state.position.is_check()
    }

    fn legal_moves(&self, state: &BoardState) -> Vec<LegalMove> {
        state
            .position
            .legal_moves()
            .iter()
            .map(|m| Self::describe_legal_move(&state.position, m))
            .collect()
    }

    fn turn(&self, state: &BoardState) -> Side {
        state.position.turn().into()
    }

    fn to_fen(&self, state: &BoardState) -> String {
        Fen::from_position(state.position.clone(), EnPassantMode::Legal).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Outcome, WinReason};

    fn play(rules: &StandardRules, state: &BoardState, mv: &str) -> BoardState {
        rules
            .apply_move(state, &MoveInput::notation(mv))
            .unwrap_or_else(|e| panic!("{mv}: {e}"))
            .0
    }

    #[test]
    fn test_starting_position() {
        let rules = StandardRules;
        let pos = rules.initial_position();
        assert_eq!(rules.turn(&pos), Side::White);
        assert!(!rules.is_check(&pos));
        assert_eq!(rules.termination(&pos), None);
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.fullmove_number(), 1);
        assert_eq!(rules.legal_moves(&pos).len(), 20);
    }

    #[test]
    fn test_uci_and_san_inputs() {
        let rules = StandardRules;
        let pos = rules.initial_position();

        let (pos, played) = rules.apply_move(&pos, &MoveInput::notation("e2e4")).unwrap();
        assert_eq!(played.san, "e4");
        assert_eq!(played.uci, "e2e4");
        assert_eq!(rules.turn(&pos), Side::Black);

        let (pos, played) = rules.apply_move(&pos, &MoveInput::notation("e5")).unwrap();
        assert_eq!(played.uci, "e7e5");

        let squares = MoveInput::Squares {
            from: "g1".into(),
            to: "f3".into(),
            promotion: None,
        };
        let (_, played) = rules.apply_move(&pos, &squares).unwrap();
        assert_eq!(played.san, "Nf3");
    }

    #[test]
    fn test_illegal_move_leaves_position_alone() {
        let rules = StandardRules;
        let pos = rules.initial_position();
        let before = rules.to_fen(&pos);

        let err = rules
            .apply_move(&pos, &MoveInput::notation("e2e5"))
            .unwrap_err();
        assert!(matches!(err, RulesError::IllegalMove(_)));
        assert_eq!(rules.to_fen(&pos), before);
    }

    #[test]
    fn test_unreadable_move() {
        let rules = StandardRules;
        let pos = rules.initial_position();
        let err = rules
            .apply_move(&pos, &MoveInput::notation("banana"))
            .unwrap_err();
        assert!(matches!(err, RulesError::InvalidNotation(_)));

        let squares = MoveInput::Squares {
            from: "z9".into(),
            to: "e4".into(),
            promotion: None,
        };
        assert!(matches!(
            rules.apply_move(&pos, &squares),
            Err(RulesError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_checkmate_fools_mate() {
        let rules = StandardRules;
        let mut pos = rules.initial_position();
        for mv in ["f2f3", "e7e5", "g2g4"] {
            pos = play(&rules, &pos, mv);
        }
        let (pos, played) = rules.apply_move(&pos, &MoveInput::notation("d8h4")).unwrap();
        assert_eq!(played.san, "Qh4#");

        assert!(rules.is_checkmate(&pos));
        assert!(!rules.is_drawn(&pos));
        assert_eq!(
            rules.termination(&pos),
            Some(Outcome::win(Side::Black, WinReason::Checkmate))
        );
    }

    #[test]
    fn test_stalemate() {
        let rules = StandardRules;
        let pos = rules
            .position_from_fen("8/8/8/8/8/6q1/5k2/7K w - - 0 1")
            .unwrap();
        assert!(rules.is_stalemate(&pos));
        assert_eq!(rules.draw_reason(&pos), Some(DrawReason::Stalemate));
        assert!(rules.legal_moves(&pos).is_empty());
    }

    #[test]
    fn test_insufficient_material() {
        let rules = StandardRules;
        let pos = rules
            .position_from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1")
            .unwrap();
        assert_eq!(
            rules.draw_reason(&pos),
            Some(DrawReason::InsufficientMaterial)
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let rules = StandardRules;
        let pos = rules
            .position_from_fen("4k3/8/8/8/8/8/4P3/4K2R w - - 100 80")
            .unwrap();
        assert_eq!(rules.draw_reason(&pos), Some(DrawReason::FiftyMoveRule));
    }

    #[test]
    fn test_threefold_repetition() {
        let rules = StandardRules;
        let mut pos = rules.initial_position();
        // Knights out and back twice: the start position occurs a third time.
        for mv in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1"] {
            pos = play(&rules, &pos, mv);
            assert_eq!(rules.draw_reason(&pos), None, "after {mv}");
        }
        pos = play(&rules, &pos, "f6g8");
        assert_eq!(
            rules.draw_reason(&pos),
            Some(DrawReason::ThreefoldRepetition)
        );
    }

    #[test]
    fn test_promotion_and_castling() {
        let rules = StandardRules;
        let pos = rules
            .position_from_fen("8/P7/8/8/8/7k/8/4K3 w - - 0 1")
            .unwrap();
        let (_, played) = rules.apply_move(&pos, &MoveInput::notation("a7a8q")).unwrap();
        assert_eq!(played.san, "a8=Q");

        let pos = rules
            .position_from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1")
            .unwrap();
        let (_, played) = rules.apply_move(&pos, &MoveInput::notation("O-O")).unwrap();
        assert_eq!(played.uci, "e1g1");
    }

    #[test]
    fn test_legal_move_info() {
        let rules = StandardRules;
        let pos = rules
            .position_from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
            .unwrap();
        let moves = rules.legal_moves(&pos);
        let exd5 = moves.iter().find(|m| m.uci == "e4d5").unwrap();
        assert!(exd5.is_capture);
        assert_eq!(exd5.san, "exd5");
        assert_eq!(exd5.from, "e4");
    }

    #[test]
    fn test_invalid_fen() {
        assert!(matches!(
            StandardRules.position_from_fen("not a valid fen"),
            Err(RulesError::InvalidFen(_))
        ));
    }
}
