//! Board-level types shared by the match engine and the rules oracle.

use serde::{Deserialize, Serialize};

/// Side of the board a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// White pieces, moves first.
    White,
    /// Black pieces.
    Black,
}

impl Side {
    /// Both sides, white first.
    pub const ALL: [Side; 2] = [Side::White, Side::Black];

    /// Get the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

impl From<Side> for shakmaty::Color {
    fn from(s: Side) -> Self {
        match s {
            Side::White => Self::White,
            Side::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// Piece a pawn may promote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Promotion {
    #[serde(alias = "n")]
    Knight,
    #[serde(alias = "b")]
    Bishop,
    #[serde(alias = "r")]
    Rook,
    #[serde(alias = "q")]
    Queen,
}

impl Promotion {
    /// Parse the single-letter UCI/chess.js form (`q`, `r`, `b`, `n`).
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'n' => Some(Self::Knight),
            'b' => Some(Self::Bishop),
            'r' => Some(Self::Rook),
            'q' => Some(Self::Queen),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
        }
    }

    /// Map a shakmaty role; kings and pawns are never promotion targets.
    #[must_use]
    pub fn from_role(role: shakmaty::Role) -> Option<Self> {
        match role {
            shakmaty::Role::Knight => Some(Self::Knight),
            shakmaty::Role::Bishop => Some(Self::Bishop),
            shakmaty::Role::Rook => Some(Self::Rook),
            shakmaty::Role::Queen => Some(Self::Queen),
            shakmaty::Role::Pawn | shakmaty::Role::King => None,
        }
    }
}

/// A move as submitted by a client.
///
/// Clients send either a notation string (`"e2e4"`, `"e7e8q"`, `"Nf3"`,
/// `"O-O"`) or the explicit squares of the move. Legality is decided by the
/// rules oracle, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveInput {
    /// Explicit source and destination squares.
    Squares {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        promotion: Option<Promotion>,
    },
    /// UCI or SAN text.
    Notation(String),
}

impl MoveInput {
    #[must_use]
    pub fn notation(s: impl Into<String>) -> Self {
        Self::Notation(s.into())
    }

    /// Collapse to a single UCI-like string where possible, for logs and rejections.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Notation(s) => s.clone(),
            Self::Squares {
                from,
                to,
                promotion,
            } => {
                let mut s = format!("{from}{to}");
                if let Some(p) = promotion {
                    s.push(p.as_char());
                }
                s
            }
        }
    }
}

impl std::fmt::Display for MoveInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A move the oracle accepted, in both notations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    /// Standard Algebraic Notation (e.g., "Nf3", "O-O").
    pub san: String,
    /// Universal Chess Interface notation (e.g., "g1f3", "e1g1").
    pub uci: String,
}

/// Legal move information for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMove {
    pub uci: String,
    pub san: String,
    pub from: String,
    pub to: String,
    pub promotion: Option<Promotion>,
    pub is_capture: bool,
    pub is_check: bool,
}
