//! Type definitions for the match engine.
//!
//! ## Modules
//!
//! - `chess` - Board-level types (Side, MoveInput, LegalMove)
//! - `game` - Match data shapes (Seats, Clocks, MoveRecord, MatchView)
//! - `ids` - Identifiers (MatchId, ParticipantId, ConnectionId)
//! - `outcome` - Lifecycle and results (Phase, MatchStatus, Outcome)
//! - `time_control` - TimeControl parsing

pub mod chess;
pub mod game;
pub mod ids;
pub mod outcome;
pub mod time_control;

pub use chess::{LegalMove, MoveInput, PlayedMove, Promotion, Side};
pub use game::{Clocks, DrawOffer, MatchView, MoveRecord, Participant, Seats, Wager};
pub use ids::{ConnectionId, IdError, MatchId, ParticipantId};
pub use outcome::{DrawReason, EndReason, MatchStatus, Outcome, Phase, WinReason};
pub use time_control::TimeControl;
