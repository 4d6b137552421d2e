//! In-memory coordinator for timed two-player chess matches.
//!
//! A [`MatchRegistry`] owns every live [`Match`], serialises operations on
//! each one, runs clocks with increment, and handles resignation, draw
//! negotiation, spectators, flag fall, abandonment and eviction. Legality
//! and board termination come from a [`RulesOracle`]; [`StandardRules`]
//! is backed by shakmaty.
//!
//! ```no_run
//! use gambit::prelude::*;
//!
//! # fn demo() -> Result<(), MatchError> {
//! let registry = MatchRegistry::with_defaults();
//! let alice = ParticipantId::new("alice").unwrap();
//! let bob = ParticipantId::new("bob").unwrap();
//! let id = MatchId::generate();
//!
//! registry.create_match(
//!     id.clone(),
//!     Seats::one(Side::White, Participant::new(alice.clone())),
//!     Wager::ZERO,
//!     Some("5+3"),
//! )?;
//! registry.join_match(&id, Participant::new(bob))?;
//! registry.apply_move(&id, &alice, &MoveInput::notation("e4"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod registry;
pub mod rules;
pub mod testing;
pub mod time;
pub mod timers;
pub mod types;

pub use config::ArenaConfig;
pub use engine::{DrawResponse, FlagCheck, Match, MoveOutcome};
pub use error::MatchError;
pub use events::MatchEvent;
pub use metrics::MatchMetrics;
pub use registry::{MatchRegistry, SharedMatch};
pub use rules::{RulesOracle, StandardRules};
pub use time::{SystemTimeSource, TimeSource};

/// Prelude module for convenient glob imports.
pub mod prelude {
    pub use crate::config::ArenaConfig;
    pub use crate::engine::{DrawResponse, FlagCheck, Match, MoveOutcome};
    pub use crate::error::MatchError;
    pub use crate::events::MatchEvent;
    pub use crate::registry::{MatchRegistry, SharedMatch};
    pub use crate::rules::{RulesOracle, StandardRules};
    pub use crate::types::{
        ConnectionId, MatchId, MatchStatus, MatchView, MoveInput, Outcome, Participant,
        ParticipantId, Phase, Seats, Side, TimeControl, Wager,
    };
}
