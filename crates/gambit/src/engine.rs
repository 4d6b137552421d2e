//! A single timed game between two players.
//!
//! [`Match`] owns the rules state of one game: seats, clocks, move log,
//! position, draw negotiation and spectators. Every operation is synchronous
//! and takes the current time explicitly. Legality and board termination are
//! delegated to a [`RulesOracle`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MatchError;
use crate::rules::{RulesOracle, StandardRules};
use crate::time::elapsed_ms;
use crate::types::{
    Clocks, ConnectionId, DrawOffer, DrawReason, LegalMove, MatchId, MatchStatus, MatchView,
    MoveInput, MoveRecord, Outcome, Participant, ParticipantId, Phase, Seats, Side, TimeControl,
    Wager, WinReason,
};

/// Result of a move attempt that was not rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// The move was played. `outcome` is set when it ended the game.
    Applied {
        record: MoveRecord,
        outcome: Option<Outcome>,
    },
    /// The mover's clock had already run out; the move was discarded.
    TimedOut(Outcome),
}

impl MoveOutcome {
    /// Result of the game, if this attempt finished it.
    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Applied { outcome, .. } => *outcome,
            Self::TimedOut(outcome) => Some(*outcome),
        }
    }
}

/// Result of polling the side to move's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagCheck {
    /// The side to move ran out of time and lost.
    Flagged(Outcome),
    /// Time left before the flag falls.
    Running { remaining: Duration },
}

/// Result of offering a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawResponse {
    /// Offer recorded; waiting on the opponent.
    Offered,
    /// The opponent had a live offer out, so the game is drawn.
    Agreed(Outcome),
}

/// One chess game and its full state.
pub struct Match<O: RulesOracle = StandardRules> {
    match_id: MatchId,
    seats: Seats,
    wager: Wager,
    time_control: TimeControl,
    clocks: Clocks,
    moves: Vec<MoveRecord>,
    oracle: Arc<O>,
    position: O::Position,
    status: MatchStatus,
    spectators: Vec<ParticipantId>,
    draw_offer: Option<DrawOffer>,
    draw_offer_window: Duration,
    last_move_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl<O: RulesOracle> Match<O> {
    /// Create a match from the oracle's initial position.
    ///
    /// The match is active if both seats are filled and waiting otherwise.
    pub fn new(
        match_id: MatchId,
        seats: Seats,
        wager: Wager,
        time_control: TimeControl,
        oracle: Arc<O>,
        draw_offer_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, MatchError> {
        let position = oracle.initial_position();
        Self::from_position(
            match_id,
            seats,
            wager,
            time_control,
            oracle,
            position,
            draw_offer_window,
            now,
        )
    }

    /// Create a match starting from a custom position.
    #[allow(clippy::too_many_arguments)]
    pub fn from_position(
        match_id: MatchId,
        seats: Seats,
        wager: Wager,
        time_control: TimeControl,
        oracle: Arc<O>,
        position: O::Position,
        draw_offer_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, MatchError> {
        let status = match (&seats.white, &seats.black) {
            (None, None) => {
                return Err(MatchError::InvalidSeating {
                    reason: "at least one seat must be filled".to_string(),
                })
            }
            (Some(w), Some(b)) if w.participant_id == b.participant_id => {
                return Err(MatchError::InvalidSeating {
                    reason: format!("{} cannot play both sides", w.participant_id),
                })
            }
            (Some(_), Some(_)) => MatchStatus::Active,
            _ => MatchStatus::Waiting,
        };
        if time_control.initial_seconds == 0 {
            return Err(MatchError::InvalidTimeControl {
                input: time_control.to_string(),
                reason: "initial time must be positive".to_string(),
            });
        }

        Ok(Self {
            match_id,
            seats,
            wager,
            clocks: Clocks::new(time_control.initial_ms()),
            time_control,
            moves: Vec::new(),
            oracle,
            position,
            status,
            spectators: Vec::new(),
            draw_offer: None,
            draw_offer_window,
            last_move_at: now,
            created_at: now,
        })
    }

    // --- Accessors ---

    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    pub const fn status(&self) -> MatchStatus {
        self.status
    }

    pub const fn phase(&self) -> Phase {
        self.status.phase()
    }

    pub const fn outcome(&self) -> Option<Outcome> {
        self.status.outcome()
    }

    pub const fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Side to move.
    pub fn turn(&self) -> Side {
        self.oracle.turn(&self.position)
    }

    pub const fn clocks(&self) -> Clocks {
        self.clocks
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn players(&self) -> &Seats {
        &self.seats
    }

    pub fn side_of(&self, participant_id: &ParticipantId) -> Option<Side> {
        self.seats.side_of(participant_id)
    }

    pub fn spectators(&self) -> &[ParticipantId] {
        &self.spectators
    }

    pub const fn time_control(&self) -> TimeControl {
        self.time_control
    }

    pub const fn wager(&self) -> Wager {
        self.wager
    }

    pub const fn draw_offer(&self) -> Option<DrawOffer> {
        self.draw_offer
    }

    pub const fn last_move_at(&self) -> DateTime<Utc> {
        self.last_move_at
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn position(&self) -> &O::Position {
        &self.position
    }

    pub fn fen(&self) -> String {
        self.oracle.to_fen(&self.position)
    }

    /// Legal moves for the side to move; empty unless the match is active.
    pub fn legal_moves(&self) -> Vec<LegalMove> {
        if self.status != MatchStatus::Active {
            return Vec::new();
        }
        self.oracle.legal_moves(&self.position)
    }

    // --- Lifecycle ---

    /// Seat `participant` in the open seat and start the game.
    ///
    /// Clocks restart from the initial time so the wait for an opponent is
    /// never charged to anyone.
    pub fn join(&mut self, participant: Participant, now: DateTime<Utc>) -> Result<Side, MatchError> {
        if self.status != MatchStatus::Waiting {
            return Err(MatchError::MatchNotJoinable {
                phase: self.phase(),
            });
        }
        if self.seats.side_of(&participant.participant_id).is_some() {
            return Err(MatchError::AlreadyInMatch);
        }
        let side = self.seats.open_side().ok_or(MatchError::MatchNotJoinable {
            phase: self.phase(),
        })?;

        self.spectators
            .retain(|s| s != &participant.participant_id);
        *self.seats.get_mut(side) = Some(participant);
        self.status = MatchStatus::Active;
        self.clocks = Clocks::new(self.time_control.initial_ms());
        self.last_move_at = now;
        Ok(side)
    }

    /// Attempt a move for `participant_id`.
    ///
    /// The thinking time since the last move is charged first. If that
    /// exhausts the mover's clock the game is lost on time and the move is
    /// discarded. A rejected move leaves every field untouched.
    pub fn apply_move(
        &mut self,
        mv: &MoveInput,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome, MatchError> {
        self.ensure_active()?;
        let turn = self.turn();
        if self.seats.side_of(participant_id) != Some(turn) {
            return Err(MatchError::NotYourTurn { expected: turn });
        }

        let elapsed = elapsed_ms(self.last_move_at, now);
        let remaining = self.clocks.get(turn) - elapsed;
        if remaining <= 0 {
            return Ok(MoveOutcome::TimedOut(self.flag(turn)));
        }

        let (position, played) = self.oracle.apply_move(&self.position, mv)?;

        let clock_after = remaining + self.time_control.increment_ms();
        self.clocks.set(turn, clock_after);

        let record = MoveRecord {
            ply: u32::try_from(self.moves.len() + 1).unwrap_or(u32::MAX),
            side: turn,
            participant_id: participant_id.clone(),
            san: played.san,
            uci: played.uci,
            fen_after: self.oracle.to_fen(&position),
            at: now,
            elapsed_ms: elapsed,
            clock_after_ms: clock_after,
        };
        self.position = position;
        self.moves.push(record.clone());
        self.last_move_at = now;
        self.draw_offer = None;

        let outcome = self.oracle.termination(&self.position);
        if let Some(outcome) = outcome {
            self.finish(outcome);
        }
        Ok(MoveOutcome::Applied { record, outcome })
    }

    /// Check whether the side to move has run out of time.
    pub fn check_flag(&mut self, now: DateTime<Utc>) -> Result<FlagCheck, MatchError> {
        self.ensure_active()?;
        let turn = self.turn();
        let remaining = self.remaining_ms(turn, now);
        if remaining <= 0 {
            return Ok(FlagCheck::Flagged(self.flag(turn)));
        }
        Ok(FlagCheck::Running {
            remaining: Duration::from_millis(remaining.unsigned_abs()),
        })
    }

    /// Time `side` would have left if it were charged up to `now`.
    pub fn remaining_ms(&self, side: Side, now: DateTime<Utc>) -> i64 {
        if self.status == MatchStatus::Active && self.turn() == side {
            self.clocks.get(side) - elapsed_ms(self.last_move_at, now)
        } else {
            self.clocks.get(side)
        }
    }

    /// Overwrite a clock, e.g. to grant time odds. Finished games are frozen.
    pub fn set_clock(&mut self, side: Side, ms: i64) -> Result<(), MatchError> {
        if self.is_finished() {
            return Err(MatchError::GameNotActive {
                phase: self.phase(),
            });
        }
        self.clocks.set(side, ms);
        Ok(())
    }

    pub fn resign(&mut self, participant_id: &ParticipantId) -> Result<Outcome, MatchError> {
        self.forfeit(participant_id, WinReason::Resignation)
    }

    /// Forfeit on behalf of a player who left and did not come back.
    pub fn abandon(&mut self, participant_id: &ParticipantId) -> Result<Outcome, MatchError> {
        self.forfeit(participant_id, WinReason::Abandonment)
    }

    fn forfeit(
        &mut self,
        participant_id: &ParticipantId,
        reason: WinReason,
    ) -> Result<Outcome, MatchError> {
        self.ensure_active()?;
        let side = self.seated_side(participant_id)?;
        let outcome = Outcome::win(side.opposite(), reason);
        self.finish(outcome);
        Ok(outcome)
    }

    // --- Draw negotiation ---

    /// Propose a draw. If the opponent already has a live offer out, the
    /// two offers meet and the game is drawn.
    pub fn offer_draw(
        &mut self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<DrawResponse, MatchError> {
        self.ensure_active()?;
        let side = self.seated_side(participant_id)?;

        if let Some(offer) = self.draw_offer {
            if offer.offered_by == side.opposite() && self.offer_is_live(&offer, now) {
                return Ok(DrawResponse::Agreed(self.agree_draw()));
            }
        }
        self.draw_offer = Some(DrawOffer {
            offered_by: side,
            offered_at: now,
        });
        Ok(DrawResponse::Offered)
    }

    /// Accept the opponent's pending offer.
    pub fn accept_draw(
        &mut self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Outcome, MatchError> {
        self.ensure_active()?;
        let side = self.seated_side(participant_id)?;
        let offer = self.draw_offer.ok_or(MatchError::NoDrawOffer)?;
        if offer.offered_by == side {
            return Err(MatchError::CannotAcceptOwnOffer);
        }
        if !self.offer_is_live(&offer, now) {
            self.draw_offer = None;
            return Err(MatchError::NoDrawOffer);
        }
        Ok(self.agree_draw())
    }

    /// Turn down the opponent's pending offer.
    pub fn decline_draw(&mut self, participant_id: &ParticipantId) -> Result<(), MatchError> {
        self.ensure_active()?;
        let side = self.seated_side(participant_id)?;
        match self.draw_offer {
            Some(offer) if offer.offered_by == side.opposite() => {
                self.draw_offer = None;
                Ok(())
            }
            _ => Err(MatchError::NoDrawOffer),
        }
    }

    fn offer_is_live(&self, offer: &DrawOffer, now: DateTime<Utc>) -> bool {
        let age = elapsed_ms(offer.offered_at, now);
        u128::from(age.unsigned_abs()) <= self.draw_offer_window.as_millis()
    }

    fn agree_draw(&mut self) -> Outcome {
        let outcome = Outcome::draw(DrawReason::Agreement);
        self.finish(outcome);
        outcome
    }

    // --- Spectators and connections ---

    /// Returns `true` if the participant was not already spectating.
    pub fn add_spectator(&mut self, participant_id: ParticipantId) -> Result<bool, MatchError> {
        if self.seats.side_of(&participant_id).is_some() {
            return Err(MatchError::AlreadyInMatch);
        }
        if self.spectators.contains(&participant_id) {
            return Ok(false);
        }
        self.spectators.push(participant_id);
        Ok(true)
    }

    pub fn remove_spectator(&mut self, participant_id: &ParticipantId) -> Result<(), MatchError> {
        let before = self.spectators.len();
        self.spectators.retain(|s| s != participant_id);
        if self.spectators.len() == before {
            return Err(MatchError::ParticipantNotInMatch);
        }
        Ok(())
    }

    /// Record the connection a seated player is now using.
    pub fn set_connection(
        &mut self,
        participant_id: &ParticipantId,
        connection: ConnectionId,
    ) -> Result<(), MatchError> {
        let side = self.seated_side(participant_id)?;
        if let Some(seat) = self.seats.get_mut(side) {
            seat.connection = Some(connection);
        }
        Ok(())
    }

    /// Owned, serializable projection of the current state.
    pub fn snapshot(&self) -> MatchView {
        MatchView {
            match_id: self.match_id.clone(),
            seats: self.seats.clone(),
            wager: self.wager,
            time_control: self.time_control,
            clocks: self.clocks,
            turn: self.turn(),
            status: self.status,
            fen: self.fen(),
            in_check: self.oracle.is_check(&self.position),
            moves: self.moves.clone(),
            spectators: self.spectators.clone(),
            draw_offer: self.draw_offer,
            last_move_at: self.last_move_at,
            created_at: self.created_at,
        }
    }

    // --- Internals ---

    fn ensure_active(&self) -> Result<(), MatchError> {
        if self.status != MatchStatus::Active {
            return Err(MatchError::GameNotActive {
                phase: self.phase(),
            });
        }
        Ok(())
    }

    fn seated_side(&self, participant_id: &ParticipantId) -> Result<Side, MatchError> {
        self.seats
            .side_of(participant_id)
            .ok_or(MatchError::ParticipantNotInMatch)
    }

    fn flag(&mut self, side: Side) -> Outcome {
        self.clocks.set(side, 0);
        let outcome = Outcome::win(side.opposite(), WinReason::Timeout);
        self.finish(outcome);
        outcome
    }

    fn finish(&mut self, outcome: Outcome) {
        self.status = MatchStatus::Finished { outcome };
        self.draw_offer = None;
    }
}

impl<O: RulesOracle> std::fmt::Debug for Match<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("match_id", &self.match_id)
            .field("status", &self.status)
            .field("fen", &self.fen())
            .field("clocks", &self.clocks)
            .field("moves", &self.moves.len())
            .finish()
    }
}
