//! In-memory owner of every live match.
//!
//! [`MatchRegistry`] indexes matches by id and by seated player, serialises
//! all operations on a match behind that match's mutex, publishes
//! [`MatchEvent`]s and drives the time-based behaviour: flag fall,
//! abandonment after a disconnect, withdrawal of waiting matches whose
//! creator left, and eviction of finished matches.
//!
//! Lock order: the seating lock, then a match, then [`DashMap`] guards. A
//! match is never locked while a [`DashMap`] guard is held. Handles are
//! cloned out of the index first, then locked.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::config::ArenaConfig;
use crate::engine::{DrawResponse, FlagCheck, Match, MoveOutcome};
use crate::error::MatchError;
use crate::events::MatchEvent;
use crate::metrics::MatchMetrics;
use crate::rules::{RulesOracle, StandardRules};
use crate::time::{SystemTimeSource, TimeSource};
use crate::timers::DeferredTasks;
use crate::types::{
    ConnectionId, MatchId, MatchView, MoveInput, Outcome, Participant, ParticipantId, Phase,
    Seats, TimeControl, Wager,
};

/// Shared handle to a match. Lock it to read or mutate.
pub type SharedMatch<O = StandardRules> = Arc<Mutex<Match<O>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    FlagFall(MatchId),
    Eviction(MatchId),
    Abandonment {
        participant_id: ParticipantId,
        match_id: MatchId,
    },
}

impl TimerKey {
    fn belongs_to(&self, id: &MatchId) -> bool {
        match self {
            Self::FlagFall(m) | Self::Eviction(m) => m == id,
            Self::Abandonment { match_id, .. } => match_id == id,
        }
    }
}

/// Owner of all live matches and their timers.
pub struct MatchRegistry<O: RulesOracle = StandardRules> {
    config: ArenaConfig,
    oracle: Arc<O>,
    time: Arc<dyn TimeSource>,
    metrics: Arc<MatchMetrics>,
    matches: DashMap<MatchId, SharedMatch<O>>,
    /// Seated players only, never spectators.
    by_participant: DashMap<ParticipantId, MatchId>,
    /// Players whose connection dropped during an active game.
    disconnected: DashMap<ParticipantId, MatchId>,
    /// Serialises the busy check and the player index insert of
    /// `create_match` and `join_match`.
    seating: Mutex<()>,
    timers: DeferredTasks<TimerKey>,
    events: broadcast::Sender<MatchEvent>,
    me: Weak<Self>,
}

impl MatchRegistry<StandardRules> {
    /// Standard chess, default configuration, system clock, unregistered metrics.
    pub fn with_defaults() -> Arc<Self> {
        Self::build(
            ArenaConfig::default(),
            StandardRules,
            Arc::new(SystemTimeSource),
            Arc::new(MatchMetrics::unregistered()),
        )
    }
}

impl<O: RulesOracle> MatchRegistry<O> {
    /// Create a registry after validating `config`.
    pub fn new(
        config: ArenaConfig,
        oracle: O,
        time: Arc<dyn TimeSource>,
        metrics: Arc<MatchMetrics>,
    ) -> Result<Arc<Self>, MatchError> {
        config.validate()?;
        Ok(Self::build(config, oracle, time, metrics))
    }

    fn build(
        config: ArenaConfig,
        oracle: O,
        time: Arc<dyn TimeSource>,
        metrics: Arc<MatchMetrics>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new_cyclic(|me| Self {
            config,
            oracle: Arc::new(oracle),
            time,
            metrics,
            matches: DashMap::new(),
            by_participant: DashMap::new(),
            disconnected: DashMap::new(),
            seating: Mutex::new(()),
            timers: DeferredTasks::new(),
            events,
            me: me.clone(),
        })
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MatchMetrics {
        &self.metrics
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    // --- Creation and lookup ---

    /// Open a match with one or both seats filled.
    ///
    /// `time_control` uses the `"minutes+increment"` form; `None` selects
    /// the configured default.
    #[instrument(skip_all, fields(match_id = %match_id))]
    pub fn create_match(
        &self,
        match_id: MatchId,
        seats: Seats,
        wager: Wager,
        time_control: Option<&str>,
    ) -> Result<MatchView, MatchError> {
        let time_control = match time_control {
            Some(raw) => TimeControl::parse(raw)?,
            None => self.config.default_time_control,
        };
        let _seating = self.seating.lock();
        for pid in seats.player_ids() {
            self.ensure_available(pid, None)?;
        }
        if self.matches.contains_key(&match_id) {
            return Err(MatchError::MatchAlreadyExists { match_id });
        }

        let now = self.time.now();
        let created = Match::new(
            match_id.clone(),
            seats,
            wager,
            time_control,
            Arc::clone(&self.oracle),
            self.config.draw_offer_window,
            now,
        )?;
        let shared: SharedMatch<O> = Arc::new(Mutex::new(created));
        let m = shared.lock();

        match self.matches.entry(match_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(MatchError::MatchAlreadyExists { match_id });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&shared));
            }
        }
        for pid in m.players().player_ids() {
            self.by_participant.insert(pid.clone(), match_id.clone());
            self.disconnected.remove(pid);
        }
        self.metrics.matches.inc();

        let view = m.snapshot();
        info!(
            phase = %view.phase(),
            time_control = %time_control,
            wager = wager.amount(),
            "match created"
        );
        self.publish(MatchEvent::Created { view: view.clone() });
        if m.phase() == Phase::Active {
            self.arm_flag_timer(&m, now);
        }
        Ok(view)
    }

    /// Take the open seat of a waiting match.
    #[instrument(skip(self, participant), fields(participant_id = %participant.participant_id))]
    pub fn join_match(
        &self,
        match_id: &MatchId,
        participant: Participant,
    ) -> Result<MatchView, MatchError> {
        let _seating = self.seating.lock();
        self.ensure_available(&participant.participant_id, Some(match_id))?;
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        if !self.is_registered(match_id, &shared) {
            return Err(MatchError::MatchNotFound {
                match_id: match_id.clone(),
            });
        }
        let now = self.time.now();

        let pid = participant.participant_id.clone();
        let side = m.join(participant, now)?;
        self.by_participant.insert(pid.clone(), match_id.clone());
        self.disconnected.remove(&pid);

        let view = m.snapshot();
        info!(%side, "match started");
        self.publish(MatchEvent::Started { view: view.clone() });
        self.arm_flag_timer(&m, now);
        Ok(view)
    }

    pub fn get(&self, match_id: &MatchId) -> Option<SharedMatch<O>> {
        self.matches.get(match_id).map(|e| Arc::clone(e.value()))
    }

    /// The match a player is seated in. Spectating does not count.
    pub fn get_by_participant(&self, participant_id: &ParticipantId) -> Option<SharedMatch<O>> {
        let match_id = self
            .by_participant
            .get(participant_id)
            .map(|e| e.value().clone())?;
        self.get(&match_id)
    }

    pub fn snapshot(&self, match_id: &MatchId) -> Result<MatchView, MatchError> {
        Ok(self.require(match_id)?.lock().snapshot())
    }

    /// Matches waiting for an opponent, oldest first.
    pub fn waiting_matches(&self) -> Vec<MatchView> {
        self.views_in(Phase::Waiting)
    }

    /// Matches in progress, oldest first.
    pub fn active_matches(&self) -> Vec<MatchView> {
        self.views_in(Phase::Active)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Number of pending deferred tasks across all matches.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_disconnected(&self, participant_id: &ParticipantId) -> bool {
        self.disconnected.contains_key(participant_id)
    }

    // --- Game operations ---

    /// Play a move. Rejections caused by the move itself are also published
    /// to the room as [`MatchEvent::MoveRejected`].
    #[instrument(skip(self, mv), fields(attempted = %mv))]
    pub fn apply_move(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
        mv: &MoveInput,
    ) -> Result<MoveOutcome, MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        let now = self.time.now();

        let result = match m.apply_move(mv, participant_id, now) {
            Ok(result) => result,
            Err(err) => {
                if err.is_move_rejection() {
                    self.metrics.rejected_moves.inc();
                    debug!(error = %err, "move rejected");
                    self.publish(MatchEvent::MoveRejected {
                        match_id: match_id.clone(),
                        participant_id: participant_id.clone(),
                        attempted: mv.describe(),
                        error: err.clone(),
                    });
                }
                return Err(err);
            }
        };

        if let MoveOutcome::Applied { record, .. } = &result {
            self.metrics.moves.inc();
            debug!(ply = record.ply, san = %record.san, elapsed_ms = record.elapsed_ms, "move applied");
        }
        match result.outcome() {
            Some(outcome) => self.on_finished(&m, outcome),
            None => {
                self.publish(MatchEvent::Snapshot { view: m.snapshot() });
                self.arm_flag_timer(&m, now);
            }
        }
        Ok(result)
    }

    #[instrument(skip(self))]
    pub fn resign(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<Outcome, MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        let outcome = m.resign(participant_id)?;
        self.on_finished(&m, outcome);
        Ok(outcome)
    }

    /// Offer a draw, or agree to one if the opponent's offer is still open.
    #[instrument(skip(self))]
    pub fn offer_draw(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<DrawResponse, MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        let response = m.offer_draw(participant_id, self.time.now())?;
        match response {
            DrawResponse::Agreed(outcome) => self.on_finished(&m, outcome),
            DrawResponse::Offered => {
                debug!("draw offered");
                self.publish(MatchEvent::Snapshot { view: m.snapshot() });
            }
        }
        Ok(response)
    }

    #[instrument(skip(self))]
    pub fn accept_draw(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<Outcome, MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        let outcome = m.accept_draw(participant_id, self.time.now())?;
        self.on_finished(&m, outcome);
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub fn decline_draw(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<(), MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        m.decline_draw(participant_id)?;
        self.publish(MatchEvent::Snapshot { view: m.snapshot() });
        Ok(())
    }

    /// Returns `true` if the participant was not already watching.
    #[instrument(skip(self))]
    pub fn add_spectator(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<bool, MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        let added = m.add_spectator(participant_id.clone())?;
        if added {
            self.publish(MatchEvent::Snapshot { view: m.snapshot() });
        }
        Ok(added)
    }

    #[instrument(skip(self))]
    pub fn remove_spectator(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<(), MatchError> {
        let shared = self.require(match_id)?;
        let mut m = shared.lock();
        m.remove_spectator(participant_id)?;
        self.publish(MatchEvent::Snapshot { view: m.snapshot() });
        Ok(())
    }

    // --- Teardown ---

    /// Drop a match from memory.
    ///
    /// Player index entries are removed only if they still point at this
    /// match. The returned handle keeps the final state readable.
    #[instrument(skip(self))]
    pub fn end_match(&self, match_id: &MatchId) -> Option<SharedMatch<O>> {
        let (_, shared) = self.matches.remove(match_id)?;
        {
            let m = shared.lock();
            self.release(&m);
            info!(phase = %m.phase(), "match evicted");
            self.publish(MatchEvent::Evicted {
                match_id: match_id.clone(),
            });
        }
        Some(shared)
    }

    /// Withdraw a waiting match. Only a seated player may do so.
    #[instrument(skip(self))]
    pub fn cancel_match(
        &self,
        match_id: &MatchId,
        participant_id: &ParticipantId,
    ) -> Result<(), MatchError> {
        let shared = self.require(match_id)?;
        let m = shared.lock();
        if m.side_of(participant_id).is_none() {
            return Err(MatchError::ParticipantNotInMatch);
        }
        if m.phase() != Phase::Waiting {
            return Err(MatchError::MatchNotCancellable { phase: m.phase() });
        }
        self.withdraw(&shared, &m, participant_id);
        Ok(())
    }

    /// Cancel every pending timer. Matches stay in memory.
    pub fn shutdown(&self) {
        info!(matches = self.matches.len(), "match registry shutting down");
        self.timers.shutdown();
    }

    // --- Connections ---

    /// Note that a player's connection dropped.
    ///
    /// Returns `true` if the player sits in an unfinished match and a
    /// check was scheduled. When it fires, a still-absent player forfeits
    /// an active game or has their waiting match withdrawn.
    #[instrument(skip(self))]
    pub fn participant_disconnected(&self, participant_id: &ParticipantId) -> bool {
        let Some(match_id) = self
            .by_participant
            .get(participant_id)
            .map(|e| e.value().clone())
        else {
            return false;
        };
        let Some(shared) = self.get(&match_id) else {
            return false;
        };
        let m = shared.lock();
        if m.is_finished() {
            return false;
        }

        self.disconnected
            .insert(participant_id.clone(), match_id.clone());
        let key = TimerKey::Abandonment {
            participant_id: participant_id.clone(),
            match_id: match_id.clone(),
        };
        let me = self.me.clone();
        let pid = participant_id.clone();
        let mid = match_id.clone();
        self.timers
            .schedule(key, self.config.abandonment_grace, move || {
                if let Some(registry) = me.upgrade() {
                    registry.abandonment_check(&pid, &mid);
                }
            });
        info!(%match_id, grace_secs = self.config.abandonment_grace.as_secs(), "player disconnected");
        true
    }

    /// Note that a player is (re)connected on `connection`.
    ///
    /// Cancels any pending abandonment and returns the player's current
    /// match, if any.
    #[instrument(skip(self))]
    pub fn participant_connected(
        &self,
        participant_id: &ParticipantId,
        connection: ConnectionId,
    ) -> Option<MatchView> {
        if let Some((_, match_id)) = self.disconnected.remove(participant_id) {
            self.timers.cancel(&TimerKey::Abandonment {
                participant_id: participant_id.clone(),
                match_id: match_id.clone(),
            });
            info!(%match_id, "player reconnected");
        }
        let shared = self.get_by_participant(participant_id)?;
        let mut m = shared.lock();
        m.set_connection(participant_id, connection).ok()?;
        Some(m.snapshot())
    }

    // --- Internals ---

    fn publish(&self, event: MatchEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Whether `shared` is still the match indexed under `match_id`.
    fn is_registered(&self, match_id: &MatchId, shared: &SharedMatch<O>) -> bool {
        self.matches
            .get(match_id)
            .is_some_and(|e| Arc::ptr_eq(e.value(), shared))
    }

    /// Drop index entries, timers and the gauge for a match leaving memory.
    fn release(&self, m: &Match<O>) {
        let match_id = m.match_id();
        for pid in m.players().player_ids() {
            self.by_participant.remove_if(pid, |_, current| current == match_id);
            self.disconnected.remove_if(pid, |_, current| current == match_id);
        }
        self.timers.cancel_matching(|key| key.belongs_to(match_id));
        self.metrics.matches.dec();
    }

    /// Called with the waiting match locked.
    fn withdraw(&self, shared: &SharedMatch<O>, m: &Match<O>, participant_id: &ParticipantId) {
        let match_id = m.match_id();
        if self
            .matches
            .remove_if(match_id, |_, current| Arc::ptr_eq(current, shared))
            .is_none()
        {
            return;
        }
        self.release(m);
        info!(%match_id, %participant_id, "waiting match withdrawn");
        self.publish(MatchEvent::Cancelled {
            match_id: match_id.clone(),
            participant_id: participant_id.clone(),
        });
    }

    fn require(&self, match_id: &MatchId) -> Result<SharedMatch<O>, MatchError> {
        self.get(match_id).ok_or_else(|| MatchError::MatchNotFound {
            match_id: match_id.clone(),
        })
    }

    /// Reject a player already seated in another unfinished match.
    fn ensure_available(
        &self,
        participant_id: &ParticipantId,
        joining: Option<&MatchId>,
    ) -> Result<(), MatchError> {
        let Some(current) = self
            .by_participant
            .get(participant_id)
            .map(|e| e.value().clone())
        else {
            return Ok(());
        };
        if joining == Some(&current) {
            return Ok(());
        }
        let busy = self
            .get(&current)
            .is_some_and(|shared| !shared.lock().is_finished());
        if busy {
            return Err(MatchError::ParticipantBusy { match_id: current });
        }
        Ok(())
    }

    fn views_in(&self, phase: Phase) -> Vec<MatchView> {
        let handles: Vec<SharedMatch<O>> =
            self.matches.iter().map(|e| Arc::clone(e.value())).collect();
        let mut views: Vec<MatchView> = handles
            .iter()
            .filter_map(|shared| {
                let m = shared.lock();
                (m.phase() == phase).then(|| m.snapshot())
            })
            .collect();
        views.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.match_id.cmp(&b.match_id))
        });
        views
    }

    /// Called with the match locked, right after it finished.
    fn on_finished(&self, m: &Match<O>, outcome: Outcome) {
        let match_id = m.match_id().clone();
        self.timers.cancel_matching(|key| key.belongs_to(&match_id));
        self.disconnected.retain(|_, id| *id != match_id);
        self.metrics.record_finish(outcome.reason());

        info!(%match_id, %outcome, moves = m.moves().len(), "match finished");
        self.publish(MatchEvent::Ended {
            outcome,
            view: m.snapshot(),
        });

        let me = self.me.clone();
        let id = match_id.clone();
        self.timers.schedule(
            TimerKey::Eviction(match_id),
            self.config.finished_retention,
            move || {
                if let Some(registry) = me.upgrade() {
                    registry.end_match(&id);
                }
            },
        );
    }

    /// Schedule a flag check for when the side to move runs out.
    fn arm_flag_timer(&self, m: &Match<O>, now: DateTime<Utc>) {
        if !self.config.flag_fall_timers || m.phase() != Phase::Active {
            return;
        }
        let remaining = m.remaining_ms(m.turn(), now).max(0);
        let delay = std::time::Duration::from_millis(remaining.unsigned_abs());
        let me = self.me.clone();
        let id = m.match_id().clone();
        self.timers
            .schedule(TimerKey::FlagFall(id.clone()), delay, move || {
                if let Some(registry) = me.upgrade() {
                    registry.flag_check(&id);
                }
            });
    }

    fn flag_check(&self, match_id: &MatchId) {
        let Some(shared) = self.get(match_id) else {
            return;
        };
        let mut m = shared.lock();
        let now = self.time.now();
        match m.check_flag(now) {
            Ok(FlagCheck::Flagged(outcome)) => self.on_finished(&m, outcome),
            Ok(FlagCheck::Running { remaining }) => {
                debug!(%match_id, remaining_ms = remaining.as_millis() as u64, "flag still up, re-arming");
                self.arm_flag_timer(&m, now);
            }
            Err(_) => {}
        }
    }

    fn abandonment_check(&self, participant_id: &ParticipantId, match_id: &MatchId) {
        let Some(shared) = self.get(match_id) else {
            return;
        };
        let mut m = shared.lock();
        let still_gone = self
            .disconnected
            .get(participant_id)
            .is_some_and(|e| e.value() == match_id);
        if !still_gone {
            return;
        }
        match m.phase() {
            Phase::Waiting => self.withdraw(&shared, &m, participant_id),
            Phase::Active => {
                if let Ok(outcome) = m.abandon(participant_id) {
                    self.disconnected.remove(participant_id);
                    info!(%participant_id, %match_id, "match abandoned");
                    self.on_finished(&m, outcome);
                }
            }
            Phase::Finished => {}
        }
    }
}

impl<O: RulesOracle> fmt::Debug for MatchRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchRegistry")
            .field("matches", &self.matches.len())
            .field("players", &self.by_participant.len())
            .field("disconnected", &self.disconnected.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}
