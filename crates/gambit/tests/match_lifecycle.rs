//! Integration tests for the match lifecycle through the registry.
//!
//! These tests drive time with a `ManualClock` and verify:
//! - Creating and joining matches
//! - Turn order and clock accounting
//! - Timeout, resignation and checkmate results
//! - Draw negotiation and spectators

use std::sync::Arc;
use std::time::Duration;

use gambit::metrics::MatchMetrics;
use gambit::prelude::*;
use gambit::testing::ManualClock;
use gambit::types::{DrawReason, WinReason};

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s).unwrap()
}

fn setup() -> (Arc<MatchRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let config = ArenaConfig {
        flag_fall_timers: false,
        ..Default::default()
    };
    let registry = MatchRegistry::new(
        config,
        StandardRules,
        clock.clone(),
        Arc::new(MatchMetrics::unregistered()),
    )
    .unwrap();
    (registry, clock)
}

/// Alice (white) opens a 5+0 match and Bob (black) joins it.
fn started(registry: &MatchRegistry) -> MatchId {
    let id = MatchId::generate();
    registry
        .create_match(
            id.clone(),
            Seats::one(Side::White, Participant::new(pid("alice"))),
            Wager::new(10.0).unwrap(),
            Some("5+0"),
        )
        .unwrap();
    registry
        .join_match(&id, Participant::new(pid("bob")))
        .unwrap();
    id
}

fn play(registry: &MatchRegistry, id: &MatchId, who: &str, mv: &str) -> MoveOutcome {
    registry
        .apply_move(id, &pid(who), &MoveInput::notation(mv))
        .unwrap_or_else(|e| panic!("{who} {mv}: {e}"))
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_create_then_join_starts_clocks() {
    let (registry, clock) = setup();
    let id = MatchId::generate();

    let view = registry
        .create_match(
            id.clone(),
            Seats::one(Side::White, Participant::new(pid("alice"))),
            Wager::ZERO,
            Some("5+0"),
        )
        .unwrap();
    assert_eq!(view.phase(), Phase::Waiting);
    assert!(view.seats.black.is_none());

    clock.advance(Duration::from_secs(45));
    let view = registry
        .join_match(&id, Participant::new(pid("bob")))
        .unwrap();
    assert_eq!(view.phase(), Phase::Active);
    assert_eq!(view.clocks.white_ms, 300_000);
    assert_eq!(view.clocks.black_ms, 300_000);
    assert_eq!(view.turn, Side::White);
}

#[test]
fn test_legal_move_flips_turn_and_charges_clock() {
    let (registry, clock) = setup();
    let id = started(&registry);

    clock.advance(Duration::from_millis(2_500));
    play(&registry, &id, "alice", "e2e4");

    let view = registry.snapshot(&id).unwrap();
    assert_eq!(view.turn, Side::Black);
    assert_eq!(view.clocks.white_ms, 297_500);
    assert_eq!(view.clocks.black_ms, 300_000);
    assert_eq!(view.moves.len(), 1);
    assert_eq!(view.moves[0].san, "e4");
    assert_eq!(view.moves[0].elapsed_ms, 2_500);
}

#[test]
fn test_move_out_of_turn_changes_nothing() {
    let (registry, clock) = setup();
    let id = started(&registry);
    let before = registry.snapshot(&id).unwrap();

    clock.advance(Duration::from_secs(1));
    let err = registry
        .apply_move(&id, &pid("bob"), &MoveInput::notation("e7e5"))
        .unwrap_err();
    assert_eq!(
        err,
        MatchError::NotYourTurn {
            expected: Side::White
        }
    );

    let after = registry.snapshot(&id).unwrap();
    assert!(after.moves.is_empty());
    assert_eq!(after.clocks, before.clocks);
    assert_eq!(after.fen, before.fen);
}

#[test]
fn test_flagged_move_is_discarded() {
    let (registry, clock) = setup();
    let id = started(&registry);
    registry
        .get(&id)
        .unwrap()
        .lock()
        .set_clock(Side::White, 500)
        .unwrap();

    clock.advance(Duration::from_millis(1_000));
    let result = play(&registry, &id, "alice", "e2e4");
    let expected = Outcome::win(Side::Black, WinReason::Timeout);
    assert_eq!(result, MoveOutcome::TimedOut(expected));

    let view = registry.snapshot(&id).unwrap();
    assert_eq!(view.status, MatchStatus::Finished { outcome: expected });
    assert_eq!(view.clocks.white_ms, 0);
    assert!(view.moves.is_empty());
}

#[test]
fn test_resign_is_final() {
    let (registry, _) = setup();
    let id = started(&registry);

    let outcome = registry.resign(&id, &pid("alice")).unwrap();
    assert_eq!(outcome, Outcome::win(Side::Black, WinReason::Resignation));
    assert_eq!(
        registry.resign(&id, &pid("alice")),
        Err(MatchError::GameNotActive {
            phase: Phase::Finished
        })
    );
    assert_eq!(
        registry.snapshot(&id).unwrap().status.outcome(),
        Some(outcome)
    );
}

#[test]
fn test_checkmate_by_black() {
    let (registry, clock) = setup();
    let id = started(&registry);

    for (who, mv) in [("alice", "f3"), ("bob", "e5"), ("alice", "g4")] {
        clock.advance(Duration::from_secs(1));
        play(&registry, &id, who, mv);
    }
    clock.advance(Duration::from_secs(1));
    let result = play(&registry, &id, "bob", "Qh4#");

    let expected = Outcome::win(Side::Black, WinReason::Checkmate);
    assert_eq!(result.outcome(), Some(expected));
    let view = registry.snapshot(&id).unwrap();
    assert_eq!(view.status.outcome(), Some(expected));
    assert!(view.in_check);
}

// =============================================================================
// Invariants
// =============================================================================

#[test]
fn test_turns_alternate_strictly() {
    let (registry, clock) = setup();
    let id = started(&registry);

    let line = ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"];
    for (i, mv) in line.iter().enumerate() {
        let (who, side) = if i % 2 == 0 {
            ("alice", Side::White)
        } else {
            ("bob", Side::Black)
        };
        assert_eq!(registry.snapshot(&id).unwrap().turn, side);
        clock.advance(Duration::from_millis(300));
        play(&registry, &id, who, mv);

        // The same side may not move twice.
        let again = registry.apply_move(&id, &pid(who), &MoveInput::notation("h3"));
        assert!(matches!(again, Err(MatchError::NotYourTurn { .. })));
    }

    let view = registry.snapshot(&id).unwrap();
    let plies: Vec<u32> = view.moves.iter().map(|m| m.ply).collect();
    assert_eq!(plies, [1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_increment_added_after_move() {
    let (registry, clock) = setup();
    let id = MatchId::generate();
    registry
        .create_match(
            id.clone(),
            Seats::both(Participant::new(pid("alice")), Participant::new(pid("bob"))),
            Wager::ZERO,
            Some("3+2"),
        )
        .unwrap();

    clock.advance(Duration::from_secs(5));
    let MoveOutcome::Applied { record, .. } = play(&registry, &id, "alice", "d4") else {
        panic!("expected applied move");
    };
    assert_eq!(record.clock_after_ms, 180_000 - 5_000 + 2_000);
}

#[test]
fn test_finished_snapshot_never_regresses() {
    let (registry, clock) = setup();
    let id = started(&registry);
    registry.resign(&id, &pid("bob")).unwrap();
    let finished = registry.snapshot(&id).unwrap();

    clock.advance(Duration::from_secs(30));
    assert!(registry
        .apply_move(&id, &pid("alice"), &MoveInput::notation("e4"))
        .is_err());
    assert!(registry.offer_draw(&id, &pid("alice")).is_err());
    assert!(registry
        .join_match(&id, Participant::new(pid("carol")))
        .is_err());

    let later = registry.snapshot(&id).unwrap();
    assert_eq!(later.status, finished.status);
    assert_eq!(later.clocks, finished.clocks);
    assert_eq!(later.moves, finished.moves);
}

#[test]
fn test_unseated_participant_cannot_resign() {
    let (registry, _) = setup();
    let id = started(&registry);
    assert_eq!(
        registry.resign(&id, &pid("mallory")),
        Err(MatchError::ParticipantNotInMatch)
    );
}

// =============================================================================
// Draws and spectators
// =============================================================================

#[test]
fn test_draw_by_agreement() {
    let (registry, clock) = setup();
    let id = started(&registry);

    assert_eq!(
        registry.offer_draw(&id, &pid("alice")).unwrap(),
        DrawResponse::Offered
    );
    assert_eq!(
        registry.snapshot(&id).unwrap().phase(),
        Phase::Active,
        "an offer alone does not end the game"
    );
    assert_eq!(
        registry.accept_draw(&id, &pid("alice")),
        Err(MatchError::CannotAcceptOwnOffer)
    );

    clock.advance(Duration::from_secs(10));
    let outcome = registry.accept_draw(&id, &pid("bob")).unwrap();
    assert_eq!(outcome, Outcome::draw(DrawReason::Agreement));
    assert_eq!(outcome.reason().as_str(), "draw-agreed");
}

#[test]
fn test_declined_draw_keeps_playing() {
    let (registry, _) = setup();
    let id = started(&registry);
    registry.offer_draw(&id, &pid("bob")).unwrap();
    registry.decline_draw(&id, &pid("alice")).unwrap();
    assert_eq!(
        registry.accept_draw(&id, &pid("alice")),
        Err(MatchError::NoDrawOffer)
    );
    assert_eq!(registry.snapshot(&id).unwrap().phase(), Phase::Active);
}

#[test]
fn test_spectators_do_not_count_as_players() {
    let (registry, _) = setup();
    let id = started(&registry);

    assert_eq!(registry.add_spectator(&id, &pid("carol")), Ok(true));
    assert_eq!(registry.add_spectator(&id, &pid("carol")), Ok(false));
    assert_eq!(
        registry.add_spectator(&id, &pid("alice")),
        Err(MatchError::AlreadyInMatch)
    );
    assert!(registry.get_by_participant(&pid("carol")).is_none());
    assert_eq!(registry.snapshot(&id).unwrap().spectators, vec![pid("carol")]);

    // A spectator can still open a game of their own.
    registry
        .create_match(
            MatchId::generate(),
            Seats::one(Side::Black, Participant::new(pid("carol"))),
            Wager::ZERO,
            None,
        )
        .unwrap();

    registry.remove_spectator(&id, &pid("carol")).unwrap();
    assert_eq!(
        registry.remove_spectator(&id, &pid("carol")),
        Err(MatchError::ParticipantNotInMatch)
    );
}

#[test]
fn test_lobby_listings() {
    let (registry, clock) = setup();
    let active = started(&registry);
    clock.advance(Duration::from_secs(1));
    let waiting = MatchId::generate();
    registry
        .create_match(
            waiting.clone(),
            Seats::one(Side::Black, Participant::new(pid("dave"))),
            Wager::ZERO,
            Some("1+0"),
        )
        .unwrap();

    let lobby: Vec<MatchId> = registry
        .waiting_matches()
        .into_iter()
        .map(|v| v.match_id)
        .collect();
    assert_eq!(lobby, vec![waiting]);
    let playing: Vec<MatchId> = registry
        .active_matches()
        .into_iter()
        .map(|v| v.match_id)
        .collect();
    assert_eq!(playing, vec![active]);
    assert_eq!(registry.len(), 2);
}
