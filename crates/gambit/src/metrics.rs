use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::types::EndReason;

/// Match-level prometheus metrics.
pub struct MatchMetrics {
    /// Number of matches currently held by the registry.
    pub matches: IntGauge,
    /// Moves accepted across all matches.
    pub moves: IntCounter,
    /// Moves rejected as illegal or out of turn.
    pub rejected_moves: IntCounter,
    /// Finished matches, labelled by end reason.
    pub finished: IntCounterVec,
}

impl MatchMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let matches = IntGauge::with_opts(Opts::new(
            "gambit_matches",
            "Number of matches held in memory",
        ))?;
        let moves = IntCounter::with_opts(Opts::new(
            "gambit_moves_total",
            "Number of accepted moves",
        ))?;
        let rejected_moves = IntCounter::with_opts(Opts::new(
            "gambit_rejected_moves_total",
            "Number of rejected move attempts",
        ))?;
        let finished = IntCounterVec::new(
            Opts::new(
                "gambit_matches_finished_total",
                "Number of finished matches by end reason",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(matches.clone()))?;
        registry.register(Box::new(moves.clone()))?;
        registry.register(Box::new(rejected_moves.clone()))?;
        registry.register(Box::new(finished.clone()))?;

        Ok(Self {
            matches,
            moves,
            rejected_moves,
            finished,
        })
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self {
            matches: IntGauge::new("gambit_matches", "matches").expect("valid metric name"),
            moves: IntCounter::new("gambit_moves_total", "moves").expect("valid metric name"),
            rejected_moves: IntCounter::new("gambit_rejected_moves_total", "rejected")
                .expect("valid metric name"),
            finished: IntCounterVec::new(
                Opts::new("gambit_matches_finished_total", "finished"),
                &["reason"],
            )
            .expect("valid metric name"),
        }
    }

    pub(crate) fn record_finish(&self, reason: EndReason) {
        self.finished.with_label_values(&[reason.as_str()]).inc();
    }
}
