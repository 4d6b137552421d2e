//! gambit-server - WebSocket front end for the match coordinator.
//!
//! Clients connect to `/ws`, identify with `hello`, then create, join,
//! play and watch matches. Every match is a room; state changes are pushed
//! to every connection in the room.
//!
//! ```bash
//! LISTEN_ADDR=0.0.0.0:8080 RUST_LOG=gambit=debug cargo run --package gambit-server
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gambit::config::ArenaConfig;
use gambit::metrics::MatchMetrics;
use gambit::types::TimeControl;
use gambit::{MatchRegistry, StandardRules, SystemTimeSource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod protocol;
mod ws;

use api::{create_router, AppState};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "gambit-server")]
#[command(about = "Real-time timed chess matches over WebSocket")]
struct Args {
    /// HTTP listen address.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Seconds a finished match stays queryable.
    #[arg(long, env = "FINISHED_RETENTION_SECS", default_value_t = 300)]
    finished_retention_secs: u64,

    /// Seconds a disconnected player has to come back before forfeiting.
    #[arg(long, env = "ABANDONMENT_GRACE_SECS", default_value_t = 30)]
    abandonment_grace_secs: u64,

    /// Seconds a draw offer stays open.
    #[arg(long, env = "DRAW_OFFER_WINDOW_SECS", default_value_t = 60)]
    draw_offer_window_secs: u64,

    /// Time control for matches created without one, "minutes+increment".
    #[arg(long, env = "DEFAULT_TIME_CONTROL", default_value = "10+0")]
    default_time_control: String,

    /// Capacity of the match event channel.
    #[arg(long, env = "EVENT_CAPACITY", default_value_t = 1024)]
    event_capacity: usize,

    /// Only detect timeouts when the player on move tries to move.
    #[arg(long, env = "NO_FLAG_TIMERS")]
    no_flag_timers: bool,
}

impl Args {
    fn arena_config(&self) -> Result<ArenaConfig> {
        Ok(ArenaConfig {
            finished_retention: Duration::from_secs(self.finished_retention_secs),
            abandonment_grace: Duration::from_secs(self.abandonment_grace_secs),
            draw_offer_window: Duration::from_secs(self.draw_offer_window_secs),
            default_time_control: TimeControl::parse(&self.default_time_control)?,
            event_capacity: self.event_capacity,
            flag_fall_timers: !self.no_flag_timers,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("gambit=info".parse()?)
                .add_directive("gambit_server=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.arena_config()?;
    tracing::info!(?config, "gambit-server starting");

    let prometheus = prometheus::Registry::new();
    let metrics = Arc::new(MatchMetrics::new(&prometheus)?);
    let registry = MatchRegistry::new(config, StandardRules, Arc::new(SystemTimeSource), metrics)?;

    let state = Arc::new(AppState::new(Arc::clone(&registry), prometheus));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    tracing::info!("HTTP API listening on {}", args.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    registry.shutdown();
    tracing::info!("gambit-server shutdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_valid_config() {
        let args = Args::parse_from(["gambit-server"]);
        let config = args.arena_config().unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_time_control, TimeControl::RAPID);
        assert!(config.flag_fall_timers);
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Args::parse_from([
            "gambit-server",
            "--abandonment-grace-secs",
            "5",
            "--default-time-control",
            "3+2",
            "--no-flag-timers",
        ]);
        let config = args.arena_config().unwrap();
        assert_eq!(config.abandonment_grace, Duration::from_secs(5));
        assert_eq!(config.default_time_control, TimeControl::new(180, 2));
        assert!(!config.flag_fall_timers);
    }

    #[test]
    fn bad_time_control_is_rejected() {
        let args = Args::parse_from(["gambit-server", "--default-time-control", "fast"]);
        assert!(args.arena_config().is_err());
    }
}
