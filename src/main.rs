//! Tactics Match Server
//!
//! Owners create a match from two rosters, start it, and submit both
//! players' actions one turn at a time. Every turn is resolved on a 16x8
//! battleground and any past turn can be viewed again, rebuilt by replaying
//! the committed turns. Matches live in memory or in Supabase.

mod app;
mod config;
mod game;
mod http;
mod matches;
mod store;
mod util;

use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::rate_limit::TurnRateLimiter;
use crate::util::time::init_server_time;

/// How often idle per-user rate limit state is dropped
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    let state = AppState::new(config.clone());
    info!(
        addr = %config.server_addr,
        store = state.matches.store_backend(),
        turn_rate_limit = config.turn_rate_limit,
        "Starting tactics match server"
    );

    tokio::spawn(prune_turn_limiter(state.turn_limiter.clone()));

    let listener = TcpListener::bind(config.server_addr).await?;
    info!(addr = %listener.local_addr()?, "Accepting match requests");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Match server stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn prune_turn_limiter(limiter: TurnRateLimiter) {
    let mut ticker = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
    loop {
        ticker.tick().await;
        let tracked = limiter.prune();
        debug!(tracked_users = tracked, "Pruned turn rate limiter");
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = interrupt => "interrupt",
        _ = terminate => "terminate",
    };
    info!(signal, "Shutting down, draining in-flight requests");
}
