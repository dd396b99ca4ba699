//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matches::MatchService;
use crate::store::{MatchStore, MemoryMatchStore, SupabaseClient, SupabaseMatchStore};
use crate::util::rate_limit::TurnRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub matches: Arc<MatchService>,
    pub turn_limiter: TurnRateLimiter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Supabase when configured, otherwise keep matches in process
        let store = match &config.supabase {
            Some(supabase) => {
                MatchStore::Supabase(SupabaseMatchStore::new(SupabaseClient::new(supabase)))
            }
            None => MatchStore::Memory(MemoryMatchStore::new()),
        };

        let matches = Arc::new(MatchService::new(store, config.snapshot_cache_size));
        let turn_limiter = TurnRateLimiter::new(config.turn_rate_limit);

        Self {
            config,
            matches,
            turn_limiter,
        }
    }
}
