//! Match persistence backends

#[cfg(test)]
pub mod fake_postgrest;
pub mod matches;
pub mod memory;
pub mod supabase;

pub use matches::SupabaseMatchStore;
pub use memory::MemoryMatchStore;
pub use supabase::{SupabaseClient, SupabaseError};

use uuid::Uuid;

use crate::game::{MatchRecord, MatchStatus, TurnRecord};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Turn {0} has already been recorded")]
    Conflict(u32),

    #[error("Match {0} is not stored")]
    MissingMatch(Uuid),

    #[error(transparent)]
    Supabase(#[from] SupabaseError),
}

/// Where matches and turns live. Turns are append-only.
#[derive(Clone)]
pub enum MatchStore {
    Memory(MemoryMatchStore),
    Supabase(SupabaseMatchStore),
}

impl MatchStore {
    pub fn backend(&self) -> &'static str {
        match self {
            MatchStore::Memory(_) => "memory",
            MatchStore::Supabase(_) => "supabase",
        }
    }

    pub async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        match self {
            MatchStore::Memory(store) => store.create_match(record),
            MatchStore::Supabase(store) => store.create_match(record).await,
        }
    }

    pub async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        match self {
            MatchStore::Memory(store) => store.get_match(match_id),
            MatchStore::Supabase(store) => store.get_match(match_id).await,
        }
    }

    pub async fn set_status(&self, match_id: Uuid, status: MatchStatus) -> Result<(), StoreError> {
        match self {
            MatchStore::Memory(store) => store.set_status(match_id, status),
            MatchStore::Supabase(store) => store.set_status(match_id, status).await,
        }
    }

    pub async fn list_turns(&self, match_id: Uuid) -> Result<Vec<TurnRecord>, StoreError> {
        match self {
            MatchStore::Memory(store) => store.list_turns(match_id),
            MatchStore::Supabase(store) => store.list_turns(match_id).await,
        }
    }

    pub async fn append_turn(&self, match_id: Uuid, turn: &TurnRecord) -> Result<(), StoreError> {
        match self {
            MatchStore::Memory(store) => store.append_turn(match_id, turn),
            MatchStore::Supabase(store) => store.append_turn(match_id, turn).await,
        }
    }
}
