//! In-process match store

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::game::{MatchRecord, MatchStatus, TurnRecord};

use super::StoreError;

struct StoredMatch {
    record: MatchRecord,
    turns: Vec<TurnRecord>,
}

/// Matches and their turn lists held in a concurrent map
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    matches: Arc<DashMap<Uuid, StoredMatch>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        self.matches.insert(
            record.id,
            StoredMatch {
                record: record.clone(),
                turns: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.matches.get(&match_id).map(|m| m.record.clone()))
    }

    pub fn set_status(&self, match_id: Uuid, status: MatchStatus) -> Result<(), StoreError> {
        let mut stored = self
            .matches
            .get_mut(&match_id)
            .ok_or(StoreError::MissingMatch(match_id))?;
        stored.record.status = status;
        Ok(())
    }

    pub fn list_turns(&self, match_id: Uuid) -> Result<Vec<TurnRecord>, StoreError> {
        Ok(self
            .matches
            .get(&match_id)
            .map(|m| m.turns.clone())
            .unwrap_or_default())
    }

    /// Append under the entry lock; the number must extend the list by one
    pub fn append_turn(&self, match_id: Uuid, turn: &TurnRecord) -> Result<(), StoreError> {
        let mut stored = self
            .matches
            .get_mut(&match_id)
            .ok_or(StoreError::MissingMatch(match_id))?;
        if turn.number as usize != stored.turns.len() + 1 {
            return Err(StoreError::Conflict(turn.number));
        }
        stored.turns.push(turn.clone());
        Ok(())
    }
}
