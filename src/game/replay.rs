//! Deterministic replay of committed turns

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::battleground::Battleground;
use super::error::GameError;
use super::r#match::{MatchSetup, TurnRecord};
use super::resolver::TurnResolver;
use super::snapshot::Snapshot;

/// Check a requested index against the committed turn count
pub fn check_turn_index(index: u32, committed: usize) -> Result<(), GameError> {
    if committed == 0 && index >= 1 {
        return Err(GameError::NoTurnsCompleted);
    }
    if index < 1 || index as usize > committed {
        return Err(GameError::InvalidTurnIndex {
            requested: index,
            committed: committed as u32,
        });
    }
    Ok(())
}

/// Fold `turns[..count]` onto an existing chain. `chain[i]` is the state after turn `i`.
fn extend_chain(
    chain: &mut Vec<Snapshot>,
    setup: &MatchSetup,
    turns: &[TurnRecord],
    count: usize,
    grid: Battleground,
) -> Result<(), GameError> {
    if chain.is_empty() {
        chain.push(Snapshot::initial(setup));
    }

    let resolver = TurnResolver::new(setup, grid);
    while chain.len() <= count {
        let prior = &chain[chain.len() - 1];
        let next = resolver.resolve(prior, &turns[chain.len() - 1])?;
        chain.push(next);
    }

    Ok(())
}

/// Full replay from the initial setup. Index 0 of the result is the setup.
pub fn replay(
    setup: &MatchSetup,
    turns: &[TurnRecord],
    grid: Battleground,
) -> Result<Vec<Snapshot>, GameError> {
    let mut chain = Vec::with_capacity(turns.len() + 1);
    extend_chain(&mut chain, setup, turns, turns.len(), grid)?;
    Ok(chain)
}

/// Uncached state after turn `index`, replaying turns `1..=index`
#[cfg(test)]
pub fn state_at_turn(
    setup: &MatchSetup,
    turns: &[TurnRecord],
    index: u32,
    grid: Battleground,
) -> Result<Snapshot, GameError> {
    check_turn_index(index, turns.len())?;
    let mut chain = replay(setup, &turns[..index as usize], grid)?;
    Ok(chain.swap_remove(index as usize))
}

/// Matches whose snapshot chains stay cached when no size is configured
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

struct CachedChain {
    snapshots: Vec<Snapshot>,
    last_used: AtomicU64,
}

/// Memoized snapshot chains for the most recently used matches. Turns are
/// append-only and immutable, so a cached prefix is never stale; results
/// equal a full replay.
pub struct SnapshotCache {
    grid: Battleground,
    capacity: usize,
    ticks: AtomicU64,
    chains: RwLock<HashMap<Uuid, CachedChain>>,
}

impl SnapshotCache {
    pub fn new(grid: Battleground, capacity: usize) -> Self {
        Self {
            grid,
            capacity: capacity.max(1),
            ticks: AtomicU64::new(0),
            chains: RwLock::new(HashMap::new()),
        }
    }

    pub fn state_at_turn(
        &self,
        match_id: Uuid,
        setup: &MatchSetup,
        turns: &[TurnRecord],
        index: u32,
    ) -> Result<Snapshot, GameError> {
        check_turn_index(index, turns.len())?;
        self.snapshot(match_id, setup, turns, index as usize)
    }

    /// State after the last committed turn (the setup when none are committed)
    pub fn latest(
        &self,
        match_id: Uuid,
        setup: &MatchSetup,
        turns: &[TurnRecord],
    ) -> Result<Snapshot, GameError> {
        self.snapshot(match_id, setup, turns, turns.len())
    }

    /// Append a freshly committed snapshot if it directly extends the chain
    pub fn record(&self, match_id: Uuid, snapshot: Snapshot) {
        let tick = self.tick();
        let mut chains = self.chains.write();
        if let Some(cached) = chains.get_mut(&match_id) {
            if cached.snapshots.len() == snapshot.turn as usize {
                cached.snapshots.push(snapshot);
                *cached.last_used.get_mut() = tick;
            }
        }
    }

    fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed)
    }

    fn snapshot(
        &self,
        match_id: Uuid,
        setup: &MatchSetup,
        turns: &[TurnRecord],
        index: usize,
    ) -> Result<Snapshot, GameError> {
        if let Some(hit) = self.cached(match_id, index) {
            debug!(match_id = %match_id, turn = index, "Snapshot cache hit");
            return Ok(hit);
        }

        let prefix = self
            .chains
            .read()
            .get(&match_id)
            .map(|cached| cached.snapshots.clone());
        let chain = match prefix {
            Some(mut chain) => {
                extend_chain(&mut chain, setup, turns, index, self.grid)?;
                chain
            }
            None => replay(setup, &turns[..index], self.grid)?,
        };
        let snapshot = chain[index].clone();
        self.store(match_id, chain);

        Ok(snapshot)
    }

    fn cached(&self, match_id: Uuid, index: usize) -> Option<Snapshot> {
        let chains = self.chains.read();
        let cached = chains.get(&match_id)?;
        let hit = cached.snapshots.get(index)?.clone();
        cached.last_used.store(self.tick(), Ordering::Relaxed);
        Some(hit)
    }

    /// Keep the longer chain. At capacity a new match evicts the least recently used one.
    fn store(&self, match_id: Uuid, snapshots: Vec<Snapshot>) {
        let tick = self.tick();
        let mut chains = self.chains.write();

        if let Some(cached) = chains.get_mut(&match_id) {
            if snapshots.len() > cached.snapshots.len() {
                cached.snapshots = snapshots;
            }
            *cached.last_used.get_mut() = tick;
            return;
        }

        if chains.len() >= self.capacity {
            let stale = chains
                .iter()
                .min_by_key(|(_, cached)| cached.last_used.load(Ordering::Relaxed))
                .map(|(id, _)| *id);
            if let Some(stale) = stale {
                chains.remove(&stale);
                debug!(match_id = %stale, "Evicted snapshot chain");
            }
        }

        chains.insert(
            match_id,
            CachedChain {
                snapshots,
                last_used: AtomicU64::new(tick),
            },
        );
    }

    #[cfg(test)]
    fn cached_matches(&self) -> usize {
        self.chains.read().len()
    }
}
