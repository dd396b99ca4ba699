//! Match service - ownership checks, turn commits and turn views

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::matrix::project;
use crate::game::{
    Battleground, BattlegroundMatrix, GameError, MatchOutcome, MatchRecord, MatchSetup,
    MatchStatus, Snapshot, SnapshotCache, TurnResolver, TurnSubmission,
};
use crate::store::{MatchStore, StoreError};

const VIEW_DENIED: &str = "Cannot view matches owned by other users.";
const START_DENIED: &str = "Cannot start matches owned by other users.";
const COMMIT_DENIED: &str = "Cannot submit turns for matches owned by other users.";

/// Request to create a match
#[derive(Debug, Clone, Deserialize)]
pub struct NewMatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub setup: MatchSetup,
}

/// Snapshot of one turn plus its projected grid
#[derive(Debug, Clone, Serialize)]
pub struct TurnView {
    pub snapshot: Snapshot,
    pub matrix: BattlegroundMatrix,
}

/// Match overview with its latest state
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub status: MatchStatus,
    pub turns_committed: usize,
    pub outcome: Option<MatchOutcome>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub latest: Snapshot,
    pub matrix: BattlegroundMatrix,
}

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Match not found.")]
    NotFound,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Match has not been started.")]
    MatchNotStarted,

    #[error("Match has already been started.")]
    MatchAlreadyStarted,

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

/// Status implied by the committed turns
fn derived_status(stored: MatchStatus, latest: &Snapshot) -> MatchStatus {
    match (stored, latest.outcome()) {
        (MatchStatus::Created, _) => MatchStatus::Created,
        (_, Some(_)) => MatchStatus::Completed,
        (_, None) if latest.turn > 0 => MatchStatus::InProgress,
        (stored, None) => stored,
    }
}

/// Owns match storage access and the replay cache
pub struct MatchService {
    store: MatchStore,
    grid: Battleground,
    snapshots: SnapshotCache,
    /// Serializes commits per match; entries live only while a commit is in flight
    commit_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MatchService {
    pub fn new(store: MatchStore, cache_capacity: usize) -> Self {
        let grid = Battleground::STANDARD;
        Self {
            store,
            grid,
            snapshots: SnapshotCache::new(grid, cache_capacity),
            commit_locks: DashMap::new(),
        }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn create_match(
        &self,
        owner_id: Uuid,
        request: NewMatch,
    ) -> Result<Uuid, ServiceError> {
        request.setup.validate(&self.grid)?;

        let record = MatchRecord::new(owner_id, request.name, request.setup);
        self.store.create_match(&record).await?;

        info!(match_id = %record.id, owner_id = %owner_id, "Match created");
        Ok(record.id)
    }

    pub async fn start_match(&self, match_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let record = self.owned_match(match_id, user_id, START_DENIED).await?;
        if record.status != MatchStatus::Created {
            return Err(ServiceError::MatchAlreadyStarted);
        }

        self.store.set_status(match_id, MatchStatus::Started).await?;
        info!(match_id = %match_id, "Match started");
        Ok(())
    }

    /// Resolve and persist the next turn, returning its number
    pub async fn commit_turn(
        &self,
        match_id: Uuid,
        submission: TurnSubmission,
        user_id: Uuid,
    ) -> Result<u32, ServiceError> {
        let lock = self
            .commit_locks
            .entry(match_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.commit_locked(match_id, submission, user_id).await
        };

        drop(lock);
        self.commit_locks.remove_if(&match_id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn commit_locked(
        &self,
        match_id: Uuid,
        submission: TurnSubmission,
        user_id: Uuid,
    ) -> Result<u32, ServiceError> {
        let record = self.owned_match(match_id, user_id, COMMIT_DENIED).await?;
        match record.status {
            MatchStatus::Created => return Err(ServiceError::MatchNotStarted),
            MatchStatus::Completed => return Err(GameError::MatchAlreadyCompleted.into()),
            MatchStatus::Started | MatchStatus::InProgress => {}
        }

        let turns = self.store.list_turns(match_id).await?;
        let prior = self.snapshots.latest(match_id, &record.setup, &turns)?;
        if prior.outcome().is_some() {
            self.reconcile_status(match_id, record.status, &prior).await;
            return Err(GameError::MatchAlreadyCompleted.into());
        }

        let turn = submission.into_record();
        let next = TurnResolver::new(&record.setup, self.grid)
            .resolve(&prior, &turn)
            .map_err(|e| {
                warn!(
                    match_id = %match_id,
                    turn = turn.number,
                    invalid_action = e.is_invalid_action(),
                    error = %e,
                    "Turn rejected"
                );
                e
            })?;

        match self.store.append_turn(match_id, &turn).await {
            Ok(()) => {}
            Err(StoreError::Conflict(provided)) => {
                warn!(match_id = %match_id, turn = provided, "Lost turn commit race");
                return Err(GameError::InvalidTurnNumber {
                    expected: prior.turn + 1,
                    provided,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        // Turn is stored; a failed status write is reconciled on later reads
        self.reconcile_status(match_id, record.status, &next).await;

        let number = next.turn;
        match next.outcome() {
            Some(outcome) => {
                info!(match_id = %match_id, turn = number, outcome = ?outcome, "Match completed")
            }
            None => info!(
                match_id = %match_id,
                turn = number,
                player_1_living = next.player_1.living(),
                player_2_living = next.player_2.living(),
                "Turn committed"
            ),
        }
        self.snapshots.record(match_id, next);

        Ok(number)
    }

    /// State and matrix after turn `index`
    pub async fn view_turn(
        &self,
        match_id: Uuid,
        index: u32,
        user_id: Uuid,
    ) -> Result<TurnView, ServiceError> {
        let record = self.owned_match(match_id, user_id, VIEW_DENIED).await?;
        let turns = self.store.list_turns(match_id).await?;

        let snapshot = self
            .snapshots
            .state_at_turn(match_id, &record.setup, &turns, index)?;
        let matrix = project(&snapshot, &self.grid);

        Ok(TurnView { snapshot, matrix })
    }

    pub async fn match_summary(
        &self,
        match_id: Uuid,
        user_id: Uuid,
    ) -> Result<MatchSummary, ServiceError> {
        let record = self.owned_match(match_id, user_id, VIEW_DENIED).await?;
        let turns = self.store.list_turns(match_id).await?;
        let latest = self.snapshots.latest(match_id, &record.setup, &turns)?;
        let status = self.reconcile_status(match_id, record.status, &latest).await;
        let matrix = project(&latest, &self.grid);

        Ok(MatchSummary {
            uuid: record.id,
            name: record.name,
            status,
            turns_committed: turns.len(),
            outcome: latest.outcome(),
            created_at: record.created_at,
            latest,
            matrix,
        })
    }

    /// Write back the status the turns imply when the stored one lags behind
    async fn reconcile_status(
        &self,
        match_id: Uuid,
        stored: MatchStatus,
        latest: &Snapshot,
    ) -> MatchStatus {
        let status = derived_status(stored, latest);
        if status != stored {
            if let Err(e) = self.store.set_status(match_id, status).await {
                warn!(
                    match_id = %match_id,
                    status = ?status,
                    error = %e,
                    "Match status update failed"
                );
            }
        }
        status
    }

    async fn owned_match(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        denial: &'static str,
    ) -> Result<MatchRecord, ServiceError> {
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if record.owner_id != user_id {
            return Err(ServiceError::Unauthorized(denial));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::replay::DEFAULT_CACHE_CAPACITY;
    use crate::store::fake_postgrest::FakePostgrest;
    use crate::store::MemoryMatchStore;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn service() -> MatchService {
        MatchService::new(
            MatchStore::Memory(MemoryMatchStore::new()),
            DEFAULT_CACHE_CAPACITY,
        )
    }

    fn three_vs_three() -> NewMatch {
        serde_json::from_value(json!({
            "name": "skirmish",
            "player_1": { "characters": [
                { "health": 30, "position": { "x": 1, "y": 0 } },
                { "health": 20, "position": { "x": 1, "y": 3 } },
                { "health": 40, "position": { "x": 1, "y": 6 } }
            ]},
            "player_2": { "characters": [
                { "health": 50, "position": { "x": 14, "y": 0 } },
                { "health": 30, "position": { "x": 14, "y": 3 } },
                { "health": 20, "position": { "x": 14, "y": 6 } }
            ]}
        }))
        .unwrap()
    }

    fn stationary_turn(number: u32) -> TurnSubmission {
        let moves = |x: i32| {
            json!({ "actions": [
                { "action": "move", "target": { "x": x, "y": 0 } },
                { "action": "move", "target": { "x": x, "y": 3 } },
                { "action": "move", "target": { "x": x, "y": 6 } }
            ]})
        };
        serde_json::from_value(json!({
            "turn": number,
            "player_1": moves(1),
            "player_2": moves(14)
        }))
        .unwrap()
    }

    async fn started_match(service: &MatchService, owner: Uuid) -> Uuid {
        let id = service.create_match(owner, three_vs_three()).await.unwrap();
        service.start_match(id, owner).await.unwrap();
        id
    }

    #[tokio::test]
    async fn viewing_first_turn_returns_setup_values() {
        let service = service();
        let owner = Uuid::new_v4();
        let id = started_match(&service, owner).await;

        assert_eq!(service.commit_turn(id, stationary_turn(1), owner).await.unwrap(), 1);

        let view = service.view_turn(id, 1, owner).await.unwrap();
        let expected = [
            (&view.snapshot.player_1, [(30, 0), (20, 3), (40, 6)], 1),
            (&view.snapshot.player_2, [(50, 0), (30, 3), (20, 6)], 14),
        ];
        for (roster, stats, x) in expected {
            for (character, (health, y)) in roster.characters.iter().zip(stats) {
                assert_eq!(character.health.current, health);
                assert_eq!(character.health.max, health);
                assert_eq!(character.position.x, x);
                assert_eq!(character.position.y, y);
                assert!(character.action.contains("move"));
            }
        }

        let summary = service.match_summary(id, owner).await.unwrap();
        let initial = Snapshot::initial(&three_vs_three().setup);
        let setup_view = project(&initial, &Battleground::STANDARD);
        assert_eq!(view.matrix, setup_view);
        assert_eq!(summary.status, MatchStatus::InProgress);
        assert_eq!(summary.turns_committed, 1);
    }

    #[tokio::test]
    async fn view_errors_follow_lookup_order() {
        let service = service();
        let owner = Uuid::new_v4();
        let id = started_match(&service, owner).await;

        let err = service.view_turn(id, 1, owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::NoTurnsCompleted)));
        assert_eq!(err.to_string(), "Match does not have any turns completed.");

        assert_ok!(service.commit_turn(id, stationary_turn(1), owner).await);

        let err = service.view_turn(Uuid::new_v4(), 1, owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));

        let err = service.view_turn(id, 1, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot view matches owned by other users.");

        let err = service.view_turn(id, 2, owner).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid turn number provided.");
    }

    #[tokio::test]
    async fn commits_require_sequence_and_started_match() {
        let service = service();
        let owner = Uuid::new_v4();
        let id = service.create_match(owner, three_vs_three()).await.unwrap();

        let err = service.commit_turn(id, stationary_turn(1), owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::MatchNotStarted));

        service.start_match(id, owner).await.unwrap();
        assert!(matches!(
            service.start_match(id, owner).await,
            Err(ServiceError::MatchAlreadyStarted)
        ));

        let err = service.commit_turn(id, stationary_turn(2), owner).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Game(GameError::InvalidTurnNumber { expected: 1, provided: 2 })
        ));

        assert_ok!(service.commit_turn(id, stationary_turn(1), owner).await);
        assert_err!(service.commit_turn(id, stationary_turn(1), owner).await);
        assert_eq!(service.commit_turn(id, stationary_turn(2), owner).await.unwrap(), 2);

        let err = service
            .commit_turn(id, stationary_turn(3), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_setup() {
        let service = service();
        let mut request = three_vs_three();
        let taken = request.setup.player_1.characters[0].position;
        request.setup.player_2.characters[0].position = taken;

        let err = service.create_match(Uuid::new_v4(), request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::InvalidSetup(_))));
    }

    /// One hit from player 1 defeats player 2's only character
    fn duel() -> NewMatch {
        serde_json::from_value(json!({
            "player_1": { "characters": [
                { "health": 30, "attack": 25, "position": { "x": 5, "y": 4 } }
            ]},
            "player_2": { "characters": [
                { "health": 20, "position": { "x": 6, "y": 4 } }
            ]}
        }))
        .unwrap()
    }

    fn strike() -> TurnSubmission {
        serde_json::from_value(json!({
            "turn": 1,
            "player_1": { "actions": [{ "action": "attack", "target": { "x": 6, "y": 4 } }] },
            "player_2": { "actions": [{ "action": "wait" }] }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn wiping_a_roster_completes_the_match() {
        let service = service();
        let owner = Uuid::new_v4();
        let id = service.create_match(owner, duel()).await.unwrap();
        service.start_match(id, owner).await.unwrap();

        assert_eq!(service.commit_turn(id, strike(), owner).await.unwrap(), 1);

        let summary = service.match_summary(id, owner).await.unwrap();
        assert_eq!(summary.status, MatchStatus::Completed);
        assert_eq!(summary.outcome, Some(MatchOutcome::PlayerOneWins));
        assert_eq!(summary.matrix.cell(6, 4), Some(-21));

        let err = service.commit_turn(id, stationary_turn(2), owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::MatchAlreadyCompleted)));
    }

    #[tokio::test]
    async fn racing_commits_have_one_winner() {
        let service = Arc::new(service());
        let owner = Uuid::new_v4();
        let id = started_match(&service, owner).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(
                    async move { service.commit_turn(id, stationary_turn(1), owner).await },
                )
            })
            .collect();

        let mut committed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(1) => committed += 1,
                Ok(other) => panic!("unexpected turn {other}"),
                Err(e) => assert!(matches!(
                    e,
                    ServiceError::Game(GameError::InvalidTurnNumber { .. })
                )),
            }
        }
        assert_eq!(committed, 1);
        assert!(service.commit_locks.is_empty());
    }

    #[tokio::test]
    async fn commit_locks_are_dropped_after_each_commit() {
        let service = service();
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..20 {
            let id = started_match(&service, owner).await;
            assert_ok!(service.commit_turn(id, stationary_turn(1), owner).await);
            assert_err!(service.commit_turn(id, stationary_turn(5), owner).await);
            ids.push(id);
        }
        assert_err!(service.commit_turn(Uuid::new_v4(), stationary_turn(1), owner).await);

        assert!(service.commit_locks.is_empty());
        assert_eq!(service.commit_turn(ids[0], stationary_turn(2), owner).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn status_lagging_behind_turns_is_derived_and_repaired() {
        let rest = FakePostgrest::spawn().await;
        let service = MatchService::new(MatchStore::Supabase(rest.store()), DEFAULT_CACHE_CAPACITY);
        let owner = Uuid::new_v4();
        let id = service.create_match(owner, duel()).await.unwrap();
        service.start_match(id, owner).await.unwrap();

        rest.fail_updates(true);
        assert_eq!(service.commit_turn(id, strike(), owner).await.unwrap(), 1);
        assert_eq!(rest.stored_status(id).as_deref(), Some("started"));

        let summary = service.match_summary(id, owner).await.unwrap();
        assert_eq!(summary.status, MatchStatus::Completed);
        assert_eq!(summary.outcome, Some(MatchOutcome::PlayerOneWins));

        let err = service.commit_turn(id, stationary_turn(2), owner).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::MatchAlreadyCompleted)));
        assert_eq!(rest.stored_status(id).as_deref(), Some("started"));

        rest.fail_updates(false);
        let summary = service.match_summary(id, owner).await.unwrap();
        assert_eq!(summary.status, MatchStatus::Completed);
        assert_eq!(rest.stored_status(id).as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn instances_sharing_a_store_commit_each_turn_once() {
        let rest = FakePostgrest::spawn().await;
        let first = MatchService::new(MatchStore::Supabase(rest.store()), DEFAULT_CACHE_CAPACITY);
        let second = MatchService::new(MatchStore::Supabase(rest.store()), DEFAULT_CACHE_CAPACITY);
        let owner = Uuid::new_v4();
        let id = started_match(&first, owner).await;

        let (a, b) = tokio::join!(
            first.commit_turn(id, stationary_turn(1), owner),
            second.commit_turn(id, stationary_turn(1), owner),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| matches!(r, Ok(1))).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(ServiceError::Game(GameError::InvalidTurnNumber { provided: 1, .. }))
        )));
        assert_eq!(rest.row_count("turns"), 1);
        assert_eq!(rest.stored_status(id).as_deref(), Some("in_progress"));
    }
}
