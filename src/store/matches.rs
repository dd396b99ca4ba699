//! Match and turn persistence backed by Supabase tables

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::r#match::PlayerActions;
use crate::game::{MatchRecord, MatchStatus, TurnRecord};

use super::supabase::SupabaseClient;
use super::StoreError;

const MATCHES_TABLE: &str = "matches";
const TURNS_TABLE: &str = "turns";

/// Row of the `turns` table; `(match_id, number)` is its primary key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TurnRow {
    match_id: Uuid,
    number: u32,
    player_1: PlayerActions,
    player_2: PlayerActions,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TurnRow {
    fn from_record(match_id: Uuid, turn: &TurnRecord) -> Self {
        Self {
            match_id,
            number: turn.number,
            player_1: turn.player_1.clone(),
            player_2: turn.player_2.clone(),
            created_at: turn.created_at,
        }
    }

    fn into_record(self) -> TurnRecord {
        TurnRecord {
            number: self.number,
            player_1: self.player_1,
            player_2: self.player_2,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct StatusUpdate {
    status: MatchStatus,
}

/// Match store operations
#[derive(Clone)]
pub struct SupabaseMatchStore {
    client: SupabaseClient,
}

impl SupabaseMatchStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        self.client.insert(MATCHES_TABLE, record).await?;
        Ok(())
    }

    pub async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        let query = format!("id=eq.{}", match_id);
        Ok(self.client.get_one(MATCHES_TABLE, &query).await?)
    }

    pub async fn set_status(&self, match_id: Uuid, status: MatchStatus) -> Result<(), StoreError> {
        let query = format!("id=eq.{}", match_id);
        self.client
            .update(MATCHES_TABLE, &query, &StatusUpdate { status })
            .await?;
        Ok(())
    }

    /// Committed turns in sequence order
    pub async fn list_turns(&self, match_id: Uuid) -> Result<Vec<TurnRecord>, StoreError> {
        let query = format!("match_id=eq.{}&order=number.asc", match_id);
        let rows: Vec<TurnRow> = self.client.get(TURNS_TABLE, &query).await?;
        Ok(rows.into_iter().map(TurnRow::into_record).collect())
    }

    /// Insert a turn; a duplicate `(match_id, number)` means another commit won
    pub async fn append_turn(&self, match_id: Uuid, turn: &TurnRecord) -> Result<(), StoreError> {
        let row = TurnRow::from_record(match_id, turn);
        match self.client.insert(TURNS_TABLE, &row).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_conflict() => Err(StoreError::Conflict(turn.number)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::battleground::Position;
    use crate::game::r#match::{ActionSubmission, CharacterSetup, MatchSetup, RosterSetup};
    use crate::store::fake_postgrest::FakePostgrest;
    use chrono::Utc;

    fn record() -> MatchRecord {
        let roster = |x| RosterSetup {
            characters: vec![CharacterSetup {
                name: Some(format!("scout-{x}")),
                health: 12,
                position: Position::new(x, 2),
                attack: 4,
                range: 1,
                speed: 2,
            }],
        };
        MatchRecord::new(
            Uuid::new_v4(),
            Some("remote".to_string()),
            MatchSetup {
                player_1: roster(2),
                player_2: roster(13),
            },
        )
    }

    fn turn(number: u32) -> TurnRecord {
        let actions = |x| PlayerActions {
            actions: vec![ActionSubmission {
                character: Some(0),
                action: "move".to_string(),
                target: Some(Position::new(x, 2)),
            }],
        };
        TurnRecord {
            number,
            player_1: actions(2),
            player_2: actions(13),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn turn_rows_carry_the_match_key() {
        let match_id = Uuid::new_v4();
        let turn = turn(4);
        let row = TurnRow::from_record(match_id, &turn);

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["match_id"], match_id.to_string());
        assert_eq!(value["number"], 4);
        assert_eq!(value["player_1"]["actions"][0]["action"], "move");

        let back: TurnRow = serde_json::from_value(value).unwrap();
        assert_eq!(back.into_record(), turn);
    }

    #[tokio::test]
    async fn stores_and_reads_matches_and_turns() {
        let rest = FakePostgrest::spawn().await;
        let store = rest.store();
        let record = record();

        store.create_match(&record).await.unwrap();
        let loaded = store.get_match(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.setup, record.setup);
        assert_eq!(loaded.status, MatchStatus::Created);
        assert!(store.get_match(Uuid::new_v4()).await.unwrap().is_none());

        store.set_status(record.id, MatchStatus::Started).await.unwrap();
        assert_eq!(rest.stored_status(record.id).as_deref(), Some("started"));

        let second = turn(2);
        store.append_turn(record.id, &turn(1)).await.unwrap();
        store.append_turn(record.id, &second).await.unwrap();
        store.append_turn(Uuid::new_v4(), &turn(1)).await.unwrap();

        let turns = store.list_turns(record.id).await.unwrap();
        assert_eq!(turns.iter().map(|t| t.number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(turns[1], second);
    }

    #[tokio::test]
    async fn duplicate_turn_number_is_a_conflict() {
        let rest = FakePostgrest::spawn().await;
        let store = rest.store();
        let record = record();
        store.create_match(&record).await.unwrap();

        store.append_turn(record.id, &turn(1)).await.unwrap();
        assert!(matches!(
            store.append_turn(record.id, &turn(1)).await,
            Err(StoreError::Conflict(1))
        ));
        assert_eq!(rest.row_count(TURNS_TABLE), 1);

        rest.fail_updates(true);
        assert!(matches!(
            store.set_status(record.id, MatchStatus::Started).await,
            Err(StoreError::Supabase(_))
        ));
    }
}
