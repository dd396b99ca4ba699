//! In-process PostgREST stand-in for driving the Supabase store in tests

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::config::SupabaseConfig;

use super::{SupabaseClient, SupabaseMatchStore};

const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

type Params = Query<HashMap<String, String>>;

#[derive(Default)]
struct Tables {
    rows: Mutex<HashMap<String, Vec<Value>>>,
    fail_updates: AtomicBool,
}

/// Serves `/rest/v1/:table` with just enough of PostgREST for the match store:
/// `eq.` filters, single-object reads, and a unique `(match_id, number)` key on `turns`.
pub struct FakePostgrest {
    url: String,
    tables: Arc<Tables>,
}

impl FakePostgrest {
    pub async fn spawn() -> Self {
        let tables = Arc::new(Tables::default());
        let app = Router::new()
            .route("/rest/v1/:table", get(select).post(insert).patch(update))
            .with_state(tables.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, tables }
    }

    pub fn store(&self) -> SupabaseMatchStore {
        SupabaseMatchStore::new(SupabaseClient::new(&SupabaseConfig {
            url: self.url.clone(),
            service_role_key: "service-role-test-key".to_string(),
        }))
    }

    /// Make every PATCH answer 503 until switched back
    pub fn fail_updates(&self, fail: bool) {
        self.tables.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn stored_status(&self, match_id: Uuid) -> Option<String> {
        let id = match_id.to_string();
        self.tables
            .rows
            .lock()
            .get("matches")?
            .iter()
            .find(|row| row["id"] == id.as_str())
            .and_then(|row| row["status"].as_str().map(str::to_string))
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.rows.lock().get(table).map_or(0, Vec::len)
    }
}

/// Rows matching every `column=eq.value` parameter
fn filtered(rows: &[Value], params: &HashMap<String, String>) -> Vec<Value> {
    rows.iter()
        .filter(|row| {
            params.iter().all(|(column, filter)| match filter.strip_prefix("eq.") {
                Some(expected) => match &row[column.as_str()] {
                    Value::String(actual) => actual == expected,
                    other => other.to_string() == expected,
                },
                None => true,
            })
        })
        .cloned()
        .collect()
}

async fn select(
    State(tables): State<Arc<Tables>>,
    Path(table): Path<String>,
    Query(params): Params,
    headers: HeaderMap,
) -> Response {
    let rows = tables.rows.lock().get(&table).cloned().unwrap_or_default();
    let mut found = filtered(&rows, &params);
    found.sort_by_key(|row| row["number"].as_u64());

    let single = headers
        .get(header::ACCEPT)
        .is_some_and(|accept| accept == OBJECT_MEDIA_TYPE);
    if !single {
        return Json(found).into_response();
    }
    match found.into_iter().next() {
        Some(row) => Json(row).into_response(),
        None => (
            StatusCode::NOT_ACCEPTABLE,
            Json(json!({ "code": "PGRST116" })),
        )
            .into_response(),
    }
}

async fn insert(
    State(tables): State<Arc<Tables>>,
    Path(table): Path<String>,
    Json(row): Json<Value>,
) -> Response {
    let mut all = tables.rows.lock();
    let rows = all.entry(table.clone()).or_default();

    let duplicate = table == "turns"
        && rows
            .iter()
            .any(|r| r["match_id"] == row["match_id"] && r["number"] == row["number"]);
    if duplicate {
        return (StatusCode::CONFLICT, Json(json!({ "code": "23505" }))).into_response();
    }

    rows.push(row);
    StatusCode::CREATED.into_response()
}

async fn update(
    State(tables): State<Arc<Tables>>,
    Path(table): Path<String>,
    Query(params): Params,
    Json(patch): Json<Value>,
) -> StatusCode {
    if tables.fail_updates.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let mut all = tables.rows.lock();
    let matching = filtered(all.get(&table).map_or(&[][..], Vec::as_slice), &params);
    let Some(rows) = all.get_mut(&table) else {
        return StatusCode::NO_CONTENT;
    };
    for row in rows.iter_mut().filter(|row| matching.contains(row)) {
        if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    StatusCode::NO_CONTENT
}
