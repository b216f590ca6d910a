#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use wax_labs_notifications::{
    build_router,
    services::proposal_cache::ProposalCache,
    settings::Settings,
    wax::{ChainError, TableRowsPage, TableRowsQuery, TableRowsSource},
    AppState,
};

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Set up test database connection
///
/// Uses TEST_DATABASE_URL; returns None when it is unset so database tests
/// are skipped on machines without Postgres.
pub async fn setup_test_db() -> Option<DatabaseConnection> {
    let database_url = env::var("TEST_DATABASE_URL").ok()?;

    MIGRATED
        .get_or_init(|| async {
            let db = Database::connect(&database_url)
                .await
                .expect("Test database connection should succeed");
            migration::Migrator::up(&db, None)
                .await
                .expect("Migrations should apply");
        })
        .await;

    Some(
        Database::connect(&database_url)
            .await
            .expect("Test database connection should succeed"),
    )
}

/// Random valid WAX account name (12 chars of a-p)
pub fn unique_wax_account() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(12)
        .map(|c| (b'a' + c.to_digit(16).unwrap_or(0) as u8) as char)
        .collect()
}

pub fn unique_proposal_id() -> u64 {
    (Uuid::new_v4().as_u128() % 1_000_000_000) as u64 + 1
}

/// In-memory proposals table keyed by proposal id
///
/// Every query gets a single page holding the row whose key equals the
/// lower bound, or no row at all.
pub struct FakeProposalsTable {
    rows: Mutex<HashMap<String, Value>>,
    failure: Mutex<Option<ChainError>>,
}

impl FakeProposalsTable {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn with_proposal(self, proposal_id: u64, proposer: &str, status: &str) -> Self {
        self.set_proposal(proposal_id, proposer, status);
        self
    }

    pub fn set_proposal(&self, proposal_id: u64, proposer: &str, status: &str) {
        self.rows.lock().unwrap().insert(
            proposal_id.to_string(),
            serde_json::json!({
                "proposal_id": proposal_id,
                "proposer": proposer,
                "status": status,
                "title": format!("Proposal {}", proposal_id),
            }),
        );
    }

    pub fn insert_row(&self, key: &str, row: Value) {
        self.rows.lock().unwrap().insert(key.to_string(), row);
    }

    pub fn fail_with(&self, error: ChainError) {
        *self.failure.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl TableRowsSource for FakeProposalsTable {
    async fn fetch_page(&self, query: &TableRowsQuery) -> Result<TableRowsPage, ChainError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        // Deliverables are scoped by proposal id and returned in full
        if query.table == "deliverables" {
            let rows = self
                .rows
                .lock()
                .unwrap()
                .get(&format!("deliverables:{}", query.scope))
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            return Ok(TableRowsPage {
                rows,
                more: false,
                next_key: None,
            });
        }

        let rows = query
            .lower_bound
            .as_ref()
            .and_then(|key| self.rows.lock().unwrap().get(key).cloned())
            .into_iter()
            .collect();

        Ok(TableRowsPage {
            rows,
            more: false,
            next_key: None,
        })
    }
}

pub fn test_settings() -> Settings {
    Settings::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/unused".to_string()),
        _ => None,
    })
    .expect("Test settings should be valid")
}

/// Router over `table` with a database that fails every query
pub fn test_app(table: FakeProposalsTable) -> Router {
    let settings = test_settings();
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        chain: Arc::new(table),
        contract: settings.contract.clone(),
        proposals: ProposalCache::new(Duration::from_secs(30)),
        settings: Arc::new(settings),
    };
    build_router(state)
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    read_json(app, request).await
}

/// Send `body` verbatim as an `application/json` request
pub async fn send_json(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    read_json(app, request).await
}

pub async fn read_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}
