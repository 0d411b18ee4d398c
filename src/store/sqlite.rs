//! SQLite case mirror
//!
//! Keeps the `cases` table in a local database file so committed cases
//! survive restarts without a network store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use super::remote::{decode_report_data, CaseRow, RemoteCaseStore};
use super::StoreResult;
use crate::report::AnalysisReport;

/// Database file used when none is configured
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("accident-analytics")
        .join("cases.db")
}

/// Thread-safe handle to the case database
pub struct SqliteCaseStore {
    conn: Mutex<Connection>,
}

impl SqliteCaseStore {
    /// Open or create the database at `db_path`
    pub fn new(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;

        tracing::info!("Case database ready at: {:?}", db_path);
        Ok(store)
    }

    /// Database that lives only as long as the handle
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> SqlResult<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                id TEXT PRIMARY KEY,
                reference_number TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                description TEXT NOT NULL,
                location TEXT NOT NULL,
                plaintiff TEXT NOT NULL,
                defendant TEXT NOT NULL,
                report_data TEXT,
                thumbnail_url TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_cases_created ON cases(created_at);
            "#,
        )
    }

    pub fn insert_row(&self, row: &CaseRow) -> StoreResult<()> {
        let report_data = row.report_data.as_ref().map(|value| value.to_string());
        self.conn().execute(
            "INSERT INTO cases (id, reference_number, status, created_at, description, location,
                                plaintiff, defendant, report_data, thumbnail_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.id,
                row.reference_number,
                row.status,
                row.created_at,
                row.description,
                row.location,
                row.plaintiff,
                row.defendant,
                report_data,
                row.thumbnail_url
            ],
        )?;
        Ok(())
    }

    pub fn recent_rows(&self, limit: usize) -> StoreResult<Vec<CaseRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, reference_number, status, created_at, description, location,
                    plaintiff, defendant, report_data, thumbnail_url
             FROM cases
             ORDER BY created_at DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                CaseRow {
                    id: row.get(0)?,
                    reference_number: row.get(1)?,
                    status: row.get(2)?,
                    created_at: row.get(3)?,
                    description: row.get(4)?,
                    location: row.get(5)?,
                    plaintiff: row.get(6)?,
                    defendant: row.get(7)?,
                    report_data: None,
                    thumbnail_url: row.get(9)?,
                },
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut cases = Vec::new();
        for entry in rows {
            let (mut case, report_json) = entry?;
            case.report_data = report_json.as_deref().and_then(|json| parse_stored_json(&case.id, json));
            cases.push(case);
        }
        Ok(cases)
    }

    pub fn report_for(&self, case_id: &str) -> StoreResult<Option<AnalysisReport>> {
        let report_json: Option<Option<String>> = self
            .conn()
            .query_row(
                "SELECT report_data FROM cases WHERE id = ?1",
                params![case_id],
                |row| row.get(0),
            )
            .optional()?;

        let value = report_json.flatten().and_then(|json| parse_stored_json(case_id, &json));
        Ok(decode_report_data(case_id, value))
    }

    pub fn count(&self) -> StoreResult<usize> {
        let n: i64 = self.conn().query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Text column to JSON, skipping values that are not JSON at all
fn parse_stored_json(case_id: &str, json: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(case_id = %case_id, "Stored report is not JSON, ignoring it: {}", e);
            None
        }
    }
}

#[async_trait]
impl RemoteCaseStore for SqliteCaseStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn select_recent(&self, limit: usize) -> StoreResult<Vec<CaseRow>> {
        self.recent_rows(limit)
    }

    async fn insert(&self, row: CaseRow) -> StoreResult<()> {
        self.insert_row(&row)
    }

    async fn select_report(&self, case_id: &str) -> StoreResult<Option<AnalysisReport>> {
        self.report_for(case_id)
    }
}
