//! Persistent storage of analysis runs using SQLite.
//!
//! Every analysis writes one row into `analysis_results`, keyed to a row in
//! `sessions`. Parameters and payloads are stored as JSON text so the history
//! endpoints can return them verbatim.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};

/// One stored analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Database row id; None until saved.
    pub id: Option<i64>,
    pub session_id: String,
    /// Analysis kind: "timeseries", "histogram", "pareto", or "comparison".
    pub analysis_type: String,
    /// Store filter in effect, if any.
    pub store: Option<String>,
    /// Resolved metric column.
    pub target_column: Option<String>,
    /// Row creation timestamp as stored by SQLite; None until saved.
    pub created_at: Option<String>,
    /// Request parameters as JSON.
    pub parameters: Value,
    /// Analysis payload as JSON.
    pub results: Value,
    /// Wall-clock seconds spent on the analysis.
    pub execution_time: f64,
}

/// Query filter for the analysis history.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub session_id: Option<String>,
    pub analysis_type: Option<String>,
    pub store: Option<String>,
    pub limit: usize,
}

/// Per-session rollup: metadata plus how many analyses ran against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub store: Option<String>,
    pub analysis_count: i64,
    pub last_analysis: Option<String>,
}

/// Persistent store for sessions and analysis results.
pub struct ResultStore {
    db_path: String,
}

impl ResultStore {
    /// Create or open a result store at the given path, creating the parent
    /// directory and schema as needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().display().to_string();
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AnalysisError::Database(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(&db_path)
            .map_err(|e| AnalysisError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                store TEXT,
                metadata TEXT
            )",
            [],
        )
        .map_err(|e| AnalysisError::Database(format!("Failed to create sessions table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                analysis_type TEXT NOT NULL,
                store TEXT,
                target_column TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                parameters TEXT,
                results TEXT,
                execution_time REAL,
                FOREIGN KEY (session_id) REFERENCES sessions(session_id)
            )",
            [],
        )
        .map_err(|e| AnalysisError::Database(format!("Failed to create results table: {}", e)))?;

        let indices = [
            "CREATE INDEX IF NOT EXISTS idx_session_id ON analysis_results(session_id)",
            "CREATE INDEX IF NOT EXISTS idx_analysis_type ON analysis_results(analysis_type)",
            "CREATE INDEX IF NOT EXISTS idx_created_at ON analysis_results(created_at DESC)",
        ];
        for sql in indices {
            conn.execute(sql, [])
                .map_err(|e| AnalysisError::Database(format!("Failed to create index: {}", e)))?;
        }

        info!("Opened result store at {}", db_path);

        Ok(ResultStore { db_path })
    }

    /// Upsert a session row, bumping `updated_at`.
    pub fn save_session(
        &self,
        session_id: &str,
        store: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let metadata_json = match metadata {
            Some(m) => serde_json::to_string(m)?,
            None => "{}".to_string(),
        };
        conn.execute(
            "INSERT INTO sessions (session_id, store, metadata)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                store = excluded.store,
                metadata = excluded.metadata,
                updated_at = CURRENT_TIMESTAMP",
            params![session_id, store, metadata_json],
        )
        .map_err(|e| AnalysisError::Database(format!("Failed to save session: {}", e)))?;

        debug!("Saved session {}", session_id);
        Ok(())
    }

    /// Insert an analysis record and return its row id.
    pub fn save_result(&self, record: &AnalysisRecord) -> Result<i64> {
        let conn = self.connect()?;
        let parameters_json = serde_json::to_string(&record.parameters)?;
        let results_json = serde_json::to_string(&record.results)?;

        conn.execute(
            "INSERT INTO analysis_results
                (session_id, analysis_type, store, target_column,
                 parameters, results, execution_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.session_id,
                record.analysis_type,
                record.store,
                record.target_column,
                parameters_json,
                results_json,
                record.execution_time,
            ],
        )
        .map_err(|e| AnalysisError::Database(format!("Failed to save analysis result: {}", e)))?;

        let id = conn.last_insert_rowid();
        debug!(
            "Saved {} result {} for session {}",
            record.analysis_type, id, record.session_id
        );
        Ok(id)
    }

    /// List stored results matching the filter, newest first.
    pub fn get_results(&self, filter: &HistoryFilter) -> Result<Vec<AnalysisRecord>> {
        let conn = self.connect()?;

        let mut sql = "SELECT id, session_id, analysis_type, store, target_column,
                              created_at, parameters, results, execution_time
                       FROM analysis_results WHERE 1=1"
            .to_string();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref session_id) = filter.session_id {
            sql.push_str(" AND session_id = ?");
            params.push(Box::new(session_id.clone()));
        }
        if let Some(ref analysis_type) = filter.analysis_type {
            sql.push_str(" AND analysis_type = ?");
            params.push(Box::new(analysis_type.clone()));
        }
        if let Some(ref store) = filter.store {
            sql.push_str(" AND store = ?");
            params.push(Box::new(store.clone()));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        params.push(Box::new(filter.limit.max(1) as i64));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AnalysisError::Database(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::row_to_record)
            .map_err(|e| AnalysisError::Database(format!("Failed to execute query: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(
                row.map_err(|e| AnalysisError::Database(format!("Failed to read row: {}", e)))?,
            );
        }
        Ok(results)
    }

    /// Fetch one stored result by id.
    pub fn get_result(&self, id: i64) -> Result<Option<AnalysisRecord>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, session_id, analysis_type, store, target_column,
                    created_at, parameters, results, execution_time
             FROM analysis_results WHERE id = ?1",
            params![id],
            Self::row_to_record,
        )
        .optional()
        .map_err(|e| AnalysisError::Database(format!("Failed to query result: {}", e)))
    }

    /// Session metadata joined with its analysis counts. None when the
    /// session was never saved.
    pub fn session_summary(&self, session_id: &str) -> Result<Option<SessionSummary>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT s.session_id, s.created_at, s.updated_at, s.store,
                    COUNT(ar.id) AS analysis_count,
                    MAX(ar.created_at) AS last_analysis
             FROM sessions s
             LEFT JOIN analysis_results ar ON s.session_id = ar.session_id
             WHERE s.session_id = ?1
             GROUP BY s.session_id",
            params![session_id],
            |row| {
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                    store: row.get(3)?,
                    analysis_count: row.get(4)?,
                    last_analysis: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(|e| AnalysisError::Database(format!("Failed to query session summary: {}", e)))
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .map_err(|e| AnalysisError::Database(format!("Failed to connect to database: {}", e)))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<AnalysisRecord> {
        let parameters_json: Option<String> = row.get(6)?;
        let results_json: Option<String> = row.get(7)?;
        let parameters = parameters_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);
        let results = results_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);

        Ok(AnalysisRecord {
            id: row.get(0)?,
            session_id: row.get(1)?,
            analysis_type: row.get(2)?,
            store: row.get(3)?,
            target_column: row.get(4)?,
            created_at: row.get(5)?,
            parameters,
            results,
            execution_time: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
        })
    }
}
