//! SQLite storage backend for Scout

use super::records::{AnalysisRecord, ExecutionRecord, Metadata};
use super::traits::{AnalysisStore, ExecutionStore, OpenStore, StorageError, StorageResult};
use crate::case::{CaseIdentifier, Triple};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const EXECUTION_COLUMNS: &str = "run_id, run_number, job_id, action_name, workflow_name, \
     raw_content, content_type, stored_at, parsed, metadata_json";

const ANALYSIS_COLUMNS: &str = "run_id, run_number, job_id, action_name, workflow_name, \
     analysis_kind, parsed_data_json, parsed_at, metadata_json";

/// SQLite-backed execution and analysis store
///
/// Uses a single SQLite database file with one table per store, both keyed
/// by the encoded case triple. Thread-safe via internal mutex on the
/// connection; every write is committed before the call returns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Identifier columns shared by both tables
struct CaseColumns {
    run_id: Option<i64>,
    run_number: Option<i64>,
    job_id: Option<String>,
    action_name: Option<String>,
    workflow_name: String,
}

impl CaseColumns {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            run_number: row.get(1)?,
            job_id: row.get(2)?,
            action_name: row.get(3)?,
            workflow_name: row.get(4)?,
        })
    }

    fn into_case(self) -> StorageResult<CaseIdentifier> {
        let label = format!("{:?}/{:?}/{:?}", self.workflow_name, self.run_id, self.job_id);
        CaseIdentifier::new(
            self.workflow_name,
            self.run_id,
            self.run_number,
            self.job_id,
            self.action_name,
        )
        .map_err(|e| StorageError::InvalidKey(format!("{}: {}", label, e)))
    }
}

struct ExecutionRow {
    case: CaseColumns,
    raw_content: String,
    content_type: String,
    stored_at: String,
    parsed: bool,
    metadata_json: String,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            case: CaseColumns::from_row(row)?,
            raw_content: row.get(5)?,
            content_type: row.get(6)?,
            stored_at: row.get(7)?,
            parsed: row.get(8)?,
            metadata_json: row.get(9)?,
        })
    }

    fn into_record(self) -> StorageResult<ExecutionRecord> {
        Ok(ExecutionRecord {
            case: self.case.into_case()?,
            raw_content: self.raw_content,
            content_type: self.content_type,
            stored_at: parse_timestamp(&self.stored_at)?,
            parsed: self.parsed,
            metadata: serde_json::from_str::<Metadata>(&self.metadata_json)?,
        })
    }
}

struct AnalysisRow {
    case: CaseColumns,
    analysis_kind: String,
    parsed_data_json: String,
    parsed_at: String,
    metadata_json: String,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            case: CaseColumns::from_row(row)?,
            analysis_kind: row.get(5)?,
            parsed_data_json: row.get(6)?,
            parsed_at: row.get(7)?,
            metadata_json: row.get(8)?,
        })
    }

    fn into_record(self) -> StorageResult<AnalysisRecord> {
        Ok(AnalysisRecord {
            case: self.case.into_case()?,
            analysis_kind: self.analysis_kind,
            parsed_data: serde_json::from_str(&self.parsed_data_json)?,
            parsed_at: parse_timestamp(&self.parsed_at)?,
            metadata: serde_json::from_str::<Metadata>(&self.metadata_json)?,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Raw fetched content, one row per case triple
            CREATE TABLE IF NOT EXISTS executions (
                workflow_name TEXT NOT NULL,
                execution_key TEXT NOT NULL,
                job_key TEXT NOT NULL,
                run_id INTEGER,
                run_number INTEGER,
                job_id TEXT,
                action_name TEXT,
                raw_content TEXT NOT NULL,
                content_type TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                parsed INTEGER NOT NULL DEFAULT 0,
                metadata_json TEXT NOT NULL,
                PRIMARY KEY (workflow_name, execution_key, job_key)
            );

            CREATE INDEX IF NOT EXISTS idx_executions_recent
                ON executions(workflow_name, stored_at);
            CREATE INDEX IF NOT EXISTS idx_executions_parsed
                ON executions(parsed);

            -- Structured parse results, one row per triple and analysis kind
            CREATE TABLE IF NOT EXISTS analyses (
                workflow_name TEXT NOT NULL,
                execution_key TEXT NOT NULL,
                job_key TEXT NOT NULL,
                analysis_kind TEXT NOT NULL,
                run_id INTEGER,
                run_number INTEGER,
                job_id TEXT,
                action_name TEXT,
                parsed_data_json TEXT NOT NULL,
                parsed_at TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                PRIMARY KEY (workflow_name, execution_key, job_key, analysis_kind)
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_recent
                ON analyses(workflow_name, parsed_at);

            -- WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Shared newest-first listing for both tables
    fn list_recent<T, R>(
        &self,
        sql_prefix: &str,
        order_column: &str,
        workflow: Option<&str>,
        limit: usize,
        map_row: fn(&Row<'_>) -> rusqlite::Result<R>,
        into_record: fn(R) -> StorageResult<T>,
    ) -> StorageResult<Vec<T>> {
        let conn = self.conn()?;

        let mut sql = String::from(sql_prefix);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(workflow) = workflow {
            sql.push_str(" WHERE workflow_name = ?");
            params_vec.push(Box::new(workflow.to_string()));
        }
        sql.push_str(&format!(" ORDER BY {} DESC, rowid DESC LIMIT {}", order_column, limit));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), map_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ExecutionStore for SqliteStore {
    fn save_execution(&self, record: &ExecutionRecord) -> StorageResult<()> {
        let triple = record.triple();
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO executions (workflow_name, execution_key, job_key, run_id, run_number, job_id,
                                    action_name, raw_content, content_type, stored_at, parsed, metadata_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(workflow_name, execution_key, job_key) DO UPDATE SET
                run_id = excluded.run_id,
                run_number = excluded.run_number,
                job_id = excluded.job_id,
                action_name = excluded.action_name,
                raw_content = excluded.raw_content,
                content_type = excluded.content_type,
                stored_at = excluded.stored_at,
                parsed = executions.parsed OR excluded.parsed,
                metadata_json = excluded.metadata_json
            "#,
            params![
                triple.workflow_name,
                triple.execution_key(),
                triple.job_key(),
                record.case.run_id(),
                record.case.run_number(),
                record.case.job_id(),
                record.case.action_name(),
                record.raw_content,
                record.content_type,
                record.stored_at.to_rfc3339(),
                record.parsed,
                metadata_json,
            ],
        )?;

        tracing::debug!(triple = %triple, bytes = record.raw_content.len(), "saved execution record");
        Ok(())
    }

    fn load_execution(&self, triple: &Triple) -> StorageResult<Option<ExecutionRecord>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM executions
                     WHERE workflow_name = ?1 AND execution_key = ?2 AND job_key = ?3",
                    EXECUTION_COLUMNS
                ),
                params![triple.workflow_name, triple.execution_key(), triple.job_key()],
                ExecutionRow::from_row,
            )
            .optional()?;

        row.map(ExecutionRow::into_record).transpose()
    }

    fn list_recent_executions(
        &self,
        workflow: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<ExecutionRecord>> {
        self.list_recent(
            &format!("SELECT {} FROM executions", EXECUTION_COLUMNS),
            "stored_at",
            workflow,
            limit,
            ExecutionRow::from_row,
            ExecutionRow::into_record,
        )
    }

    fn mark_parsed(&self, triple: &Triple) -> StorageResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE executions SET parsed = 1
             WHERE workflow_name = ?1 AND execution_key = ?2 AND job_key = ?3",
            params![triple.workflow_name, triple.execution_key(), triple.job_key()],
        )?;
        Ok(rows > 0)
    }
}

impl AnalysisStore for SqliteStore {
    fn save_analysis(&self, record: &AnalysisRecord) -> StorageResult<()> {
        let triple = record.triple();
        let parsed_data_json = serde_json::to_string(&record.parsed_data)?;
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO analyses (workflow_name, execution_key, job_key, analysis_kind, run_id, run_number,
                                  job_id, action_name, parsed_data_json, parsed_at, metadata_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(workflow_name, execution_key, job_key, analysis_kind) DO UPDATE SET
                run_id = excluded.run_id,
                run_number = excluded.run_number,
                job_id = excluded.job_id,
                action_name = excluded.action_name,
                parsed_data_json = excluded.parsed_data_json,
                parsed_at = excluded.parsed_at,
                metadata_json = excluded.metadata_json
            "#,
            params![
                triple.workflow_name,
                triple.execution_key(),
                triple.job_key(),
                record.analysis_kind,
                record.case.run_id(),
                record.case.run_number(),
                record.case.job_id(),
                record.case.action_name(),
                parsed_data_json,
                record.parsed_at.to_rfc3339(),
                metadata_json,
            ],
        )?;

        tracing::debug!(triple = %triple, kind = %record.analysis_kind, "saved analysis record");
        Ok(())
    }

    fn load_analysis(&self, triple: &Triple) -> StorageResult<Option<AnalysisRecord>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM analyses
                     WHERE workflow_name = ?1 AND execution_key = ?2 AND job_key = ?3
                     ORDER BY parsed_at DESC, rowid DESC LIMIT 1",
                    ANALYSIS_COLUMNS
                ),
                params![triple.workflow_name, triple.execution_key(), triple.job_key()],
                AnalysisRow::from_row,
            )
            .optional()?;

        row.map(AnalysisRow::into_record).transpose()
    }

    fn load_analysis_kind(&self, triple: &Triple, kind: &str) -> StorageResult<Option<AnalysisRecord>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM analyses
                     WHERE workflow_name = ?1 AND execution_key = ?2 AND job_key = ?3
                       AND analysis_kind = ?4",
                    ANALYSIS_COLUMNS
                ),
                params![triple.workflow_name, triple.execution_key(), triple.job_key(), kind],
                AnalysisRow::from_row,
            )
            .optional()?;

        row.map(AnalysisRow::into_record).transpose()
    }

    fn list_analyses(&self, triple: &Triple) -> StorageResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM analyses
             WHERE workflow_name = ?1 AND execution_key = ?2 AND job_key = ?3
             ORDER BY analysis_kind",
            ANALYSIS_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![triple.workflow_name, triple.execution_key(), triple.job_key()],
            AnalysisRow::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn list_recent_analyses(
        &self,
        workflow: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<AnalysisRecord>> {
        self.list_recent(
            &format!("SELECT {} FROM analyses", ANALYSIS_COLUMNS),
            "parsed_at",
            workflow,
            limit,
            AnalysisRow::from_row,
            AnalysisRow::into_record,
        )
    }
}
