//! SQLite storage implementation
//!
//! This module provides the SQLite-backed `Sink` plus the run bookkeeping and
//! summary queries used by `--stats`.

use crate::extract::ExtractionRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Sink, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    run_id: Option<i64>,
    records_written: u64,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            run_id: None,
            records_written: 0,
        }
    }

    // ===== Run Management =====

    /// Starts a run; records written afterwards are counted against it
    pub fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;

        let run_id = self.conn.last_insert_rowid();
        self.run_id = Some(run_id);
        self.records_written = 0;
        Ok(run_id)
    }

    /// Closes the current run with a final status
    pub fn finish_run(&mut self, status: RunStatus) -> StorageResult<()> {
        let Some(run_id) = self.run_id else {
            return Ok(());
        };

        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, records_written = ?3 WHERE id = ?4",
            params![
                status.to_db_string(),
                now,
                self.records_written as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, records_written
                 FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Running),
                        records_written: row.get::<_, i64>(5)? as u64,
                    })
                },
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let latest: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM runs", [], |row| row.get(0))?;

        latest.map(|id| self.get_run(id)).transpose()
    }

    // ===== Records =====

    /// Inserts one record as a single transaction
    ///
    /// Each code block becomes a row; a record without code blocks becomes
    /// one row with a NULL code block.
    pub fn insert_record(&mut self, record: &ExtractionRecord) -> StorageResult<usize> {
        let source_type = record.source_type.as_str();
        let tx = self.conn.transaction()?;

        let rows = {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO code_data (url, title, content, code_block, language, tokens, source_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            if record.code_blocks.is_empty() {
                stmt.execute(params![
                    record.url,
                    record.title,
                    record.content,
                    Option::<String>::None,
                    Option::<String>::None,
                    Option::<String>::None,
                    source_type
                ])?;
                1
            } else {
                for block in &record.code_blocks {
                    let tokens = serde_json::to_string(&block.tokens)?;
                    stmt.execute(params![
                        record.url,
                        record.title,
                        record.content,
                        block.code,
                        block.language,
                        tokens,
                        source_type
                    ])?;
                }
                record.code_blocks.len()
            }
        };

        tx.commit()?;
        Ok(rows)
    }

    // ===== Statistics =====

    /// Total rows in `code_data`
    pub fn count_rows(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM code_data", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of distinct pages stored
    pub fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT url) FROM code_data", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    /// Rows per source type, most frequent first
    pub fn count_by_source_type(&self) -> StorageResult<Vec<(String, u64)>> {
        self.grouped_counts(
            "SELECT COALESCE(source_type, 'unknown'), COUNT(*) FROM code_data
             GROUP BY 1 ORDER BY 2 DESC, 1",
        )
    }

    /// Code blocks per language, most frequent first
    pub fn count_by_language(&self) -> StorageResult<Vec<(String, u64)>> {
        self.grouped_counts(
            "SELECT language, COUNT(*) FROM code_data
             WHERE code_block IS NOT NULL
             GROUP BY 1 ORDER BY 2 DESC, 1",
        )
    }

    fn grouped_counts(&self, sql: &str) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    row.get::<_, i64>(1)? as u64,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Sink for SqliteStorage {
    fn write(&mut self, record: &ExtractionRecord) -> StorageResult<usize> {
        let rows = self.insert_record(record)?;
        self.records_written += 1;
        Ok(rows)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}
