//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Code Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    records_written INTEGER NOT NULL DEFAULT 0
);

-- One row per code block; content-only pages get one row with NULL code
CREATE TABLE IF NOT EXISTS code_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT,
    title TEXT,
    content TEXT,
    code_block TEXT,
    language TEXT,
    tokens TEXT,
    source_type TEXT
);

CREATE INDEX IF NOT EXISTS idx_code_data_url ON code_data(url);
CREATE INDEX IF NOT EXISTS idx_code_data_language ON code_data(language);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
