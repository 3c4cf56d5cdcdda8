use rusqlite::Connection;

/// Schema for the relayer's embedded database.
///
/// `jobs` holds the full state machine described in the job lifecycle design; `chain_state`
/// holds one row per chain recording the last block swept by that chain's listener. Both tables
/// are created with `IF NOT EXISTS` so repeated startups against an existing database file are
/// idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            unique_id               TEXT NOT NULL UNIQUE,
            source_chain            TEXT NOT NULL,
            source_tx_hash          TEXT NOT NULL,
            source_block_number     INTEGER NOT NULL,
            dest_chain              TEXT NOT NULL,
            dest_address            TEXT NOT NULL,
            dest_method             TEXT NOT NULL,
            dest_method_signature   TEXT NOT NULL,
            mapping_name            TEXT NOT NULL,
            event_data              TEXT NOT NULL,
            proof_required          INTEGER NOT NULL,
            proof_data              TEXT,
            status                  TEXT NOT NULL,
            dest_tx_hash            TEXT,
            retry_count             INTEGER NOT NULL DEFAULT 0,
            error_message           TEXT,
            created_at              TEXT NOT NULL,
            completed_at            TEXT,
            last_retry_at           TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
        CREATE INDEX IF NOT EXISTS idx_jobs_mapping_name ON jobs(mapping_name);
        CREATE INDEX IF NOT EXISTS idx_jobs_source_chain ON jobs(source_chain);
        CREATE INDEX IF NOT EXISTS idx_jobs_dest_chain ON jobs(dest_chain);

        CREATE TABLE IF NOT EXISTS chain_state (
            chain_name      TEXT PRIMARY KEY,
            last_processed  INTEGER NOT NULL,
            updated_at      TEXT NOT NULL
        );
        "#,
    )
}
