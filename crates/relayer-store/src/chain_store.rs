use crate::db::Database;
use relayer_core::error::StoreError;
use rusqlite::OptionalExtension;

/// Tracks the last block swept per chain so a listener can resume across restarts.
#[derive(Clone)]
pub struct ChainStore {
    db: Database,
}

impl ChainStore {
    pub fn new(db: Database) -> ChainStore {
        ChainStore { db }
    }

    /// Returns 0 when no state has been persisted yet for `chain`.
    pub fn get_last_processed(&self, chain: &str) -> Result<u64, StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("chain store mutex poisoned");
        conn.query_row(
            "SELECT last_processed FROM chain_state WHERE chain_name = ?1",
            [chain],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
        .map(|v| v.map(|n| n as u64).unwrap_or(0))
    }

    pub fn set_last_processed(&self, chain: &str, block_number: u64) -> Result<(), StoreError> {
        let conn = self.db.connection();
        let conn = conn.lock().expect("chain store mutex poisoned");
        conn.execute(
            "INSERT INTO chain_state (chain_name, last_processed, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(chain_name) DO UPDATE SET
                last_processed = excluded.last_processed,
                updated_at = excluded.updated_at",
            rusqlite::params![chain, block_number as i64, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_zero_for_unseen_chain() {
        let store = ChainStore::new(Database::open_in_memory().unwrap());
        assert_eq!(store.get_last_processed("base").unwrap(), 0);
    }

    #[test]
    fn set_then_get_round_trips_and_is_idempotent_upsert() {
        let store = ChainStore::new(Database::open_in_memory().unwrap());
        store.set_last_processed("base", 100).unwrap();
        assert_eq!(store.get_last_processed("base").unwrap(), 100);
        store.set_last_processed("base", 150).unwrap();
        assert_eq!(store.get_last_processed("base").unwrap(), 150);
    }
}
