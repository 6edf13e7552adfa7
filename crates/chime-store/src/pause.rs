//! Durable pause flag: one row, one boolean.

use crate::StoreError;
use rusqlite::{params, Connection};
use std::path::Path;

/// Durable pause state. Created not-paused on first open. Toggled by
/// the admin CLI; read by the daemon every poll cycle.
pub struct PauseStore {
    conn: Connection,
}

impl PauseStore {
    /// Open (and create if needed) the single-row system_state table.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS system_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                is_paused INTEGER NOT NULL
            )",
            [],
        )?;
        // First run: default not-paused.
        conn.execute(
            "INSERT OR IGNORE INTO system_state (id, is_paused) VALUES (1, 0)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn is_paused(&self) -> Result<bool, StoreError> {
        let paused: i64 = self.conn.query_row(
            "SELECT is_paused FROM system_state WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(paused != 0)
    }

    pub fn set_paused(&self, paused: bool) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE system_state SET is_paused = ?1 WHERE id = 1",
            params![paused as i64],
        )?;
        Ok(())
    }

    /// Flip the flag, returning the new state.
    pub fn toggle(&self) -> Result<bool, StoreError> {
        let paused: i64 = self.conn.query_row(
            "UPDATE system_state SET is_paused = NOT is_paused WHERE id = 1
             RETURNING is_paused",
            [],
            |row| row.get(0),
        )?;
        Ok(paused != 0)
    }
}
