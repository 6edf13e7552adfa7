//! chime-store — SQLite persistence for the doorbell.
//!
//! Three small stores over one database file: the identity directory
//! (who we know), the entrance ledger (who we notified, when), and the
//! pause flag. Each store owns its own connection and creates its own
//! table, so the daemon and the admin CLI can open the same file from
//! separate processes.

pub mod identities;
pub mod ledger;
pub mod pause;

pub use identities::IdentityStore;
pub use ledger::EntranceLedger;
pub use pause::PauseStore;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt encoding blob for '{0}'")]
    CorruptEncoding(String),
    #[error("corrupt timestamp '{0}'")]
    CorruptTimestamp(String),
}

/// Default database location: `$XDG_DATA_HOME/chime/doorbell.db`.
pub fn default_db_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("chime")
        .join("doorbell.db")
}

/// Drop every table. External maintenance operation — the daemon never
/// calls this. Tables are recreated on the next store open.
pub fn reset(db_path: &Path) -> Result<(), StoreError> {
    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS users;
         DROP TABLE IF EXISTS entrances;
         DROP TABLE IF EXISTS system_state;",
    )?;
    tracing::info!(path = %db_path.display(), "database reset; tables dropped");
    Ok(())
}
