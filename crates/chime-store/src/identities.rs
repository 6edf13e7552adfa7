//! Identity directory: durable mapping name → (encoding, audio clip).

use crate::StoreError;
use chime_core::{FaceEncoding, KnownIdentity};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable store of registered people. Encodings are little-endian f32
/// BLOBs; audio clips are stored verbatim.
pub struct IdentityStore {
    conn: Connection,
}

impl IdentityStore {
    /// Open (and create if needed) the users table at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                name TEXT PRIMARY KEY,
                encoding BLOB NOT NULL,
                audio BLOB
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Register or replace an identity.
    pub fn add(
        &self,
        name: &str,
        encoding: &FaceEncoding,
        audio_clip: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO users (name, encoding, audio) VALUES (?1, ?2, ?3)",
            params![name, encoding.to_le_bytes(), audio_clip],
        )?;
        tracing::info!(name, "identity registered");
        Ok(())
    }

    /// Remove an identity. Returns false if no such name existed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    }

    /// Load the full in-memory snapshot used for one classification
    /// cycle. Re-read every poll, so admin registrations and removals
    /// are visible by the next iteration.
    pub fn snapshot(&self) -> Result<Vec<KnownIdentity>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, encoding, audio FROM users ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let audio: Option<Vec<u8>> = row.get(2)?;
            Ok((name, blob, audio))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (name, blob, audio_clip) = row?;
            let encoding = FaceEncoding::from_le_bytes(&blob)
                .ok_or_else(|| StoreError::CorruptEncoding(name.clone()))?;
            out.push(KnownIdentity {
                name,
                encoding,
                audio_clip,
            });
        }
        Ok(out)
    }

    /// Fetch one identity by name.
    pub fn get(&self, name: &str) -> Result<Option<KnownIdentity>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT encoding, audio FROM users WHERE name = ?1",
                params![name],
                |row| {
                    let blob: Vec<u8> = row.get(0)?;
                    let audio: Option<Vec<u8>> = row.get(1)?;
                    Ok((blob, audio))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((blob, audio_clip)) => {
                let encoding = FaceEncoding::from_le_bytes(&blob)
                    .ok_or_else(|| StoreError::CorruptEncoding(name.to_string()))?;
                Ok(Some(KnownIdentity {
                    name: name.to_string(),
                    encoding,
                    audio_clip,
                }))
            }
        }
    }
}
