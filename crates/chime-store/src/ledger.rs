//! Entrance ledger: append-only log of notified entrances.
//!
//! The dedupe window is a rolling 24 hours looking backward from the
//! caller-supplied decision time, not calendar-day bucketed. Rows are
//! never updated or deleted here; reset is an external maintenance
//! operation.

use crate::StoreError;
use chime_core::EntranceRecord;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// Length of the dedupe window.
const DEDUPE_WINDOW_HOURS: i64 = 24;

/// Append-only entrance log over SQLite.
///
/// The daemon's loop is the only writer, but the interface does not
/// assume serialized access — every operation is a single statement.
pub struct EntranceLedger {
    conn: Connection,
}

/// Timestamps are stored as RFC 3339 UTC text with fixed precision, so
/// lexicographic comparison in SQL is chronological comparison.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl EntranceLedger {
    /// Open (and create if needed) the entrances table at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entrances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// True iff a recorded entrance for `name` falls within the rolling
    /// window looking backward from `now`.
    pub fn has_entered_recently(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let cutoff = encode_ts(now - Duration::hours(DEDUPE_WINDOW_HOURS));
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM entrances WHERE name = ?1 AND timestamp > ?2 LIMIT 1",
        )?;
        let found = stmt.exists(params![name, cutoff])?;
        Ok(found)
    }

    /// Append one entrance row. Every qualifying notification appends;
    /// there is no update or merge.
    pub fn record(&self, name: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO entrances (name, timestamp) VALUES (?1, ?2)",
            params![name, encode_ts(now)],
        )?;
        Ok(())
    }

    /// Most recent entrances, newest first. Admin/status use.
    pub fn recent(&self, limit: usize) -> Result<Vec<EntranceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, timestamp FROM entrances ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let name: String = row.get(0)?;
            let ts: String = row.get(1)?;
            Ok((name, ts))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (name, ts) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map_err(|_| StoreError::CorruptTimestamp(ts.clone()))?
                .with_timezone(&Utc);
            out.push(EntranceRecord { name, timestamp });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger() -> EntranceLedger {
        EntranceLedger::open(Path::new(":memory:")).unwrap()
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_unseen_name_has_not_entered() {
        let l = ledger();
        assert!(!l.has_entered_recently("alice", t(12)).unwrap());
    }

    #[test]
    fn test_recorded_entrance_dedupes_within_window() {
        let l = ledger();
        l.record("alice", t(12)).unwrap();
        // Ten seconds later, same day: still inside the window.
        let later = t(12) + Duration::seconds(10);
        assert!(l.has_entered_recently("alice", later).unwrap());
    }

    #[test]
    fn test_window_is_rolling_not_calendar_day() {
        let l = ledger();
        // 23:00 entrance; 01:00 next day is a new calendar day but
        // still inside the rolling 24h window.
        l.record("alice", t(23)).unwrap();
        let next_day = t(23) + Duration::hours(2);
        assert!(l.has_entered_recently("alice", next_day).unwrap());
    }

    #[test]
    fn test_entrance_expires_after_24_hours() {
        let l = ledger();
        l.record("alice", t(12)).unwrap();
        let next_day = t(12) + Duration::hours(24) + Duration::seconds(1);
        assert!(!l.has_entered_recently("alice", next_day).unwrap());
    }

    #[test]
    fn test_window_is_per_name() {
        let l = ledger();
        l.record("alice", t(12)).unwrap();
        assert!(!l.has_entered_recently("bob", t(12)).unwrap());
    }

    #[test]
    fn test_records_append_not_merge() {
        let l = ledger();
        l.record("alice", t(1)).unwrap();
        l.record("alice", t(2)).unwrap();
        let rows = l.recent(10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first.
        assert_eq!(rows[0].timestamp, t(2));
        assert_eq!(rows[1].timestamp, t(1));
    }

    #[test]
    fn test_recent_limit() {
        let l = ledger();
        for h in 0..5 {
            l.record("alice", t(h)).unwrap();
        }
        assert_eq!(l.recent(3).unwrap().len(), 3);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let l = ledger();
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 45).unwrap();
        l.record("alice", ts).unwrap();
        let rows = l.recent(1).unwrap();
        assert_eq!(rows[0].name, "alice");
        assert_eq!(rows[0].timestamp, ts);
    }
}
