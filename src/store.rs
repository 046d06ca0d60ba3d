use std::path::PathBuf;

use anyhow::Result;
use rusqlite::Connection;

use crate::types::{Note, Preferences};

/// Logical key for the serialized notes collection.
const NOTES_KEY: &str = "nv_notes_v1";

/// Logical key for the serialized preferences record.
const PREFS_KEY: &str = "nv_prefs_v1";

/// Key-value persistence gateway backed by a single SQLite table.
///
/// The whole notes collection is serialized into one row, so each save is
/// a single `INSERT OR REPLACE` — readers never observe a partially
/// written collection. Reads degrade to empty defaults on missing or
/// corrupt data; they never fail.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { path };
        let conn = store.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )?;
        Ok(store)
    }

    /// Connections are opened per operation; WAL keeps concurrent reads
    /// cheap and the busy timeout rides out overlapping writes.
    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(conn)
    }

    fn get_kv(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    fn set_kv(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Load the notes collection. Missing or corrupt data yields an empty
    /// collection, never an error.
    pub fn load_notes(&self) -> Vec<Note> {
        match self.get_kv(NOTES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding corrupt notes record: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read notes record: {e}");
                Vec::new()
            }
        }
    }

    /// Persist the whole notes collection.
    pub fn save_notes(&self, notes: &[Note]) -> Result<()> {
        self.set_kv(NOTES_KEY, &serde_json::to_string(notes)?)
    }

    /// Load the preferences record. Missing or corrupt data yields the
    /// default record, never an error.
    pub fn load_prefs(&self) -> Preferences {
        match self.get_kv(PREFS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding corrupt preferences record: {e}");
                Preferences::default()
            }),
            Ok(None) => Preferences::default(),
            Err(e) => {
                tracing::warn!("Failed to read preferences record: {e}");
                Preferences::default()
            }
        }
    }

    pub fn save_prefs(&self, prefs: &Preferences) -> Result<()> {
        self.set_kv(PREFS_KEY, &serde_json::to_string(prefs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::new_note;
    use tempfile::tempdir;

    #[test]
    fn missing_records_load_as_defaults() {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("nv.sqlite")).expect("open");
        assert!(store.load_notes().is_empty());
        assert!(store.load_prefs().last_opened_id.is_none());
    }

    #[test]
    fn notes_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("nv.sqlite")).expect("open");

        let mut note = new_note();
        note.title = "Groceries".to_string();
        note.html = "<p>milk</p>".to_string();
        store.save_notes(std::slice::from_ref(&note)).expect("save");

        let loaded = store.load_notes();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, note.id);
        assert_eq!(loaded[0].title, "Groceries");
        assert_eq!(loaded[0].html, "<p>milk</p>");
    }

    #[test]
    fn prefs_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("nv.sqlite")).expect("open");

        store
            .save_prefs(&Preferences {
                last_opened_id: Some("abc".to_string()),
            })
            .expect("save");
        assert_eq!(store.load_prefs().last_opened_id.as_deref(), Some("abc"));
    }

    #[test]
    fn corrupt_records_load_as_defaults() {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("nv.sqlite")).expect("open");

        store.set_kv(NOTES_KEY, "{not json").expect("set");
        store.set_kv(PREFS_KEY, "[1, 2, 3]").expect("set");

        assert!(store.load_notes().is_empty());
        assert!(store.load_prefs().last_opened_id.is_none());
    }

    #[test]
    fn saves_overwrite_in_place() {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("nv.sqlite")).expect("open");

        store.save_notes(&[new_note(), new_note()]).expect("save");
        store.save_notes(&[new_note()]).expect("save again");
        assert_eq!(store.load_notes().len(), 1);
    }
}
