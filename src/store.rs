use eyre::Result;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;

pub const BOOKS_KEY: &str = "books";
pub const PROGRESS_KEY: &str = "readingProgress";
pub const STATISTICS_KEY: &str = "statistics";
pub const SETTINGS_KEY: &str = "settings";

/// Durable key-value backend.
///
/// Every write carries a sequence number. A backend must keep the value with the
/// highest sequence number for a key, whatever order the writes reach it in.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Returns `false` if a write with a higher sequence number is already stored.
    fn put(&mut self, key: &str, value: &Value, seq: u64) -> Result<bool>;

    /// Highest sequence number ever stored, so numbering survives restarts.
    fn high_water_mark(&self) -> Result<u64>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(filepath: &Path) -> Result<Self> {
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(filepath)?;
        Self::init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_db(&conn)?;
        Ok(Self { conn })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                seq INTEGER NOT NULL,
                updated_at DATETIME DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key=?", params![key], |row| row.get(0))
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &str, value: &Value, seq: u64) -> Result<bool> {
        let raw = serde_json::to_string(value)?;
        let changed = self.conn.execute(
            "INSERT INTO kv (key, value, seq) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                seq = excluded.seq,
                updated_at = datetime('now')
             WHERE excluded.seq > kv.seq",
            params![key, raw, seq as i64],
        )?;
        Ok(changed > 0)
    }

    fn high_water_mark(&self) -> Result<u64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM kv", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0).max(0) as u64)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, (u64, Value)>,
    applied: Vec<(String, u64)>,
    failing: bool,
}

/// In-process backend. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` and `put` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.inner.borrow_mut().failing = failing;
    }

    /// Number of writes applied for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.inner
            .borrow()
            .applied
            .iter()
            .filter(|(k, _)| k == key)
            .count()
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.inner.borrow().values.get(key).map(|(_, v)| v.clone())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let inner = self.inner.borrow();
        if inner.failing {
            return Err(eyre::eyre!("store unavailable"));
        }
        Ok(inner.values.get(key).map(|(_, v)| v.clone()))
    }

    fn put(&mut self, key: &str, value: &Value, seq: u64) -> Result<bool> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing {
            return Err(eyre::eyre!("store unavailable"));
        }
        if let Some((stored_seq, _)) = inner.values.get(key) {
            if *stored_seq >= seq {
                return Ok(false);
            }
        }
        inner.values.insert(key.to_string(), (seq, value.clone()));
        inner.applied.push((key.to_string(), seq));
        Ok(true)
    }

    fn high_water_mark(&self) -> Result<u64> {
        let inner = self.inner.borrow();
        Ok(inner.values.values().map(|(seq, _)| *seq).max().unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
struct PendingWrite {
    key: String,
    value: Value,
    seq: u64,
}

/// Fire-and-forget write queue in front of a [`KeyValueStore`].
///
/// `submit` never touches the backend. `flush` hands queued writes over and
/// drops any write already superseded by a later submit for the same key.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
    next_seq: u64,
    pending: VecDeque<PendingWrite>,
}

pub type SharedPersistence = Rc<RefCell<Persistence>>;

impl Persistence {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let next_seq = match store.high_water_mark() {
            Ok(mark) => mark + 1,
            Err(err) => {
                log::warn!("could not read store sequence: {}", err);
                1
            }
        };
        Self {
            store,
            next_seq,
            pending: VecDeque::new(),
        }
    }

    pub fn shared(self) -> SharedPersistence {
        Rc::new(RefCell::new(self))
    }

    /// Latest value for `key`, including writes still queued. Read or decode
    /// failures are logged and reported as absent.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let queued = self
            .pending
            .iter()
            .rev()
            .find(|write| write.key == key)
            .map(|write| write.value.clone());

        let value = match queued {
            Some(value) => value,
            None => match self.store.get(key) {
                Ok(Some(value)) => value,
                Ok(None) => return None,
                Err(err) => {
                    log::warn!("failed to read {}: {}", key, err);
                    return None;
                }
            },
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                log::warn!("ignoring malformed {} record: {}", key, err);
                None
            }
        }
    }

    /// Queue a write and return its sequence number.
    pub fn submit<T: Serialize>(&mut self, key: &str, value: &T) -> Option<u64> {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("failed to encode {}: {}", key, err);
                return None;
            }
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push_back(PendingWrite {
            key: key.to_string(),
            value,
            seq,
        });
        Some(seq)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply queued writes. Failures are logged and dropped; the next submit for
    /// the same key overwrites. Returns the number of writes the backend applied.
    pub fn flush(&mut self) -> usize {
        let mut latest: HashMap<&str, u64> = HashMap::new();
        for write in &self.pending {
            latest.insert(write.key.as_str(), write.seq);
        }
        let superseded: Vec<bool> = self
            .pending
            .iter()
            .map(|write| latest.get(write.key.as_str()) != Some(&write.seq))
            .collect();

        let mut applied = 0;
        for (write, superseded) in self.pending.drain(..).zip(superseded) {
            if superseded {
                continue;
            }
            match self.store.put(&write.key, &write.value, write.seq) {
                Ok(true) => applied += 1,
                Ok(false) => log::debug!("store kept a newer {} than seq {}", write.key, write.seq),
                Err(err) => log::warn!("failed to persist {}: {}", write.key, err),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_store_roundtrip_and_missing_key() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("books").unwrap(), None);
        assert!(store.put("books", &json!([1, 2]), 1).unwrap());
        assert_eq!(store.get("books").unwrap(), Some(json!([1, 2])));
        assert_eq!(store.high_water_mark().unwrap(), 1);
    }

    #[test]
    fn test_sqlite_store_last_submitted_wins() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(store.put("statistics", &json!({"v": 2}), 2).unwrap());
        // A write submitted earlier but completing later must not win.
        assert!(!store.put("statistics", &json!({"v": 1}), 1).unwrap());
        assert_eq!(store.get("statistics").unwrap(), Some(json!({"v": 2})));
        assert!(store.put("statistics", &json!({"v": 3}), 3).unwrap());
        assert_eq!(store.get("statistics").unwrap(), Some(json!({"v": 3})));
    }

    #[test]
    fn test_sqlite_store_persists_across_connections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("store.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.put("settings", &json!({"opacity": 40}), 7).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("settings").unwrap(), Some(json!({"opacity": 40})));
        assert_eq!(store.high_water_mark().unwrap(), 7);
    }

    #[test]
    fn test_memory_store_ignores_stale_writes() {
        let mut store = MemoryStore::new();
        assert!(store.put("k", &json!(2), 2).unwrap());
        assert!(!store.put("k", &json!(1), 1).unwrap());
        assert_eq!(store.value("k"), Some(json!(2)));
        assert_eq!(store.write_count("k"), 1);
    }

    #[test]
    fn test_submit_does_not_touch_backend_until_flush() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(Box::new(store.clone()));
        persistence.submit("books", &vec!["a"]);
        assert_eq!(store.value("books"), None);
        assert_eq!(persistence.pending_len(), 1);
        assert_eq!(persistence.flush(), 1);
        assert_eq!(store.value("books"), Some(json!(["a"])));
        assert_eq!(persistence.pending_len(), 0);
    }

    #[test]
    fn test_flush_coalesces_to_last_submitted() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(Box::new(store.clone()));
        let first = persistence.submit("readingProgress", &1).unwrap();
        persistence.submit("books", &"x");
        let last = persistence.submit("readingProgress", &3).unwrap();
        assert!(last > first);
        assert_eq!(persistence.flush(), 2);
        assert_eq!(store.value("readingProgress"), Some(json!(3)));
        assert_eq!(store.write_count("readingProgress"), 1);
    }

    #[test]
    fn test_load_sees_queued_writes() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(Box::new(store));
        assert_eq!(persistence.load::<u32>("n"), None);
        persistence.submit("n", &5u32);
        assert_eq!(persistence.load::<u32>("n"), Some(5));
    }

    #[test]
    fn test_sequence_resumes_after_restart() {
        let mut store = MemoryStore::new();
        store.put("k", &json!(1), 41).unwrap();
        let mut persistence = Persistence::new(Box::new(store.clone()));
        assert_eq!(persistence.submit("k", &2), Some(42));
        persistence.flush();
        assert_eq!(store.value("k"), Some(json!(2)));
    }

    #[test]
    fn test_failures_are_not_fatal() {
        let store = MemoryStore::new();
        let mut persistence = Persistence::new(Box::new(store.clone()));
        store.set_failing(true);
        persistence.submit("statistics", &1);
        assert_eq!(persistence.flush(), 0);
        assert_eq!(persistence.load::<u32>("statistics"), None);

        store.set_failing(false);
        persistence.submit("statistics", &2);
        assert_eq!(persistence.flush(), 1);
        assert_eq!(store.value("statistics"), Some(json!(2)));
    }

    #[test]
    fn test_malformed_record_loads_as_absent() {
        let mut store = MemoryStore::new();
        store.put("statistics", &json!("not a record"), 1).unwrap();
        let persistence = Persistence::new(Box::new(store));
        assert_eq!(persistence.load::<crate::models::Statistics>("statistics"), None);
    }
}
