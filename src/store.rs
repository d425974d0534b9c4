//! Persistence for the prediction memory.
//!
//! [`Store`] is the raw blob capability (`get`/`set`/`delete`); [`MemoryStore`] layers the
//! load/save policy on top: primary backend first, silent fallback second, and a fresh
//! memory whenever nothing readable exists. Writes are whole-blob, last writer wins.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{BackendKind, EngineConfig};
use crate::http_client::http_client;
use crate::memory::{Memory, upgrade};
use crate::weights::WeightVector;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("kv request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("kv service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub trait Store: Send + Sync {
    fn name(&self) -> &'static str;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, blob: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// REST key-value service speaking the Upstash / Vercel KV protocol.
pub struct KvStore {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl KvStore {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Option<Self> {
        let (url, token) = cfg.kv_url.as_ref().zip(cfg.kv_token.as_ref())?;
        let client = match http_client() {
            Ok(client) => client.clone(),
            Err(err) => {
                warn!(error = %err, "kv store disabled");
                return None;
            }
        };
        Some(Self::new(client, url.clone(), token.clone()))
    }

    fn command_url(&self, command: &str, key: &str) -> Result<reqwest::Url, StoreError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| StoreError::Unavailable {
            backend: "kv",
            reason: format!("bad url {}: {e}", self.base_url),
        })?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable {
                backend: "kv",
                reason: format!("url cannot carry a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend([command, key]);
        Ok(url)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<KvResponse, StoreError> {
        let resp = req
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(StoreError::Status { status, body });
        }
        let parsed: KvResponse = serde_json::from_str(&body)?;
        if let Some(reason) = parsed.error.clone() {
            return Err(StoreError::Unavailable {
                backend: "kv",
                reason,
            });
        }
        Ok(parsed)
    }
}

impl Store for KvStore {
    fn name(&self) -> &'static str {
        "kv"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = self.command_url("get", key)?;
        let parsed = self.send(self.client.get(url))?;
        Ok(match parsed.result {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            // Some clients store the object itself rather than its serialization.
            Some(other) => Some(other.to_string()),
        })
    }

    fn set(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let url = self.command_url("set", key)?;
        self.send(self.client.post(url).body(blob.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let url = self.command_url("del", key)?;
        self.send(self.client.post(url))?;
        Ok(())
    }
}

/// One blob in one JSON file. Writes go to a sibling temp file and are renamed over
/// the target so readers never see a partial write.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Store for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_err(err)),
        }
    }

    fn set(&self, _key: &str, blob: &str) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_err(err)),
        }
    }
}

/// Local key-value table in SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let guard = self.conn.lock().map_err(|_| StoreError::Unavailable {
            backend: "sqlite",
            reason: "connection lock poisoned".to_string(),
        })?;
        Ok(f(&guard)?)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
}

impl Store for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
        })
    }

    fn set(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
                params![key, blob, now],
            )
            .map(|_| ())
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv WHERE key = ?1", params![key]).map(|_| ()))
    }
}

/// Process-local map. `offline()` builds one that fails every call, for exercising
/// fallback paths.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
    offline: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable {
                backend: "memory",
                reason: "offline".to_string(),
            });
        }
        self.entries.lock().map_err(|_| StoreError::Unavailable {
            backend: "memory",
            reason: "lock poisoned".to_string(),
        })
    }
}

impl Store for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Load/save policy over an ordered pair of backends.
pub struct MemoryStore {
    primary: Option<Box<dyn Store>>,
    fallback: Box<dyn Store>,
    key: String,
    defaults: WeightVector,
}

impl MemoryStore {
    pub fn new(
        primary: Option<Box<dyn Store>>,
        fallback: Box<dyn Store>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            key: key.into(),
            defaults: WeightVector::core_defaults(),
        }
    }

    /// Single backend, no fallback beyond a fresh memory.
    pub fn single(store: impl Store + 'static, key: impl Into<String>) -> Self {
        Self::new(None, Box::new(store), key)
    }

    /// Weights a fresh or unrepairable memory starts from.
    pub fn with_defaults(mut self, defaults: WeightVector) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        let file: Box<dyn Store> = Box::new(FileStore::new(&cfg.memory_file));
        let primary: Option<Box<dyn Store>> = match cfg.backend {
            BackendKind::File => None,
            BackendKind::Auto | BackendKind::Kv => {
                let kv = KvStore::from_config(cfg).map(|s| Box::new(s) as Box<dyn Store>);
                if kv.is_none() && cfg.backend == BackendKind::Kv {
                    warn!("MEMORY_BACKEND=kv but KV_REST_API_URL/KV_REST_API_TOKEN are not set");
                }
                kv
            }
            BackendKind::Sqlite => match SqliteStore::open(&cfg.memory_db) {
                Ok(s) => Some(Box::new(s)),
                Err(err) => {
                    warn!(error = %err, path = %cfg.memory_db.display(), "sqlite store unavailable");
                    None
                }
            },
        };
        let store = Self::new(primary, file, cfg.memory_key.clone())
            .with_defaults(cfg.factor_set.default_weights());
        info!(backends = ?store.backends(), key = %store.key, "memory store ready");
        store
    }

    pub fn backends(&self) -> Vec<&'static str> {
        self.chain().map(|s| s.name()).collect()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn defaults(&self) -> &WeightVector {
        &self.defaults
    }

    fn chain(&self) -> impl Iterator<Item = &(dyn Store + 'static)> {
        self.primary
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.fallback.as_ref()))
    }

    /// First readable memory along the chain, upgraded to the current schema.
    /// Never fails: unreadable or corrupt data yields a fresh memory.
    pub fn load(&self) -> Memory {
        for store in self.chain() {
            match store.get(&self.key) {
                Ok(Some(blob)) => match serde_json::from_str::<Memory>(&blob) {
                    Ok(memory) => {
                        debug!(backend = store.name(), "loaded prediction memory");
                        return upgrade(memory, &self.defaults);
                    }
                    Err(err) => {
                        warn!(backend = store.name(), error = %err, "stored memory is malformed");
                    }
                },
                Ok(None) => debug!(backend = store.name(), "no stored memory"),
                Err(err) => warn!(backend = store.name(), error = %err, "memory read failed"),
            }
        }
        Memory::fresh(&self.defaults)
    }

    /// Writes to the first backend that accepts the blob.
    pub fn save(&self, memory: &Memory) -> bool {
        let blob = match serde_json::to_string(memory) {
            Ok(blob) => blob,
            Err(err) => {
                error!(error = %err, "failed to serialize memory");
                return false;
            }
        };
        for store in self.chain() {
            match store.set(&self.key, &blob) {
                Ok(()) => {
                    debug!(backend = store.name(), bytes = blob.len(), "saved prediction memory");
                    return true;
                }
                Err(err) => warn!(backend = store.name(), error = %err, "memory write failed"),
            }
        }
        error!("prediction memory not persisted: every backend failed");
        false
    }

    /// Replaces the whole memory with a fresh one in a single write.
    pub fn reset(&self) -> bool {
        info!(key = %self.key, "resetting prediction memory");
        self.save(&Memory::fresh(&self.defaults))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_urls_put_command_and_key_in_path() {
        let kv = KvStore::new(Client::new(), "https://kv.example.com/", "t");
        let url = kv.command_url("get", "prediction memory").unwrap();
        assert_eq!(url.as_str(), "https://kv.example.com/get/prediction%20memory");
    }

    #[test]
    fn offline_store_errors() {
        let s = InMemoryStore::offline();
        assert!(s.get("k").is_err());
        assert!(s.set("k", "v").is_err());
    }

    #[test]
    fn sqlite_round_trip_and_delete() {
        let s = SqliteStore::open_in_memory().unwrap();
        assert_eq!(s.get("k").unwrap(), None);
        s.set("k", "v1").unwrap();
        s.set("k", "v2").unwrap();
        assert_eq!(s.get("k").unwrap().as_deref(), Some("v2"));
        s.delete("k").unwrap();
        assert_eq!(s.get("k").unwrap(), None);
    }

    #[test]
    fn save_falls_back_when_primary_is_down() {
        let store = MemoryStore::new(
            Some(Box::new(InMemoryStore::offline())),
            Box::new(InMemoryStore::new()),
            "mem",
        );
        let mut m = Memory::default();
        m.patterns.push("x".to_string());
        assert!(store.save(&m));
        assert_eq!(store.load().patterns, vec!["x".to_string()]);
    }

    #[test]
    fn load_survives_corrupt_blob() {
        let backing = InMemoryStore::new();
        backing.set("mem", "{not json").unwrap();
        let store = MemoryStore::single(backing, "mem");
        let m = store.load();
        assert!(m.predictions.is_empty());
        assert_eq!(m.learned_weights, WeightVector::core_defaults());
    }
}
