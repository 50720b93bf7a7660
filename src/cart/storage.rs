//! Cart Persistence
//!
//! Durable key-value storage for carts and the adapter that (de)serializes
//! line items into it. Persistence is best-effort: load problems degrade to
//! an empty cart and save problems are logged, never propagated.

use super::models::CartLineItem;
use dashmap::DashMap;
use std::{
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Storage key holding a cart when no session scoping is applied
pub const CART_STORAGE_KEY: &str = "cart";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid storage key \"{0}\"")]
    InvalidKey(String),

    #[error("storage writer has stopped")]
    WriterStopped,
}

// =============================================================================
// Key-Value Storage
// =============================================================================

/// Minimal string key-value store in the shape of browser local storage.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local storage; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Stores each key as `<root>/<key>.json`.
///
/// Every call is blocking file I/O. The server wraps it in a
/// [`WriteBehindStorage`] so request handlers never wait on a write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Creates the root directory if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Readers only ever see a complete file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|source| StorageError::Io {
                key: key.to_owned(),
                source,
            })
    }
}

// =============================================================================
// Write-Behind Storage
// =============================================================================

enum WriteOp {
    Set { key: String, seq: u64, value: String },
    Flush(oneshot::Sender<()>),
}

/// Queues writes to `inner` on a dedicated writer thread.
///
/// `set` returns as soon as the value is queued. `get` answers from the
/// queue while a write for that key is pending, so callers always read
/// their own writes, including ones `inner` failed to store. Writes reach
/// `inner` in the order they were queued; callers serialize writes to a
/// single key.
pub struct WriteBehindStorage {
    inner: Arc<dyn KeyValueStorage>,
    pending: Arc<DashMap<String, (u64, String)>>,
    next_seq: AtomicU64,
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehindStorage {
    /// Starts the writer thread. It exits once this handle is dropped and
    /// the queue has drained.
    pub fn spawn(inner: Arc<dyn KeyValueStorage>) -> Result<Self, StorageError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let pending: Arc<DashMap<String, (u64, String)>> = Arc::new(DashMap::new());

        let writer_inner = Arc::clone(&inner);
        let writer_pending = Arc::clone(&pending);
        std::thread::Builder::new()
            .name("cart-writer".into())
            .spawn(move || {
                while let Some(op) = rx.blocking_recv() {
                    match op {
                        WriteOp::Set { key, seq, value } => match writer_inner.set(&key, &value) {
                            Ok(()) => {
                                writer_pending.remove_if(&key, |_, (queued, _)| *queued == seq);
                            }
                            // The value stays pending so reads keep seeing it.
                            Err(e) => {
                                tracing::warn!(key = %key, error = %e, "failed to persist cart");
                            }
                        },
                        WriteOp::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            })
            .map_err(|source| StorageError::Io {
                key: "cart-writer".to_owned(),
                source,
            })?;

        Ok(Self {
            inner,
            pending,
            next_seq: AtomicU64::new(0),
            tx,
        })
    }

    /// Waits until every write queued before this call has reached `inner`.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(WriteOp::Flush(done))
            .map_err(|_| StorageError::WriterStopped)?;
        wait.await.map_err(|_| StorageError::WriterStopped)
    }
}

impl KeyValueStorage for WriteBehindStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(entry) = self.pending.get(key) {
            return Ok(Some(entry.1.clone()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.pending.insert(key.to_owned(), (seq, value.to_owned()));
        self.tx
            .send(WriteOp::Set {
                key: key.to_owned(),
                seq,
                value: value.to_owned(),
            })
            .map_err(|_| StorageError::WriterStopped)
    }
}

// =============================================================================
// Cart Persistence Adapter
// =============================================================================

/// Binds a storage backend to the key a single cart lives under.
#[derive(Clone)]
pub struct CartPersistence {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl std::fmt::Debug for CartPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl CartPersistence {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Persistence for one browser session's cart (`cart.<session_id>`).
    pub fn for_session(storage: Arc<dyn KeyValueStorage>, session_id: &str) -> Self {
        Self::new(storage, format!("{CART_STORAGE_KEY}.{session_id}"))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the persisted items. Missing, unreadable or malformed data is an
    /// empty cart.
    pub fn load(&self) -> Vec<CartLineItem> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "cart storage unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<CartLineItem>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "discarding malformed persisted cart");
                Vec::new()
            }
        }
    }

    /// Writes the items as a JSON array. Failures are logged and dropped.
    pub fn save(&self, items: &[CartLineItem]) {
        let encoded = match serde_json::to_string(items) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to encode cart");
                return;
            }
        };

        if let Err(e) = self.storage.set(&self.key, &encoded) {
            tracing::warn!(key = %self.key, error = %e, "failed to persist cart");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::InvalidKey(key.to_owned()))
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: key.to_owned(),
                source: io::Error::new(io::ErrorKind::Other, "quota exceeded"),
            })
        }
    }

    fn sample_items() -> Vec<CartLineItem> {
        vec![
            CartLineItem::new(1, "Mug", Decimal::new(12_500, 0), 2),
            CartLineItem::new(2, "Shirt", Decimal::new(4_999, 2), 1)
                .with_color(5, "Blue")
                .with_variant(8, "L"),
        ]
    }

    #[test]
    fn missing_key_loads_empty() {
        let persistence = CartPersistence::new(Arc::new(MemoryStorage::new()), CART_STORAGE_KEY);

        assert!(persistence.load().is_empty());
    }

    #[test]
    fn malformed_json_loads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CART_STORAGE_KEY, "{not json").unwrap();
        let persistence = CartPersistence::new(storage, CART_STORAGE_KEY);

        assert!(persistence.load().is_empty());
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let persistence = CartPersistence::new(Arc::new(MemoryStorage::new()), CART_STORAGE_KEY);
        let items = sample_items();

        persistence.save(&items);

        assert_eq!(persistence.load(), items);
    }

    #[test]
    fn broken_storage_is_swallowed() {
        let persistence = CartPersistence::new(Arc::new(BrokenStorage), CART_STORAGE_KEY);

        persistence.save(&sample_items());
        assert!(persistence.load().is_empty());
    }

    #[test]
    fn session_key_is_scoped() {
        let persistence = CartPersistence::for_session(Arc::new(MemoryStorage::new()), "abc123");

        assert_eq!(persistence.key(), "cart.abc123");
    }

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("carts");
        let storage = FileStorage::open(&root).unwrap();

        assert_eq!(storage.get("cart").unwrap(), None);
        storage.set("cart", "[]").unwrap();
        assert_eq!(storage.get("cart").unwrap().as_deref(), Some("[]"));
        assert!(root.join("cart.json").exists());
    }

    #[tokio::test]
    async fn write_behind_reads_its_own_writes_and_flushes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(FileStorage::open(dir.path()).unwrap());
        let storage = WriteBehindStorage::spawn(Arc::clone(&file) as Arc<dyn KeyValueStorage>).unwrap();

        storage.set("cart.s1", "[1]").unwrap();
        storage.set("cart.s1", "[2]").unwrap();
        storage.set("cart.s1", "[1]").unwrap();
        assert_eq!(storage.get("cart.s1").unwrap().as_deref(), Some("[1]"));

        storage.flush().await.unwrap();

        assert_eq!(file.get("cart.s1").unwrap().as_deref(), Some("[1]"));
        assert!(storage.pending.is_empty());
        assert!(dir.path().join("cart.s1.json").exists());
    }

    #[tokio::test]
    async fn write_behind_failures_are_logged_not_returned() {
        let storage = Arc::new(WriteBehindStorage::spawn(Arc::new(BrokenStorage)).unwrap());
        let persistence = CartPersistence::new(Arc::clone(&storage) as Arc<dyn KeyValueStorage>, CART_STORAGE_KEY);

        persistence.save(&sample_items());
        storage.flush().await.unwrap();

        assert_eq!(persistence.load(), sample_items());
    }

    #[test]
    fn file_storage_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert!(matches!(
            storage.set("../escape", "[]"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(storage.get("a/b"), Err(StorageError::InvalidKey(_))));
    }
}
