//! Namespaced key-value store with compare-and-swap.
//!
//! Every key lives in a namespace; the proposal store uses `proposals`.
//! Namespaces and keys must be non-empty and free of NUL bytes, since NUL
//! separates them in the persistent backend's key space.
//!
//! [`ScopedKvStore`] binds a namespace once and adds JSON helpers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{StorageError, StorageResult};

fn check_part(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{kind} must not be empty")));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{kind} must not contain NUL bytes"
        )));
    }
    Ok(())
}

fn check_key(namespace: &str, key: &str) -> StorageResult<()> {
    check_part("namespace", namespace)?;
    check_part("key", key)
}

/// Byte-level storage partitioned by namespace.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value at `namespace`/`key`, or `None` when absent.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write `value` unconditionally.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// All keys of a namespace in ascending byte order.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Atomically replace the value at `namespace`/`key` with `value` if the
    /// current value equals `expected` (`None` meaning "absent").
    ///
    /// Returns `false` without writing when the current value differs.
    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool>;
}

/// In-process store, one ordered map per namespace.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_map(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, BTreeMap<String, Vec<u8>>>> {
        self.namespaces.read().unwrap_or_else(|e| {
            warn!("MemoryKvStore lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write_map(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, BTreeMap<String, Vec<u8>>>> {
        self.namespaces.write().unwrap_or_else(|e| {
            warn!("MemoryKvStore lock poisoned, recovering");
            e.into_inner()
        })
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_key(namespace, key)?;
        Ok(self
            .read_map()
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_key(namespace, key)?;
        self.write_map()
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        check_key(namespace, key)?;
        Ok(self
            .write_map()
            .get_mut(namespace)
            .and_then(|entries| entries.remove(key))
            .is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_part("namespace", namespace)?;
        Ok(self
            .read_map()
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        check_key(namespace, key)?;
        let mut map = self.write_map();
        let entries = map.entry(namespace.to_owned()).or_default();
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        entries.insert(key.to_owned(), value);
        Ok(true)
    }
}

/// Persistent store backed by an embedded `SurrealKV` tree.
///
/// Keys are stored as `namespace NUL key`. Writers are serialized through an
/// async mutex so that a compare-and-swap reads and commits without another
/// writer in between.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
    writer: tokio::sync::Mutex<()>,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
fn encode_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut out = namespace_prefix(namespace);
    out.extend_from_slice(key.as_bytes());
    out
}

#[cfg(feature = "kv")]
fn namespace_prefix(namespace: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(namespace.len().saturating_add(1));
    out.extend_from_slice(namespace.as_bytes());
    out.push(0);
    out
}

#[cfg(feature = "kv")]
fn backend_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the tree cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self {
            tree,
            writer: tokio::sync::Mutex::new(()),
        })
    }

    /// Flush and close the tree.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree.close().await.map_err(|ref e| backend_err(e))
    }
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_key(namespace, key)?;
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| backend_err(e))?;
        tx.get(&encode_key(namespace, key))
            .map_err(|ref e| backend_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_key(namespace, key)?;
        let _writer = self.writer.lock().await;
        let mut tx = self.tree.begin().map_err(|ref e| backend_err(e))?;
        tx.set(&encode_key(namespace, key), &value)
            .map_err(|ref e| backend_err(e))?;
        tx.commit().await.map_err(|ref e| backend_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        check_key(namespace, key)?;
        let encoded = encode_key(namespace, key);
        let _writer = self.writer.lock().await;
        let mut tx = self.tree.begin().map_err(|ref e| backend_err(e))?;
        if tx.get(&encoded).map_err(|ref e| backend_err(e))?.is_none() {
            return Ok(false);
        }
        tx.delete(&encoded).map_err(|ref e| backend_err(e))?;
        tx.commit().await.map_err(|ref e| backend_err(e))?;
        Ok(true)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_part("namespace", namespace)?;
        let start = namespace_prefix(namespace);
        // NUL is the separator, so byte 1 bounds the namespace range.
        let mut end = namespace.as_bytes().to_vec();
        end.push(1);

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| backend_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| backend_err(e))?;
        iter.seek_first().map_err(|ref e| backend_err(e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw = iter.key();
            if let Some(rest) = raw.get(start.len()..)
                && let Ok(key) = std::str::from_utf8(rest)
                && !key.is_empty()
            {
                keys.push(key.to_owned());
            }
            iter.next().map_err(|ref e| backend_err(e))?;
        }
        Ok(keys)
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        check_key(namespace, key)?;
        let encoded = encode_key(namespace, key);
        let _writer = self.writer.lock().await;
        let mut tx = self.tree.begin().map_err(|ref e| backend_err(e))?;
        let current = tx.get(&encoded).map_err(|ref e| backend_err(e))?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        tx.set(&encoded, &value).map_err(|ref e| backend_err(e))?;
        tx.commit().await.map_err(|ref e| backend_err(e))?;
        Ok(true)
    }
}

/// A [`KvStore`] view with its namespace bound.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Bind `namespace` on `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty or NUL-containing
    /// namespace.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        check_part("namespace", &namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Raw bytes at `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Write raw bytes at `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    /// Keys of the bound namespace.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }

    /// See [`KvStore::compare_and_swap`].
    ///
    /// # Errors
    ///
    /// Propagates backend and key validation errors.
    pub async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        self.inner
            .compare_and_swap(&self.namespace, key, expected, value)
            .await
    }

    /// Decode the JSON value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored bytes are not a
    /// valid `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => decode_json(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and write it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.set(key, encode_json(value)?).await
    }
}

/// Encode a value as JSON bytes.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if encoding fails.
pub fn encode_json<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode JSON bytes into a value.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the bytes are not a valid `T`.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_set_get_delete() {
        let store = MemoryKvStore::new();
        assert!(store.get("ns", "k").await.unwrap().is_none());
        store.set("ns", "k", b"v1".to_vec()).await.unwrap();
        store.set("ns", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));
        assert!(store.delete("ns", "k").await.unwrap());
        assert!(!store.delete("ns", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_namespaces_are_isolated() {
        let store = MemoryKvStore::new();
        store.set("a", "k", b"1".to_vec()).await.unwrap();
        store.set("b", "k", b"2".to_vec()).await.unwrap();
        store.set("a", "j", b"3".to_vec()).await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.list_keys("a").await.unwrap(), vec!["j", "k"]);
        assert!(store.list_keys("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_compare_and_swap() {
        let store = MemoryKvStore::new();
        // Insert-if-absent.
        assert!(store.compare_and_swap("ns", "k", None, b"a".to_vec()).await.unwrap());
        assert!(!store.compare_and_swap("ns", "k", None, b"b".to_vec()).await.unwrap());

        assert!(
            !store
                .compare_and_swap("ns", "k", Some(b"stale".as_slice()), b"c".to_vec())
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_swap("ns", "k", Some(b"a".as_slice()), b"d".to_vec())
                .await
                .unwrap()
        );
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"d".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_compare_and_swap_single_winner() {
        let store = Arc::new(MemoryKvStore::new());
        store.set("ns", "k", b"pending".to_vec()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap("ns", "k", Some(b"pending".as_slice()), vec![i])
                    .await
                    .unwrap()
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert_eq!(results.iter().filter(|won| **won).count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let store = MemoryKvStore::new();
        assert!(matches!(
            store.get("", "k").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.set("ns", "a\0b", Vec::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "").is_err());
    }

    #[tokio::test]
    async fn test_scoped_json() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Record {
            status: String,
        }

        let scoped = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "proposals").unwrap();
        assert_eq!(scoped.namespace(), "proposals");
        let record = Record {
            status: "pending".to_owned(),
        };
        scoped.set_json("p1", &record).await.unwrap();
        assert_eq!(scoped.get_json::<Record>("p1").await.unwrap(), Some(record));
        assert!(scoped.get_json::<Record>("p2").await.unwrap().is_none());

        scoped.set("bad", b"not json".to_vec()).await.unwrap();
        assert!(matches!(
            scoped.get_json::<Record>("bad").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StorageError::Connection("x".into()).is_transient());
        assert!(StorageError::Internal("x".into()).is_transient());
        assert!(!StorageError::Serialization("x".into()).is_transient());
        assert!(!StorageError::InvalidKey("x".into()).is_transient());
    }

    #[cfg(feature = "kv")]
    mod surreal {
        use super::*;

        fn open() -> (SurrealKvStore, tempfile::TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let store = SurrealKvStore::open(dir.path()).unwrap();
            (store, dir)
        }

        #[tokio::test]
        async fn test_surreal_roundtrip_and_list() {
            let (store, _dir) = open();
            store.set("proposals", "b", b"2".to_vec()).await.unwrap();
            store.set("proposals", "a", b"1".to_vec()).await.unwrap();
            store.set("other", "c", b"3".to_vec()).await.unwrap();
            assert_eq!(store.get("proposals", "a").await.unwrap(), Some(b"1".to_vec()));
            assert_eq!(store.list_keys("proposals").await.unwrap(), vec!["a", "b"]);
            assert!(store.delete("proposals", "a").await.unwrap());
            assert!(store.get("proposals", "a").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_surreal_compare_and_swap() {
            let (store, _dir) = open();
            assert!(store.compare_and_swap("ns", "k", None, b"a".to_vec()).await.unwrap());
            assert!(!store.compare_and_swap("ns", "k", None, b"b".to_vec()).await.unwrap());
            assert!(
                store
                    .compare_and_swap("ns", "k", Some(b"a".as_slice()), b"c".to_vec())
                    .await
                    .unwrap()
            );
            assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"c".to_vec()));
        }
    }
}
