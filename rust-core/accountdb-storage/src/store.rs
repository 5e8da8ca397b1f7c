// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transactional record store.
//
// # Design
//
// - One redb `Database` file, one bucket (table), opened once per process.
// - Every operation runs in its own transaction on the blocking pool. There
//   is no atomicity across calls.
// - Reads use read transactions: MVCC snapshots that never wait on writers.
// - Writes first take the store's write gate, bounded by `lock_timeout`,
//   then run a redb write transaction while still holding it. A timeout
//   means nothing was written.
// - A write transaction that is dropped without `commit()` aborts, so every
//   early `?` return rolls back.

use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, TableError, WriteTransaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::bucket::{self, Bucket};
use crate::codec;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::key::key_of;
use crate::record::{User, UserId};

/// The record store: CRUD over [`User`] records in a redb bucket.
///
/// Cloning is cheap and every clone shares the same database handle, so one
/// store opened at startup can be handed to every request handler.
///
/// # Example
///
/// ```rust,no_run
/// use accountdb_storage::{RecordStore, StoreConfig, User, UserId};
///
/// # tokio_test::block_on(async {
/// let store = RecordStore::open(StoreConfig::at("/tmp/accountdb-doc.redb")).unwrap();
/// store.put(&User::new(7, "Ann", "Lee", "ann@example.com")).await.unwrap();
/// let ann = store.get_by_id(UserId(7)).await.unwrap();
/// assert_eq!(ann.first_name, "Ann");
/// # });
/// ```
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
    bucket: Bucket,
    write_gate: Arc<Mutex<()>>,
    lock_timeout: Duration,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("bucket", &self.bucket.name())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl RecordStore {
    /// Open (or create) the database file and initialize the bucket.
    ///
    /// Fails if the file cannot be opened, including when this process
    /// already holds it open, or if the bucket cannot be set up.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Engine(redb::Error::Io(e)))?;
        }

        let db = Database::create(&config.path)?;
        info!(path = %config.path.display(), "opened database");

        let bucket = bucket::initialize(&db, &config.bucket, config.startup)?;

        Ok(Self {
            db: Arc::new(db),
            bucket,
            write_gate: Arc::new(Mutex::new(())),
            lock_timeout: config.lock_timeout,
        })
    }

    /// The bucket this store reads and writes.
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Insert or overwrite the record stored under `user.id`.
    ///
    /// Used for add, update and replace alike: writing an id that already
    /// exists replaces the previous record without error.
    #[instrument(skip(self, user), fields(id = %user.id))]
    pub async fn put(&self, user: &User) -> Result<(), StoreError> {
        let key = key_of(user.id);
        let bytes = codec::encode(user)?;

        self.write(move |txn, bucket| {
            let mut table = txn.open_table(bucket.definition())?;
            table.insert(key.as_str(), bytes.as_slice())?;
            debug!(key = %key, size = bytes.len(), "put");
            Ok(())
        })
        .await
    }

    /// Fetch the record stored under `id`.
    ///
    /// [`StoreError::NotFound`] if absent, [`StoreError::Codec`] if the stored
    /// bytes do not decode.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.read(move |txn, bucket| lookup(txn, bucket, id)).await
    }

    /// Fetch several records, each in its own read transaction.
    ///
    /// Ids are looked up in the given order and duplicates are looked up
    /// again. See [`best_effort_lookup`] for which failures drop an id and
    /// which abort the call.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn get_many_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let ids = ids.to_vec();
        self.blocking(move |db, bucket| {
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(user) = best_effort_lookup(db, bucket, id)? {
                    found.push(user);
                }
            }
            debug!(found = found.len(), "get_many_by_ids");
            Ok(found)
        })
        .await
    }

    /// Every record in the bucket, in ascending key order.
    ///
    /// Keys are decimal strings, so the order is lexicographic: id 10 comes
    /// before id 2.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<User>, StoreError> {
        self.read(|txn, bucket| {
            let table = open_read_table(txn, bucket)?;
            let mut users = Vec::new();
            for entry in table.iter()? {
                let (_key, value) = entry?;
                users.push(codec::decode(value.value())?);
            }
            debug!(count = users.len(), "get_all");
            Ok(users)
        })
        .await
    }

    /// Remove the record stored under `id`. Removing an absent id succeeds.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: UserId) -> Result<(), StoreError> {
        let key = key_of(id);
        self.write(move |txn, bucket| {
            let mut table = txn.open_table(bucket.definition())?;
            let existed = table.remove(key.as_str())?.is_some();
            debug!(key = %key, existed, "delete");
            Ok(())
        })
        .await
    }

    /// Run `op` in a read transaction on the blocking pool.
    async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&ReadTransaction, &Bucket) -> Result<T, StoreError> + Send + 'static,
    {
        self.blocking(move |db, bucket| {
            let txn = db.begin_read()?;
            op(&txn, bucket)
        })
        .await
    }

    /// Run `op` in a write transaction on the blocking pool, committing only
    /// if it returns `Ok`.
    async fn write<F>(&self, op: F) -> Result<(), StoreError>
    where
        F: FnOnce(&WriteTransaction, &Bucket) -> Result<(), StoreError> + Send + 'static,
    {
        let gate = self.acquire_write_gate().await?;
        self.blocking(move |db, bucket| {
            let _gate = gate;
            let txn = db.begin_write()?;
            op(&txn, bucket)?;
            txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn acquire_write_gate(&self) -> Result<OwnedMutexGuard<()>, StoreError> {
        let gate = Arc::clone(&self.write_gate);
        tokio::time::timeout(self.lock_timeout, gate.lock_owned())
            .await
            .map_err(|_| {
                warn!(timeout = ?self.lock_timeout, "write lock timed out");
                StoreError::LockTimeout {
                    timeout: self.lock_timeout,
                }
            })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &Bucket) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let bucket = self.bucket.clone();
        tokio::task::spawn_blocking(move || op(&db, &bucket))
            .await
            .map_err(|e| {
                StoreError::Engine(redb::Error::Io(std::io::Error::other(format!("task join: {e}"))))
            })?
    }
}

/// Look up one id for a batch read.
///
/// Opening the read transaction is the only failure that aborts the batch.
/// Anything that goes wrong after that (absent key, undecodable bytes, a
/// lookup error) drops the id from the result.
pub fn best_effort_lookup(
    db: &Database,
    bucket: &Bucket,
    id: UserId,
) -> Result<Option<User>, StoreError> {
    let txn = db.begin_read()?;
    match lookup(&txn, bucket, id) {
        Ok(user) => Ok(Some(user)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(err) => {
            warn!(%id, error = %err, "omitting id from batch read");
            Ok(None)
        }
    }
}

fn lookup(txn: &ReadTransaction, bucket: &Bucket, id: UserId) -> Result<User, StoreError> {
    let table = open_read_table(txn, bucket)?;
    let key = key_of(id);
    match table.get(key.as_str())? {
        Some(value) => codec::decode(value.value()),
        None => Err(StoreError::NotFound { id }),
    }
}

fn open_read_table(
    txn: &ReadTransaction,
    bucket: &Bucket,
) -> Result<redb::ReadOnlyTable<&'static str, &'static [u8]>, StoreError> {
    match txn.open_table(bucket.definition()) {
        Ok(table) => Ok(table),
        Err(TableError::TableDoesNotExist(_)) => {
            Err(StoreError::BucketMissing(bucket.name().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartupPolicy;
    use tempfile::tempdir;

    fn temp_store() -> (RecordStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(StoreConfig::at(dir.path().join("test.redb"))).unwrap();
        (store, dir)
    }

    fn user(id: u64, first: &str) -> User {
        User::new(id, first, "Tester", format!("{}@example.com", first.to_lowercase()))
    }

    /// Write raw bytes under a key, bypassing the codec.
    fn put_raw(store: &RecordStore, key: &str, bytes: &[u8]) {
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(store.bucket.definition()).unwrap();
            table.insert(key, bytes).unwrap();
        }
        txn.commit().unwrap();
    }

    #[tokio::test]
    async fn test_basic_crud() {
        let (store, _dir) = temp_store();
        let ann = user(7, "Ann");

        store.put(&ann).await.unwrap();
        assert_eq!(store.get_by_id(UserId(7)).await.unwrap(), ann);

        store.delete_by_id(UserId(7)).await.unwrap();
        let err = store.get_by_id(UserId(7)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: UserId(7) }));
    }

    #[tokio::test]
    async fn test_get_never_written_is_not_found() {
        let (store, _dir) = temp_store();
        assert!(store.get_by_id(UserId(1)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (store, _dir) = temp_store();
        store.put(&user(3, "Old")).await.unwrap();
        let replacement = user(3, "New").with_active(false);
        store.put(&replacement).await.unwrap();

        assert_eq!(store.get_by_id(UserId(3)).await.unwrap(), replacement);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_twice_is_idempotent() {
        let (store, _dir) = temp_store();
        let ann = user(7, "Ann");
        store.put(&ann).await.unwrap();
        let once = store.get_all().await.unwrap();
        store.put(&ann).await.unwrap();
        assert_eq!(store.get_all().await.unwrap(), once);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let (store, _dir) = temp_store();
        let one = user(1, "One");
        let three = user(3, "Three");
        store.put(&one).await.unwrap();
        store.put(&three).await.unwrap();

        let found = store
            .get_many_by_ids(&[UserId(1), UserId(2), UserId(3)])
            .await
            .unwrap();
        assert_eq!(found, vec![one, three]);
    }

    #[tokio::test]
    async fn test_get_many_keeps_request_order_and_duplicates() {
        let (store, _dir) = temp_store();
        let one = user(1, "One");
        let two = user(2, "Two");
        store.put(&one).await.unwrap();
        store.put(&two).await.unwrap();

        let found = store
            .get_many_by_ids(&[UserId(2), UserId(1), UserId(2)])
            .await
            .unwrap();
        assert_eq!(found, vec![two.clone(), one, two]);

        assert!(store.get_many_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_many_omits_undecodable_records() {
        let (store, _dir) = temp_store();
        let one = user(1, "One");
        store.put(&one).await.unwrap();
        put_raw(&store, "2", b"garbage");

        let found = store.get_many_by_ids(&[UserId(1), UserId(2)]).await.unwrap();
        assert_eq!(found, vec![one]);
    }

    #[tokio::test]
    async fn test_get_by_id_surfaces_codec_error() {
        let (store, _dir) = temp_store();
        put_raw(&store, "5", b"{\"id\": 5");
        let err = store.get_by_id(UserId(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }

    #[tokio::test]
    async fn test_get_all_is_lexicographic_by_key() {
        let (store, _dir) = temp_store();
        for id in [2u64, 10, 1, 100, 20] {
            store.put(&user(id, "U")).await.unwrap();
        }

        let ids: Vec<u64> = store.get_all().await.unwrap().iter().map(|u| u.id.0).collect();
        assert_eq!(ids, vec![1, 10, 100, 2, 20]);
    }

    #[tokio::test]
    async fn test_get_all_empty() {
        let (store, _dir) = temp_store();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _dir) = temp_store();
        store.put(&user(4, "Four")).await.unwrap();
        store.delete_by_id(UserId(4)).await.unwrap();
        store.delete_by_id(UserId(4)).await.unwrap();
        store.delete_by_id(UserId(99)).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_times_out_when_gate_is_held() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::at(dir.path().join("gate.redb"))
            .with_lock_timeout(Duration::from_millis(50));
        let store = RecordStore::open(config).unwrap();

        let held = store.write_gate.clone().lock_owned().await;
        let err = store.put(&user(1, "Blocked")).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));

        // Reads do not need the gate.
        assert!(store.get_all().await.unwrap().is_empty());

        drop(held);
        store.put(&user(1, "Unblocked")).await.unwrap();
        assert_eq!(store.get_by_id(UserId(1)).await.unwrap().first_name, "Unblocked");
    }

    #[tokio::test]
    async fn test_missing_bucket_is_reported() {
        let (store, _dir) = temp_store();
        let txn = store.db.begin_write().unwrap();
        txn.delete_table(store.bucket.definition()).unwrap();
        txn.commit().unwrap();

        assert!(matches!(
            store.get_by_id(UserId(1)).await.unwrap_err(),
            StoreError::BucketMissing(_)
        ));
        assert!(matches!(
            store.get_all().await.unwrap_err(),
            StoreError::BucketMissing(_)
        ));
        // Batch reads treat it as a per-id lookup failure.
        assert!(store.get_many_by_ids(&[UserId(1)]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        let (store, _dir) = temp_store();
        let n = 32u64;

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.put(&user(i, "Par")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut ids: Vec<u64> = store.get_all().await.unwrap().iter().map(|u| u.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..n).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_reopen_with_reset_wipes_and_preserve_keeps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("restart.redb");

        {
            let store = RecordStore::open(StoreConfig::at(&path)).unwrap();
            store.put(&user(1, "Kept")).await.unwrap();
        }
        {
            let store = RecordStore::open(
                StoreConfig::at(&path).with_startup(StartupPolicy::Preserve),
            )
            .unwrap();
            assert_eq!(store.get_all().await.unwrap().len(), 1);
        }
        {
            let store = RecordStore::open(StoreConfig::at(&path)).unwrap();
            assert!(store.get_all().await.unwrap().is_empty());
        }
    }
}
