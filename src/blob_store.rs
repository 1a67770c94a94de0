use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use savefile_derive::Savefile;

use crate::error::StoreError;

/// Schema version of the snapshot file itself. The cache format version
/// travels inside the snapshot and is compared on open.
const SNAPSHOT_SCHEMA_VERSION: u32 = 0;
const SNAPSHOT_EXTENSION: &str = "blob";
const JOURNAL_EXTENSION: &str = "journal";
const MIN_JOURNAL_ENTRIES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_entries: usize,
    pub max_bytes: u64,
    pub reset: bool,
    pub version: u32,
}

/// Handle to an opened store. Callers serialize access themselves.
pub trait BlobStore: Send {
    /// Copies the record for `key` into `buffer`, growing it if needed.
    fn lookup(&mut self, key: u64, buffer: &mut Vec<u8>) -> Result<bool, StoreError>;

    /// Inserts or overwrites the record for `key`. May evict older records.
    fn insert(&mut self, key: u64, data: &[u8]) -> Result<(), StoreError>;

    fn close(&mut self) -> Result<(), StoreError>;
}

pub trait BlobStoreProvider: Send + Sync {
    fn open(&self, path: &Path, options: &StoreOptions) -> Result<Box<dyn BlobStore>, StoreError>;

    /// Removes every persisted file whose path starts with `prefix`.
    fn delete_files(&self, prefix: &Path) -> Result<(), StoreError>;
}

/// Insertion-ordered records with a byte and entry budget. Oldest go first.
#[derive(Debug, Default)]
struct BoundedEntries {
    entries: IndexMap<u64, Vec<u8>>,
    total_bytes: u64,
}

impl BoundedEntries {
    fn get(&self, key: u64) -> Option<&Vec<u8>> {
        self.entries.get(&key)
    }

    fn insert(&mut self, key: u64, data: Vec<u8>, max_entries: usize, max_bytes: u64) {
        if let Some(old) = self.entries.shift_remove(&key) {
            self.total_bytes -= old.len() as u64;
        }
        self.total_bytes += data.len() as u64;
        self.entries.insert(key, data);

        while self.entries.len() > 1
            && (self.entries.len() > max_entries || self.total_bytes > max_bytes)
        {
            if let Some((evicted, data)) = self.entries.shift_remove_index(0) {
                debug!("Evicting record {:016x} ({} bytes)", evicted, data.len());
                self.total_bytes -= data.len() as u64;
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Savefile)]
struct StoredBlob {
    key: u64,
    data: Vec<u8>,
}

#[derive(Debug, Savefile)]
struct BlobSnapshot {
    version: u32,
    blobs: Vec<StoredBlob>,
}

/// One insert appended to the journal. Entries from another cache version are
/// skipped on replay.
#[derive(Debug, Savefile)]
struct JournalEntry {
    version: u32,
    key: u64,
    data: Vec<u8>,
}

/// Store files opened in this process, by snapshot path. Every handle on the
/// same path shares one set of records.
static OPEN_STORES: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<SharedStore>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Records of one store file. Inserts are appended to `<path>.journal` as
/// they happen and folded into `<path>.blob` on compaction.
struct SharedStore {
    path: PathBuf,
    journal_path: PathBuf,
    options: StoreOptions,
    entries: BoundedEntries,
    journal_entries: usize,
    handles: usize,
}

impl SharedStore {
    fn load(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        let snapshot_path = sibling_path(path, SNAPSHOT_EXTENSION);
        if let Some(parent) = snapshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut store = Self {
            path: snapshot_path,
            journal_path: sibling_path(path, JOURNAL_EXTENSION),
            options: *options,
            entries: BoundedEntries::default(),
            journal_entries: 0,
            handles: 0,
        };

        if options.reset {
            store.compact()?;
            return Ok(store);
        }

        let mut needs_compaction = !store.path.exists();
        if !needs_compaction {
            match savefile::load_file::<BlobSnapshot, _>(&store.path, SNAPSHOT_SCHEMA_VERSION) {
                Ok(snapshot) if snapshot.version == options.version => {
                    for blob in snapshot.blobs {
                        store.entries.insert(
                            blob.key,
                            blob.data,
                            options.max_entries,
                            options.max_bytes,
                        );
                    }
                }
                Ok(snapshot) => {
                    info!(
                        "Resetting blob store {}: version {} != {}",
                        store.path.display(),
                        snapshot.version,
                        options.version
                    );
                    needs_compaction = true;
                }
                Err(e) => {
                    warn!(
                        "Resetting unreadable blob store {}: {:?}",
                        store.path.display(),
                        e
                    );
                    needs_compaction = true;
                }
            }
        }

        if store.replay_journal()? {
            needs_compaction = true;
        }
        if needs_compaction {
            store.compact()?;
        }

        info!(
            "Opened blob store {} with {} records",
            store.path.display(),
            store.entries.len()
        );
        Ok(store)
    }

    /// Applies journal entries left by a session that never compacted.
    /// Returns whether a journal was found.
    fn replay_journal(&mut self) -> Result<bool, StoreError> {
        let file = match File::open(&self.journal_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut replayed = 0;
        while !reader.fill_buf()?.is_empty() {
            match savefile::load::<JournalEntry>(&mut reader, SNAPSHOT_SCHEMA_VERSION) {
                Ok(entry) if entry.version == self.options.version => {
                    self.entries.insert(
                        entry.key,
                        entry.data,
                        self.options.max_entries,
                        self.options.max_bytes,
                    );
                    replayed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Ignoring torn journal tail in {}: {:?}",
                        self.journal_path.display(),
                        e
                    );
                    break;
                }
            }
        }
        debug!(
            "Replayed {} journal entries from {}",
            replayed,
            self.journal_path.display()
        );
        Ok(true)
    }

    fn append(&mut self, key: u64, data: &[u8]) -> Result<(), StoreError> {
        let entry = JournalEntry {
            version: self.options.version,
            key,
            data: data.to_vec(),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)?;
        let mut writer = BufWriter::new(file);
        savefile::save(&mut writer, SNAPSHOT_SCHEMA_VERSION, &entry)?;
        writer.flush()?;

        self.entries.insert(
            key,
            entry.data,
            self.options.max_entries,
            self.options.max_bytes,
        );
        self.journal_entries += 1;

        // Keeps the journal no longer than the snapshot it sits on.
        if self.journal_entries >= self.entries.len().max(MIN_JOURNAL_ENTRIES) {
            self.compact()?;
        }
        Ok(())
    }

    /// Writes every record to a fresh snapshot, then drops the journal.
    fn compact(&mut self) -> Result<(), StoreError> {
        let snapshot = BlobSnapshot {
            version: self.options.version,
            blobs: self
                .entries
                .entries
                .iter()
                .map(|(key, data)| StoredBlob {
                    key: *key,
                    data: data.clone(),
                })
                .collect(),
        };

        let temp_path = self.path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));
        savefile::save_file(&temp_path, SNAPSHOT_SCHEMA_VERSION, &snapshot)?;
        std::fs::rename(&temp_path, &self.path)?;

        match std::fs::remove_file(&self.journal_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.journal_entries = 0;
        Ok(())
    }

    fn clear(&mut self) {
        self.entries = BoundedEntries::default();
        self.journal_entries = 0;
    }
}

/// Handle on a file-backed store. Handles opened on the same path in one
/// process share their records; the last one to close compacts the files.
pub struct FileBlobStore {
    shared: Arc<Mutex<SharedStore>>,
    closed: bool,
}

impl FileBlobStore {
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        let mut stores = OPEN_STORES.lock();
        let snapshot_path = sibling_path(path, SNAPSHOT_EXTENSION);

        let shared = match stores.get(&snapshot_path) {
            Some(shared) => {
                let mut store = shared.lock();
                if options.reset || options.version != store.options.version {
                    info!("Resetting open blob store {}", store.path.display());
                    store.options.version = options.version;
                    store.clear();
                    store.compact()?;
                }
                store.handles += 1;
                shared.clone()
            }
            None => {
                let mut store = SharedStore::load(path, options)?;
                store.handles = 1;
                let shared = Arc::new(Mutex::new(store));
                stores.insert(snapshot_path, shared.clone());
                shared
            }
        };

        Ok(Self {
            shared,
            closed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut stores = OPEN_STORES.lock();
        let mut store = self.shared.lock();
        store.handles -= 1;
        if store.handles > 0 {
            return Ok(());
        }

        if stores
            .get(&store.path)
            .is_some_and(|open| Arc::ptr_eq(open, &self.shared))
        {
            stores.remove(&store.path);
        }
        if store.journal_entries > 0 {
            store.compact()?;
        }
        debug!("Released blob store {}", store.path.display());
        Ok(())
    }
}

impl BlobStore for FileBlobStore {
    fn lookup(&mut self, key: u64, buffer: &mut Vec<u8>) -> Result<bool, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let store = self.shared.lock();
        match store.entries.get(key) {
            Some(data) => {
                buffer.clear();
                buffer.extend_from_slice(data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert(&mut self, key: u64, data: &[u8]) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let mut store = self.shared.lock();
        if data.len() as u64 > store.options.max_bytes {
            return Err(StoreError::TooLarge {
                size: data.len(),
                max_bytes: store.options.max_bytes,
            });
        }
        store.append(key, data)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.release()
    }
}

impl Drop for FileBlobStore {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release blob store: {:?}", e);
        }
    }
}

fn sibling_path(path: &Path, extension: &str) -> PathBuf {
    let mut file_name = path.file_name().unwrap_or_default().to_os_string();
    file_name.push(".");
    file_name.push(extension);
    path.with_file_name(file_name)
}

fn delete_matching(prefix: &Path) -> Result<(), StoreError> {
    let pattern = format!(
        "{}*",
        glob::Pattern::escape(&prefix.to_string_lossy())
    );

    // Stores still open in this process would write their records back.
    let prefix_str = prefix.to_string_lossy();
    for (path, shared) in OPEN_STORES.lock().iter() {
        if path.to_string_lossy().starts_with(prefix_str.as_ref()) {
            shared.lock().clear();
        }
    }

    // Unreadable entries are skipped, there is nothing to delete there.
    for entry in glob::glob(&pattern)?.flatten() {
        if entry.is_file() {
            info!("Deleting cache file {}", entry.display());
            std::fs::remove_file(&entry)?;
        }
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileBlobStoreProvider;

impl BlobStoreProvider for FileBlobStoreProvider {
    fn open(&self, path: &Path, options: &StoreOptions) -> Result<Box<dyn BlobStore>, StoreError> {
        Ok(Box::new(FileBlobStore::open(path, options)?))
    }

    fn delete_files(&self, prefix: &Path) -> Result<(), StoreError> {
        delete_matching(prefix)
    }
}

#[derive(Debug, Default)]
struct MemoryShared {
    entries: BoundedEntries,
    inserts: usize,
}

/// Non-persistent stores shared by path, so a reopen sees earlier inserts.
#[derive(Clone, Default)]
pub struct MemoryBlobStoreProvider {
    stores: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<MemoryShared>>>>>,
    fail_open: bool,
}

impl MemoryBlobStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose `open` always fails with an I/O error.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn record_count(&self, path: &Path) -> usize {
        self.stores
            .lock()
            .get(path)
            .map(|shared| shared.lock().entries.len())
            .unwrap_or(0)
    }

    pub fn insert_count(&self, path: &Path) -> usize {
        self.stores
            .lock()
            .get(path)
            .map(|shared| shared.lock().inserts)
            .unwrap_or(0)
    }

    pub fn record(&self, path: &Path, key: u64) -> Option<Vec<u8>> {
        self.stores
            .lock()
            .get(path)
            .and_then(|shared| shared.lock().entries.get(key).cloned())
    }

    /// Writes a record directly, bypassing any cache in front of the store.
    pub fn seed(&self, path: &Path, key: u64, data: Vec<u8>) {
        let shared = self.shared(path, false);
        shared.lock().entries.insert(key, data, usize::MAX, u64::MAX);
    }

    fn shared(&self, path: &Path, reset: bool) -> Arc<Mutex<MemoryShared>> {
        let mut stores = self.stores.lock();
        let shared = stores.entry(path.to_path_buf()).or_default().clone();
        if reset {
            *shared.lock() = MemoryShared::default();
        }
        shared
    }
}

struct MemoryBlobStore {
    shared: Arc<Mutex<MemoryShared>>,
    options: StoreOptions,
    closed: bool,
}

impl BlobStore for MemoryBlobStore {
    fn lookup(&mut self, key: u64, buffer: &mut Vec<u8>) -> Result<bool, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        let shared = self.shared.lock();
        match shared.entries.get(key) {
            Some(data) => {
                buffer.clear();
                buffer.extend_from_slice(data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert(&mut self, key: u64, data: &[u8]) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if data.len() as u64 > self.options.max_bytes {
            return Err(StoreError::TooLarge {
                size: data.len(),
                max_bytes: self.options.max_bytes,
            });
        }
        let mut shared = self.shared.lock();
        shared.entries.insert(
            key,
            data.to_vec(),
            self.options.max_entries,
            self.options.max_bytes,
        );
        shared.inserts += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}

impl BlobStoreProvider for MemoryBlobStoreProvider {
    fn open(&self, path: &Path, options: &StoreOptions) -> Result<Box<dyn BlobStore>, StoreError> {
        if self.fail_open {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("cannot open {}", path.display()),
            )));
        }
        Ok(Box::new(MemoryBlobStore {
            shared: self.shared(path, options.reset),
            options: *options,
            closed: false,
        }))
    }

    fn delete_files(&self, prefix: &Path) -> Result<(), StoreError> {
        let prefix = prefix.to_string_lossy().to_string();
        self.stores
            .lock()
            .retain(|path, _| !path.to_string_lossy().starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> StoreOptions {
        StoreOptions {
            max_entries: 3,
            max_bytes: 1024,
            reset: false,
            version: 7,
        }
    }

    #[test]
    fn test_bounded_entries_evicts_oldest_by_count() {
        let mut entries = BoundedEntries::default();
        for key in 0..5u64 {
            entries.insert(key, vec![key as u8; 4], 3, 1024);
        }
        assert_eq!(entries.len(), 3);
        assert!(entries.get(0).is_none());
        assert!(entries.get(1).is_none());
        assert!(entries.get(4).is_some());
        assert_eq!(entries.total_bytes, 12);
    }

    #[test]
    fn test_bounded_entries_evicts_by_bytes() {
        let mut entries = BoundedEntries::default();
        entries.insert(1, vec![0; 400], 10, 1000);
        entries.insert(2, vec![0; 400], 10, 1000);
        entries.insert(3, vec![0; 400], 10, 1000);
        assert_eq!(entries.len(), 2);
        assert!(entries.get(1).is_none());
        assert_eq!(entries.total_bytes, 800);
    }

    #[test]
    fn test_bounded_entries_overwrite_moves_to_newest() {
        let mut entries = BoundedEntries::default();
        entries.insert(1, vec![1], 2, 1024);
        entries.insert(2, vec![2], 2, 1024);
        entries.insert(1, vec![9, 9], 2, 1024);
        entries.insert(3, vec![3], 2, 1024);
        assert_eq!(entries.get(1), Some(&vec![9, 9]));
        assert!(entries.get(2).is_none());
        assert_eq!(entries.total_bytes, 3);
    }

    #[test]
    fn test_file_store_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut store = FileBlobStore::open(&path, &options()).unwrap();
        store.insert(42, b"hello").unwrap();
        store.close().unwrap();

        let mut store = FileBlobStore::open(&path, &options()).unwrap();
        let mut buffer = Vec::new();
        assert!(store.lookup(42, &mut buffer).unwrap());
        assert_eq!(buffer, b"hello");
        assert!(!store.lookup(43, &mut buffer).unwrap());
    }

    #[test]
    fn test_file_store_persists_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        {
            let mut store = FileBlobStore::open(&path, &options()).unwrap();
            store.insert(1, b"dropped").unwrap();
        }

        let store = FileBlobStore::open(&path, &options()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_handles_share_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut first = FileBlobStore::open(&path, &options()).unwrap();
        let mut second = FileBlobStore::open(&path, &options()).unwrap();
        first.insert(1, b"first").unwrap();
        second.insert(2, b"second").unwrap();

        let mut buffer = Vec::new();
        assert!(second.lookup(1, &mut buffer).unwrap());
        assert_eq!(buffer, b"first");

        first.close().unwrap();
        second.insert(3, b"third").unwrap();
        second.close().unwrap();

        let mut store = FileBlobStore::open(&path, &options()).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.lookup(1, &mut buffer).unwrap());
        assert_eq!(buffer, b"first");
        assert!(store.lookup(2, &mut buffer).unwrap());
        assert_eq!(buffer, b"second");
    }

    #[test]
    fn test_journal_survives_without_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut store = SharedStore::load(&path, &options()).unwrap();
        store.append(9, b"unflushed").unwrap();
        assert!(sibling_path(&path, JOURNAL_EXTENSION).exists());
        // No compaction, as if the process died here.
        drop(store);

        let store = SharedStore::load(&path, &options()).unwrap();
        assert_eq!(store.entries.get(9).map(Vec::as_slice), Some(&b"unflushed"[..]));
        assert!(!sibling_path(&path, JOURNAL_EXTENSION).exists());
    }

    #[test]
    fn test_torn_journal_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut store = SharedStore::load(&path, &options()).unwrap();
        store.append(1, b"whole").unwrap();
        drop(store);

        let mut journal = OpenOptions::new()
            .append(true)
            .open(sibling_path(&path, JOURNAL_EXTENSION))
            .unwrap();
        journal.write_all(&[0x73, 0x61, 0x76]).unwrap();
        drop(journal);

        let store = SharedStore::load(&path, &options()).unwrap();
        assert_eq!(store.entries.len(), 1);
        assert_eq!(store.entries.get(1).map(Vec::as_slice), Some(&b"whole"[..]));
    }

    #[test]
    fn test_journal_from_other_version_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut store = SharedStore::load(&path, &options()).unwrap();
        store.append(1, b"old").unwrap();
        drop(store);

        let newer = StoreOptions {
            version: 8,
            ..options()
        };
        let store = SharedStore::load(&path, &newer).unwrap();
        assert_eq!(store.entries.len(), 0);
    }

    #[test]
    fn test_file_store_version_mismatch_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut store = FileBlobStore::open(&path, &options()).unwrap();
        store.insert(1, b"old").unwrap();
        store.close().unwrap();

        let newer = StoreOptions {
            version: 8,
            ..options()
        };
        let store = FileBlobStore::open(&path, &newer).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_reset_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");

        let mut store = FileBlobStore::open(&path, &options()).unwrap();
        store.insert(1, b"old").unwrap();
        store.close().unwrap();

        let reset = StoreOptions {
            reset: true,
            ..options()
        };
        let store = FileBlobStore::open(&path, &reset).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_corrupt_snapshot_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");
        std::fs::write(sibling_path(&path, SNAPSHOT_EXTENSION), b"not a snapshot").unwrap();

        let store = FileBlobStore::open(&path, &options()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_rejects_oversized_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBlobStore::open(&dir.path().join("imgcache"), &options()).unwrap();
        let result = store.insert(1, &vec![0; 2048]);
        assert!(matches!(result, Err(StoreError::TooLarge { size: 2048, .. })));
    }

    #[test]
    fn test_closed_store_refuses_calls() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBlobStore::open(&dir.path().join("imgcache"), &options()).unwrap();
        store.close().unwrap();
        assert!(matches!(store.insert(1, b"x"), Err(StoreError::Closed)));
        assert!(matches!(
            store.lookup(1, &mut Vec::new()),
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let result = FileBlobStore::open(&blocker.join("imgcache"), &options());
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_delete_files_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgcache");
        FileBlobStore::open(&path, &options())
            .unwrap()
            .close()
            .unwrap();
        std::fs::write(dir.path().join("imgcache.idx"), b"").unwrap();
        std::fs::write(dir.path().join("other"), b"").unwrap();

        FileBlobStoreProvider.delete_files(&path).unwrap();

        assert!(!sibling_path(&path, SNAPSHOT_EXTENSION).exists());
        assert!(!dir.path().join("imgcache.idx").exists());
        assert!(dir.path().join("other").exists());
    }

    #[test]
    fn test_memory_provider_shares_by_path() {
        let provider = MemoryBlobStoreProvider::new();
        let path = Path::new("/cache/imgcache");

        let mut store = provider.open(path, &options()).unwrap();
        store.insert(5, b"shared").unwrap();

        let mut reopened = provider.open(path, &options()).unwrap();
        let mut buffer = Vec::new();
        assert!(reopened.lookup(5, &mut buffer).unwrap());
        assert_eq!(buffer, b"shared");
        assert_eq!(provider.record_count(path), 1);
        assert_eq!(provider.insert_count(path), 1);
    }

    #[test]
    fn test_memory_provider_failing() {
        let provider = MemoryBlobStoreProvider::failing();
        assert!(provider.open(Path::new("/cache/imgcache"), &options()).is_err());
    }
}
