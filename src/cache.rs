use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::{
    blob_store::{BlobStore, BlobStoreProvider, FileBlobStoreProvider},
    config::{CacheSettings, Preferences},
    decoder::{BitmapDecoder, ImageCrateDecoder},
    error::{CacheError, CacheResult},
    key::CacheKey,
    pipeline::{MediaKind, ThumbnailPipeline},
    record,
    store_lock::{StoreLock, StoreLockState},
    video::{FfmpegExtractor, MediaExtractor, VideoFrameExtractor},
};

/// Everything a cache talks to outside of its own logic.
#[derive(Clone)]
pub struct Collaborators {
    pub lock: Arc<StoreLock>,
    pub provider: Arc<dyn BlobStoreProvider>,
    pub decoder: Arc<dyn BitmapDecoder>,
    pub extractor: Arc<dyn MediaExtractor>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            lock: StoreLock::global(),
            provider: Arc::new(FileBlobStoreProvider),
            decoder: Arc::new(ImageCrateDecoder),
            extractor: Arc::new(FfmpegExtractor::default()),
        }
    }
}

enum CacheState {
    Open(Box<dyn BlobStore>),
    Disabled,
    Closed,
}

/// Path-keyed thumbnail cache in front of a blob store.
///
/// Store calls go through the shared [`StoreLock`]; decoding and encoding run
/// outside it, so concurrent misses on one path may both compute and both
/// insert. The later insert wins.
pub struct ThumbnailCache {
    lock: Arc<StoreLock>,
    pipeline: ThumbnailPipeline,
    store_path: PathBuf,
    state: Mutex<CacheState>,
}

impl ThumbnailCache {
    /// Never fails. If the store cannot be opened the cache stays disabled for
    /// its whole lifetime: lookups find nothing and writes are dropped.
    pub fn open(
        settings: &CacheSettings,
        preferences: &mut dyn Preferences,
        collaborators: Collaborators,
    ) -> Self {
        let store_path = settings.store_path();
        let state = {
            let mut guard = collaborators.lock.lock();
            remove_old_files_if_necessary(
                &mut guard,
                preferences,
                collaborators.provider.as_ref(),
                &store_path,
            );

            match collaborators
                .provider
                .open(&store_path, &settings.store_options())
            {
                Ok(store) => CacheState::Open(store),
                Err(e) => {
                    error!("Cannot instantiate cache {}: {}", store_path.display(), e);
                    CacheState::Disabled
                }
            }
        };

        let video =
            VideoFrameExtractor::new(collaborators.extractor, collaborators.decoder.clone());
        Self {
            lock: collaborators.lock,
            pipeline: ThumbnailPipeline::new(collaborators.decoder, video),
            store_path,
            state: Mutex::new(state),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), CacheState::Open(_))
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Cached thumbnail for `path`, computing and storing it on a miss.
    pub fn get(&self, path: &Path, target_size: u32, kind: MediaKind) -> Option<Vec<u8>> {
        match self.try_get(path, target_size, kind) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("No thumbnail for {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn try_get(&self, path: &Path, target_size: u32, kind: MediaKind) -> CacheResult<Vec<u8>> {
        let key = CacheKey::for_path(path);
        match self.try_get_image_data(&key) {
            Ok(payload) => {
                debug!("Cache hit for {}", path.display());
                return Ok(payload);
            }
            Err(e) if e.is_miss() => debug!("Cache miss for {}: {}", path.display(), e),
            Err(e) => debug!("Lookup skipped for {}: {}", path.display(), e),
        }

        self.compute_and_store(&key, path, target_size, kind)
    }

    /// Computes a fresh thumbnail regardless of what is cached, then stores it.
    pub fn extract_thumbnail(
        &self,
        path: &Path,
        target_size: u32,
        kind: MediaKind,
    ) -> Option<Vec<u8>> {
        match self.try_extract_thumbnail(path, target_size, kind) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("extractThumbnail failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn try_extract_thumbnail(
        &self,
        path: &Path,
        target_size: u32,
        kind: MediaKind,
    ) -> CacheResult<Vec<u8>> {
        let key = CacheKey::for_path(path);
        self.compute_and_store(&key, path, target_size, kind)
    }

    /// Lookup only, nothing is computed on a miss.
    pub fn get_image_data(&self, path: &Path) -> Option<Vec<u8>> {
        match self.try_get_image_data(&CacheKey::for_path(path)) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("No cached data for {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn try_get_image_data(&self, key: &CacheKey) -> CacheResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let found = {
            let _guard = self.lock.lock();
            let mut state = self.state.lock();
            match &mut *state {
                CacheState::Open(store) => store.lookup(key.hash, &mut buffer)?,
                CacheState::Disabled | CacheState::Closed => return Err(CacheError::Disabled),
            }
        };

        if !found {
            return Err(CacheError::NotFound);
        }
        if !record::verify(&buffer, &key.bytes) {
            return Err(CacheError::VerificationMismatch);
        }

        buffer.drain(..key.len());
        Ok(buffer)
    }

    /// Best effort. Failures are logged and dropped.
    pub fn put_image_data(&self, path: &Path, payload: &[u8]) {
        if let Err(e) = self.try_put_image_data(&CacheKey::for_path(path), payload) {
            debug!("Dropped cache write for {}: {}", path.display(), e);
        }
    }

    pub fn try_put_image_data(&self, key: &CacheKey, payload: &[u8]) -> CacheResult<()> {
        let data = record::encode(&key.bytes, payload);
        let _guard = self.lock.lock();
        let mut state = self.state.lock();
        match &mut *state {
            CacheState::Open(store) => Ok(store.insert(key.hash, &data)?),
            CacheState::Disabled | CacheState::Closed => Err(CacheError::Disabled),
        }
    }

    /// Releases the store handle if it is open. Safe to call more than once.
    pub fn close(&self) {
        let _guard = self.lock.lock();
        let mut state = self.state.lock();
        if let CacheState::Open(mut store) = std::mem::replace(&mut *state, CacheState::Closed) {
            if let Err(e) = store.close() {
                warn!("Failed to close cache {}: {}", self.store_path.display(), e);
            }
            info!("Closed cache {}", self.store_path.display());
        }
    }

    /// Deletes the persisted files of the cache described by `settings`.
    pub fn delete_files(
        settings: &CacheSettings,
        provider: &dyn BlobStoreProvider,
        lock: &StoreLock,
    ) -> CacheResult<()> {
        let _guard = lock.lock();
        provider.delete_files(&settings.store_path())?;
        Ok(())
    }

    fn compute_and_store(
        &self,
        key: &CacheKey,
        path: &Path,
        target_size: u32,
        kind: MediaKind,
    ) -> CacheResult<Vec<u8>> {
        let thumbnail = self.pipeline.create_thumbnail(path, target_size, kind)?;
        debug!(
            "Computed {}x{} thumbnail for {} ({} bytes)",
            thumbnail.width,
            thumbnail.height,
            path.display(),
            thumbnail.data.len()
        );

        if let Err(e) = self.try_put_image_data(key, &thumbnail.data) {
            debug!("Dropped cache write for {}: {}", path.display(), e);
        }
        Ok(thumbnail.data)
    }
}

/// Runs once per lock: when the persisted flag says the on-disk format may be
/// stale, everything under the store prefix is removed before the first open.
fn remove_old_files_if_necessary(
    guard: &mut StoreLockState,
    preferences: &mut dyn Preferences,
    provider: &dyn BlobStoreProvider,
    store_path: &Path,
) {
    if guard.old_files_checked {
        return;
    }
    guard.old_files_checked = true;

    if preferences.cache_up_to_date() {
        return;
    }
    if let Err(e) = preferences.mark_cache_up_to_date() {
        warn!("Failed to record cache format flag: {}", e);
    }

    info!("Removing old cache files under {}", store_path.display());
    if let Err(e) = provider.delete_files(store_path) {
        warn!("Failed to remove old cache files: {}", e);
    }
}
