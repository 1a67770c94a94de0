use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};

static GLOBAL: Lazy<Arc<StoreLock>> = Lazy::new(|| Arc::new(StoreLock::new()));

/// State that only changes while the store lock is held.
#[derive(Debug, Default)]
pub struct StoreLockState {
    pub(crate) old_files_checked: bool,
}

/// Serializes every blob-store call across the caches sharing it.
/// Thumbnail computation never happens under this lock.
#[derive(Debug, Default)]
pub struct StoreLock {
    state: Mutex<StoreLockState>,
}

impl StoreLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock shared by every cache in the process unless told otherwise.
    pub fn global() -> Arc<StoreLock> {
        GLOBAL.clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreLockState> {
        self.state.lock()
    }
}
