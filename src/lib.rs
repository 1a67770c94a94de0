pub mod blob_store;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod decoder;
pub mod dirs;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod record;
pub mod store_lock;
pub mod utils;
pub mod video;

pub use blob_store::{
    BlobStore, BlobStoreProvider, FileBlobStoreProvider, MemoryBlobStoreProvider, StoreOptions,
};
pub use cache::{Collaborators, ThumbnailCache};
pub use config::{CacheSettings, Config, MemoryPreferences, Preferences};
pub use error::{CacheError, DecodeError, StoreError};
pub use key::CacheKey;
pub use pipeline::{MediaKind, Thumbnail, ThumbnailPipeline};
pub use store_lock::StoreLock;
