use fast_image_resize as fr;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Savefile error: {0}")]
    Savefile(#[from] savefile::SavefileError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Record of {size} bytes exceeds the store budget of {max_bytes} bytes")]
    TooLarge { size: usize, max_bytes: u64 },

    #[error("Store is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JPEG error: {0}")]
    Jpeg(#[from] jpeg_decoder::Error),

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("Failed to read image bounds: {0}")]
    Bounds(#[from] imagesize::ImageError),

    #[error("Image buffer error: {0}")]
    Buffer(#[from] fr::ImageBufferError),

    #[error("Resize error: {0}")]
    Resize(#[from] fr::ResizeError),

    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("Media extraction is unavailable: {0}")]
    ExtractorUnavailable(String),

    #[error("No frame could be extracted from the video")]
    NoFrame,
}

/// Internal outcome kinds. None of these reach the caller of the public
/// cache API, which only sees a payload or nothing.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Not found")]
    NotFound,

    #[error("Stored record does not belong to the requested path")]
    VerificationMismatch,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Decode failure: {0}")]
    DecodeFailure(#[from] DecodeError),

    #[error("Cache is disabled")]
    Disabled,
}

impl CacheError {
    /// Misses and collisions are the expected way for a lookup to come back empty.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound | CacheError::VerificationMismatch)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
