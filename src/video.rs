use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use image::RgbImage;
use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::{decoder::BitmapDecoder, error::DecodeError};

/// What an extractor can do, probed once rather than on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub embedded_picture: bool,
    pub frame_capture: bool,
}

/// One opened media source. Dropping it releases whatever it holds.
pub trait MediaSession {
    /// Encoded cover art stored in the container, if there is any.
    fn embedded_picture(&mut self) -> Result<Option<Vec<u8>>, DecodeError>;

    /// A representative frame at an offset of the extractor's choosing.
    fn capture_frame(&mut self) -> Result<Option<RgbImage>, DecodeError>;
}

pub trait MediaExtractor: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    fn open(&self, path: &Path) -> Result<Box<dyn MediaSession>, DecodeError>;
}

/// Embedded picture first, captured frame second.
pub struct VideoFrameExtractor {
    extractor: Arc<dyn MediaExtractor>,
    decoder: Arc<dyn BitmapDecoder>,
}

impl VideoFrameExtractor {
    pub fn new(extractor: Arc<dyn MediaExtractor>, decoder: Arc<dyn BitmapDecoder>) -> Self {
        Self { extractor, decoder }
    }

    pub fn extract(&self, path: &Path) -> Result<RgbImage, DecodeError> {
        let capabilities = self.extractor.capabilities();
        if !capabilities.embedded_picture && !capabilities.frame_capture {
            return Err(DecodeError::ExtractorUnavailable(
                "no extraction capability".to_string(),
            ));
        }

        let mut session = self.extractor.open(path)?;

        if capabilities.embedded_picture {
            match session.embedded_picture() {
                Ok(Some(data)) => match self.decoder.decode_bytes(&data) {
                    Ok(bitmap) => return Ok(bitmap),
                    Err(e) => debug!("Embedded picture in {} is unreadable: {}", path.display(), e),
                },
                Ok(None) => debug!("No embedded picture in {}", path.display()),
                Err(e) => debug!("Embedded picture lookup failed for {}: {}", path.display(), e),
            }
        }

        if capabilities.frame_capture
            && let Some(frame) = session.capture_frame()?
        {
            return Ok(frame);
        }

        Err(DecodeError::NoFrame)
    }
}

/// Extraction through the `ffmpeg` command line tool.
pub struct FfmpegExtractor {
    binary: PathBuf,
    available: OnceCell<bool>,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            available: OnceCell::new(),
        }
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = Command::new(&self.binary)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            if !available {
                warn!(
                    "{} is not available, video thumbnails are disabled",
                    self.binary.display()
                );
            }
            available
        })
    }
}

impl MediaExtractor for FfmpegExtractor {
    fn capabilities(&self) -> Capabilities {
        let available = self.is_available();
        Capabilities {
            embedded_picture: available,
            frame_capture: available,
        }
    }

    fn open(&self, path: &Path) -> Result<Box<dyn MediaSession>, DecodeError> {
        if !path.is_file() {
            return Err(DecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a file", path.display()),
            )));
        }
        Ok(Box::new(FfmpegSession {
            binary: self.binary.clone(),
            path: path.to_path_buf(),
        }))
    }
}

/// Owns no process or file between calls. Every ffmpeg run is waited on
/// before it returns, so dropping a session has nothing left to release.
struct FfmpegSession {
    binary: PathBuf,
    path: PathBuf,
}

impl FfmpegSession {
    /// Runs ffmpeg writing a single image to stdout. A failed run means the
    /// stream asked for is not there.
    fn run<I, S>(&self, args: I) -> Result<Option<Vec<u8>>, DecodeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.binary)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args(args)
            .arg("-")
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() || output.stdout.is_empty() {
            debug!(
                "ffmpeg produced no image for {}: {}",
                self.path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }
}

impl MediaSession for FfmpegSession {
    fn embedded_picture(&mut self) -> Result<Option<Vec<u8>>, DecodeError> {
        // Video streams minus the regular ones leaves attached pictures only.
        self.run([
            "-map", "0:v", "-map", "-0:V", "-frames:v", "1", "-c", "copy", "-f", "image2pipe",
        ])
    }

    fn capture_frame(&mut self) -> Result<Option<RgbImage>, DecodeError> {
        let data = self.run([
            "-map", "0:V:0", "-vf", "thumbnail", "-frames:v", "1", "-c:v", "png", "-f",
            "image2pipe",
        ])?;
        match data {
            Some(data) => Ok(Some(image::load_from_memory(&data)?.to_rgb8())),
            None => Ok(None),
        }
    }
}
