//! Frame sources.
//!
//! A source is a pull iterator over RGB frames. It may hand out `None`
//! transiently while still active; the scheduler retries a bounded number of
//! times before giving up.

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ppm"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("frame directory not found: {0}")]
    NotFound(PathBuf),
    #[error("no image files in {0}")]
    Empty(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait FrameSource {
    /// Next frame, or `None` if none is available right now.
    fn next_frame(&mut self) -> Option<RgbImage>;

    /// Whether more frames may still arrive.
    fn is_active(&self) -> bool;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<RgbImage> {
        (**self).next_frame()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

/// Index of the frame most recently handed out by a source.
///
/// Cloned handles share the same position, letting a replay detector follow
/// the source it is paired with. Handles are `Send`, so a whole session can
/// move to a worker thread.
#[derive(Debug, Clone)]
pub struct FrameCursor(Arc<AtomicUsize>);

/// Stored while no frame has been handed out.
const NO_FRAME: usize = usize::MAX;

impl Default for FrameCursor {
    fn default() -> Self {
        Self(Arc::new(AtomicUsize::new(NO_FRAME)))
    }
}

impl FrameCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<usize> {
        match self.0.load(Ordering::Acquire) {
            NO_FRAME => None,
            index => Some(index),
        }
    }

    fn set(&self, index: usize) {
        self.0.store(index, Ordering::Release);
    }
}

/// Frames held in memory.
pub struct VecFrameSource {
    frames: Vec<RgbImage>,
    next: usize,
    cursor: FrameCursor,
}

impl VecFrameSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            next: 0,
            cursor: FrameCursor::new(),
        }
    }

    pub fn cursor(&self) -> FrameCursor {
        self.cursor.clone()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        let frame = self.frames.get(self.next)?.clone();
        self.cursor.set(self.next);
        self.next += 1;
        Some(frame)
    }

    fn is_active(&self) -> bool {
        self.next < self.frames.len()
    }
}

/// Image files from a directory, read in file-name order.
///
/// Unreadable files come back as `None` and are skipped.
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    cursor: FrameCursor,
}

impl ImageDirSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SourceError::NotFound(dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), "opened frame directory");
        Ok(Self {
            paths,
            next: 0,
            cursor: FrameCursor::new(),
        })
    }

    pub fn cursor(&self) -> FrameCursor {
        self.cursor.clone()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        let index = self.next;
        let path = self.paths.get(index)?;
        self.next += 1;
        self.cursor.set(index);
        match image::open(path) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to decode frame");
                None
            }
        }
    }

    fn is_active(&self) -> bool {
        self.next < self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_drains() {
        let mut src = VecFrameSource::new(vec![RgbImage::new(2, 2), RgbImage::new(3, 3)]);
        let cursor = src.cursor();
        assert!(src.is_active());
        assert_eq!(cursor.current(), None);
        assert_eq!(src.next_frame().unwrap().width(), 2);
        assert_eq!(cursor.current(), Some(0));
        assert_eq!(src.next_frame().unwrap().width(), 3);
        assert_eq!(cursor.current(), Some(1));
        assert!(!src.is_active());
        assert!(src.next_frame().is_none());
    }

    #[test]
    fn test_image_dir_source() {
        let dir = std::env::temp_dir().join(format!("contour-frames-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::new(8, 6).save(dir.join("b.png")).unwrap();
        RgbImage::new(4, 4).save(dir.join("a.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let mut src = ImageDirSource::open(&dir).unwrap();
        assert_eq!(src.len(), 2);
        // Sorted by name: a.png first.
        assert_eq!(src.next_frame().unwrap().dimensions(), (4, 4));
        assert_eq!(src.next_frame().unwrap().dimensions(), (8, 6));
        assert!(!src.is_active());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_image_dir_missing() {
        let err = ImageDirSource::open("/nonexistent/contour/frames").err().unwrap();
        assert!(matches!(err, SourceError::NotFound(_)));
    }
}
