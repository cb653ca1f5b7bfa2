use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Handle to a stored face image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePurpose {
    /// Enrollment reference, kept for the lifetime of the store.
    Register,
    /// Probe image for a single authorization attempt.
    Authorize,
}

impl CapturePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            CapturePurpose::Register => "register",
            CapturePurpose::Authorize => "authorize",
        }
    }
}

pub trait ImageStore: Send + Sync {
    fn store(&self, image: &GrayImage, purpose: CapturePurpose) -> AppResult<ImageRef>;
    fn remove(&self, image: &ImageRef) -> AppResult<()>;
    fn exists(&self, image: &ImageRef) -> bool;
}

#[derive(Debug, Clone)]
pub struct FileImageStore {
    dir: PathBuf,
}

impl FileImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn next_path(&self, purpose: CapturePurpose) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        self.dir.join(format!(
            "{}-{timestamp}-{}.png",
            purpose.as_str(),
            Uuid::new_v4().simple()
        ))
    }
}

impl ImageStore for FileImageStore {
    fn store(&self, image: &GrayImage, purpose: CapturePurpose) -> AppResult<ImageRef> {
        fs::create_dir_all(&self.dir).map_err(|err| AppError::ImageWrite {
            path: self.dir.clone(),
            message: err.to_string(),
        })?;
        let path = self.next_path(purpose);
        write_png(image, &path)?;
        debug!(path = %path.display(), purpose = purpose.as_str(), "stored captured frame");
        Ok(ImageRef::new(path))
    }

    fn remove(&self, image: &ImageRef) -> AppResult<()> {
        match fs::remove_file(image.path()) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    fn exists(&self, image: &ImageRef) -> bool {
        image.path().is_file()
    }
}

pub fn write_png(image: &GrayImage, path: &Path) -> AppResult<()> {
    let file = File::create(path).map_err(|err| AppError::ImageWrite {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::L8)
        .map_err(|err| AppError::ImageWrite {
            path: path.to_path_buf(),
            message: format!("failed to encode PNG: {err}"),
        })?;
    writer.flush().map_err(|err| AppError::ImageWrite {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(())
}

/// Probe image that is deleted when the guard goes out of scope.
pub struct EphemeralImage<'a> {
    store: &'a dyn ImageStore,
    image: ImageRef,
}

impl<'a> EphemeralImage<'a> {
    pub fn new(store: &'a dyn ImageStore, image: ImageRef) -> Self {
        Self { store, image }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }
}

impl Drop for EphemeralImage<'_> {
    fn drop(&mut self) {
        match self.store.remove(&self.image) {
            Ok(_) => debug!(path = %self.image, "deleted temporary probe image"),
            Err(err) => warn!(path = %self.image, "failed to delete temporary probe image: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_image() -> GrayImage {
        GrayImage::from_vec(2, 2, vec![0, 64, 128, 255]).unwrap()
    }

    #[test]
    fn stored_frames_are_named_by_purpose() {
        let tmp = TempDir::new().unwrap();
        let store = FileImageStore::new(tmp.path().join("images"));

        let reference = store
            .store(&sample_image(), CapturePurpose::Register)
            .unwrap();
        let probe = store
            .store(&sample_image(), CapturePurpose::Authorize)
            .unwrap();

        assert!(store.exists(&reference));
        assert_ne!(reference, probe);
        let name = reference.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("register-"));
        assert!(name.ends_with(".png"));
        let name = probe.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("authorize-"));

        let decoded = image::open(reference.path()).unwrap().to_luma8();
        assert_eq!(decoded.as_raw(), sample_image().as_raw());
    }

    #[test]
    fn removing_missing_image_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileImageStore::new(tmp.path());
        store
            .remove(&ImageRef::new(tmp.path().join("gone.png")))
            .unwrap();
    }

    #[test]
    fn ephemeral_guard_deletes_on_drop() {
        let tmp = TempDir::new().unwrap();
        let store = FileImageStore::new(tmp.path());
        let probe = store
            .store(&sample_image(), CapturePurpose::Authorize)
            .unwrap();

        {
            let guard = EphemeralImage::new(&store, probe.clone());
            assert!(store.exists(guard.image()));
        }

        assert!(!store.exists(&probe));
    }
}
