use serde::Serialize;
use tracing::debug;

use crate::errors::MatcherError;
use crate::faces::comparer::compute_best_similarity;
use crate::faces::extractor::{ensure_valid_faces, FaceEmbeddingBackend, FaceEmbeddingRecord};
use crate::images::ImageRef;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.93;
pub const DEFAULT_MATCHER_MODEL: &str = "dlib-resnet-v1";

/// Outcome of one pairwise comparison. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub distance: f64,
    pub model_used: String,
}

/// Pairwise face verification. Implementations decide what "same person" means.
pub trait FaceMatcher {
    fn verify(
        &self,
        reference: &ImageRef,
        probe: &ImageRef,
    ) -> Result<VerificationResult, MatcherError>;
}

#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub similarity_threshold: f64,
    pub jitters: u32,
    pub model_name: String,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            jitters: 1,
            model_name: DEFAULT_MATCHER_MODEL.to_string(),
        }
    }
}

/// Verifies faces by cosine similarity of embeddings from any backend.
pub struct EmbeddingMatcher<B> {
    backend: B,
    settings: MatcherSettings,
}

impl<B: FaceEmbeddingBackend> EmbeddingMatcher<B> {
    pub fn new(backend: B, settings: MatcherSettings) -> Self {
        Self { backend, settings }
    }

    fn embed(&self, image: &ImageRef) -> Result<Vec<FaceEmbeddingRecord>, MatcherError> {
        let decoded = image::open(image.path()).map_err(|err| MatcherError::ImageUnreadable {
            path: image.path().to_path_buf(),
            message: err.to_string(),
        })?;
        let faces = self
            .backend
            .extract(&decoded.to_rgb8(), self.settings.jitters)
            .map_err(|err| MatcherError::Backend(err.to_string()))?;
        if faces.is_empty() {
            return Err(MatcherError::NoFaceInImage {
                path: image.path().to_path_buf(),
            });
        }
        ensure_valid_faces(&faces)
            .map_err(|message| MatcherError::Backend(format!("{image}: {message}")))?;
        Ok(faces)
    }
}

impl<B: FaceEmbeddingBackend> FaceMatcher for EmbeddingMatcher<B> {
    fn verify(
        &self,
        reference: &ImageRef,
        probe: &ImageRef,
    ) -> Result<VerificationResult, MatcherError> {
        let reference_faces = self.embed(reference)?;
        let probe_faces = self.embed(probe)?;

        let reference_dim = reference_faces[0].embedding.len();
        let probe_dim = probe_faces[0].embedding.len();
        if reference_dim != probe_dim {
            return Err(MatcherError::Backend(format!(
                "embedding length mismatch: reference has {reference_dim} values, probe has {probe_dim}"
            )));
        }

        let (similarity, reference_idx, probe_idx) =
            compute_best_similarity(&reference_faces, &probe_faces);
        let verified = similarity >= self.settings.similarity_threshold;
        debug!(
            reference = %reference,
            probe = %probe,
            similarity,
            reference_face = reference_idx,
            probe_face = probe_idx,
            verified,
            "compared face embeddings"
        );

        Ok(VerificationResult {
            verified,
            distance: 1.0 - similarity,
            model_used: self.settings.model_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, AppResult};
    use crate::faces::detector::{BoundingBox, FaceDetector};
    use crate::images::write_png;
    use image::{GrayImage, RgbImage};
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Derives a 2-d embedding from the first pixel; a black pixel means "no face".
    struct PixelBackend;

    impl FaceEmbeddingBackend for PixelBackend {
        fn extract(&self, image: &RgbImage, _num_jitters: u32) -> AppResult<Vec<FaceEmbeddingRecord>> {
            let value = image.get_pixel(0, 0)[0];
            match value {
                0 => Ok(Vec::new()),
                1 => Err(AppError::FrameProcessing("backend exploded".into())),
                _ => Ok(vec![FaceEmbeddingRecord {
                    bounding_box: BoundingBox {
                        left: 0,
                        top: 0,
                        right: 1,
                        bottom: 1,
                    },
                    embedding: vec![f64::from(value), f64::from(255 - value)],
                }]),
            }
        }
    }

    fn image_with(dir: &Path, name: &str, value: u8) -> ImageRef {
        let path = dir.join(name);
        write_png(&GrayImage::from_pixel(2, 2, image::Luma([value])), &path).unwrap();
        ImageRef::new(path)
    }

    fn matcher() -> EmbeddingMatcher<PixelBackend> {
        EmbeddingMatcher::new(PixelBackend, MatcherSettings::default())
    }

    #[test]
    fn identical_faces_verify() {
        let tmp = TempDir::new().unwrap();
        let a = image_with(tmp.path(), "a.png", 200);
        let b = image_with(tmp.path(), "b.png", 200);

        let result = matcher().verify(&a, &b).unwrap();
        assert!(result.verified);
        assert!(result.distance.abs() < 1e-9);
        assert_eq!(result.model_used, DEFAULT_MATCHER_MODEL);
    }

    #[test]
    fn distant_faces_do_not_verify() {
        let tmp = TempDir::new().unwrap();
        let a = image_with(tmp.path(), "a.png", 250);
        let b = image_with(tmp.path(), "b.png", 10);

        let result = matcher().verify(&a, &b).unwrap();
        assert!(!result.verified);
        assert!(result.distance > 1.0 - DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn missing_face_is_a_matcher_error() {
        let tmp = TempDir::new().unwrap();
        let a = image_with(tmp.path(), "a.png", 200);
        let blank = image_with(tmp.path(), "blank.png", 0);

        let err = matcher().verify(&a, &blank).unwrap_err();
        assert_eq!(
            err,
            MatcherError::NoFaceInImage {
                path: blank.path().to_path_buf()
            }
        );
    }

    #[test]
    fn unreadable_image_is_a_matcher_error() {
        let tmp = TempDir::new().unwrap();
        let a = image_with(tmp.path(), "a.png", 200);
        let missing = ImageRef::new(tmp.path().join("missing.png"));

        let err = matcher().verify(&missing, &a).unwrap_err();
        assert!(matches!(err, MatcherError::ImageUnreadable { .. }));
    }

    #[test]
    fn backend_failures_are_wrapped() {
        let tmp = TempDir::new().unwrap();
        let a = image_with(tmp.path(), "a.png", 200);
        let broken = image_with(tmp.path(), "broken.png", 1);

        let err = matcher().verify(&a, &broken).unwrap_err();
        match err {
            MatcherError::Backend(message) => assert!(message.contains("backend exploded")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Counts extractions through a `Cell`, which keeps it on one thread.
    struct CountingBackend {
        calls: Cell<usize>,
    }

    impl FaceEmbeddingBackend for CountingBackend {
        fn extract(&self, image: &RgbImage, num_jitters: u32) -> AppResult<Vec<FaceEmbeddingRecord>> {
            self.calls.set(self.calls.get() + 1);
            PixelBackend.extract(image, num_jitters)
        }
    }

    #[test]
    fn single_threaded_backend_is_shared_between_detector_and_matcher() {
        let tmp = TempDir::new().unwrap();
        let a = image_with(tmp.path(), "a.png", 200);
        let b = image_with(tmp.path(), "b.png", 200);

        let backend = Rc::new(CountingBackend {
            calls: Cell::new(0),
        });
        let detector = {
            let backend = Rc::clone(&backend);
            move |frame: &GrayImage| {
                backend.calls.set(backend.calls.get() + 1);
                vec![BoundingBox {
                    left: 0,
                    top: 0,
                    right: i64::from(frame.width()),
                    bottom: i64::from(frame.height()),
                }]
            }
        };
        let detector: Box<dyn FaceDetector> = Box::new(detector);
        let matcher: Box<dyn FaceMatcher> = Box::new(EmbeddingMatcher::new(
            Rc::clone(&backend),
            MatcherSettings::default(),
        ));

        assert_eq!(detector.detect(&GrayImage::new(2, 2)).len(), 1);
        assert!(matcher.verify(&a, &b).unwrap().verified);
        assert_eq!(backend.calls.get(), 3);
    }
}
