use std::env;
use std::path::PathBuf;
use std::rc::Rc;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::faces::detector::BoundingBox;

#[cfg(feature = "dlib")]
pub use dlib::DlibBackend;

pub const LANDMARK_ENV: &str = "DLIB_LANDMARK_MODEL";
pub const ENCODER_ENV: &str = "DLIB_ENCODER_MODEL";

#[derive(Debug, Clone)]
pub struct FaceModelPaths {
    pub landmark: PathBuf,
    pub encoder: PathBuf,
}

impl FaceModelPaths {
    /// Explicit paths win; otherwise `$DLIB_LANDMARK_MODEL` / `$DLIB_ENCODER_MODEL`.
    pub fn resolve(landmark: Option<PathBuf>, encoder: Option<PathBuf>) -> AppResult<Self> {
        let landmark = landmark
            .or_else(|| env::var(LANDMARK_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "landmark predictor",
                flag: "--landmark-model",
                env: LANDMARK_ENV,
            })?;

        let encoder = encoder
            .or_else(|| env::var(ENCODER_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "face encoding network",
                flag: "--encoder-model",
                env: ENCODER_ENV,
            })?;

        Ok(Self { landmark, encoder })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceEmbeddingRecord {
    pub bounding_box: BoundingBox,
    pub embedding: Vec<f64>,
}

pub trait FaceEmbeddingBackend {
    fn extract(&self, image: &RgbImage, num_jitters: u32) -> AppResult<Vec<FaceEmbeddingRecord>>;
}

impl<B: FaceEmbeddingBackend + ?Sized> FaceEmbeddingBackend for Rc<B> {
    fn extract(&self, image: &RgbImage, num_jitters: u32) -> AppResult<Vec<FaceEmbeddingRecord>> {
        (**self).extract(image, num_jitters)
    }
}

/// Checks that every face has a finite, non-zero embedding of one shared length.
pub fn ensure_valid_faces(faces: &[FaceEmbeddingRecord]) -> Result<usize, String> {
    let Some(first) = faces.first() else {
        return Err("contains no face embeddings".into());
    };

    let expected_len = first.embedding.len();
    if expected_len == 0 {
        return Err("embedding vectors are empty".into());
    }

    for (idx, face) in faces.iter().enumerate() {
        if face.embedding.iter().any(|value| !value.is_finite()) {
            return Err(format!("face index {idx} has a non-finite embedding value"));
        }
        if face.embedding.len() != expected_len {
            return Err(format!(
                "embedding length mismatch at face index {} (expected {}, found {})",
                idx,
                expected_len,
                face.embedding.len()
            ));
        }

        let magnitude = face
            .embedding
            .iter()
            .map(|value| value * value)
            .sum::<f64>()
            .sqrt();
        if magnitude <= f64::EPSILON {
            return Err(format!("face index {idx} has zero-magnitude embedding"));
        }
    }

    Ok(expected_len)
}

#[cfg(feature = "dlib")]
mod dlib {
    use dlib_face_recognition::{
        FaceDetector as DlibFaceDetector, FaceDetectorTrait, FaceEncoderNetwork, FaceEncoderTrait,
        ImageMatrix, LandmarkPredictor, LandmarkPredictorTrait,
    };
    use image::{GrayImage, RgbImage};
    use tracing::debug;

    use super::{FaceEmbeddingBackend, FaceEmbeddingRecord, FaceModelPaths};
    use crate::capture::frame::gray_to_rgb;
    use crate::errors::{AppError, AppResult};
    use crate::faces::detector::{BoundingBox, FaceDetector};

    pub struct DlibBackend {
        detector: DlibFaceDetector,
        predictor: LandmarkPredictor,
        encoder: FaceEncoderNetwork,
    }

    impl DlibBackend {
        pub fn new(models: &FaceModelPaths) -> AppResult<Self> {
            debug!(path = %models.landmark.display(), "loading landmark model");
            let predictor =
                LandmarkPredictor::open(&models.landmark).map_err(|message| AppError::ModelLoad {
                    path: models.landmark.clone(),
                    message,
                })?;
            debug!(path = %models.encoder.display(), "loading encoder model");
            let encoder = FaceEncoderNetwork::open(&models.encoder).map_err(|message| {
                AppError::ModelLoad {
                    path: models.encoder.clone(),
                    message,
                }
            })?;

            Ok(Self {
                detector: DlibFaceDetector::new(),
                predictor,
                encoder,
            })
        }
    }

    impl FaceDetector for DlibBackend {
        fn detect(&self, frame: &GrayImage) -> Vec<BoundingBox> {
            let matrix = ImageMatrix::from_image(&gray_to_rgb(frame));
            self.detector
                .face_locations(&matrix)
                .iter()
                .map(|rect| BoundingBox {
                    left: rect.left,
                    top: rect.top,
                    right: rect.right,
                    bottom: rect.bottom,
                })
                .collect()
        }
    }

    impl FaceEmbeddingBackend for DlibBackend {
        fn extract(
            &self,
            image: &RgbImage,
            num_jitters: u32,
        ) -> AppResult<Vec<FaceEmbeddingRecord>> {
            let matrix = ImageMatrix::from_image(image);
            let locations = self.detector.face_locations(&matrix);

            let mut landmarks = Vec::with_capacity(locations.len());
            for rect in locations.iter() {
                landmarks.push(self.predictor.face_landmarks(&matrix, rect));
            }

            let encodings = self
                .encoder
                .get_face_encodings(&matrix, &landmarks, num_jitters);

            let mut records = Vec::with_capacity(locations.len());
            for (rect, encoding) in locations.iter().zip(encodings.iter()) {
                records.push(FaceEmbeddingRecord {
                    bounding_box: BoundingBox {
                        left: rect.left,
                        top: rect.top,
                        right: rect.right,
                        bottom: rect.bottom,
                    },
                    embedding: encoding.as_ref().to_vec(),
                });
            }

            Ok(records)
        }
    }
}
