pub mod comparer;
pub mod detector;
pub mod extractor;
pub mod matcher;

pub use comparer::{compute_best_similarity, cosine_similarity};

pub use detector::{BoundingBox, FaceDetector};

#[cfg(feature = "dlib")]
pub use extractor::DlibBackend;
pub use extractor::{ensure_valid_faces, FaceEmbeddingBackend, FaceEmbeddingRecord, FaceModelPaths};

pub use matcher::{
    EmbeddingMatcher, FaceMatcher, MatcherSettings, VerificationResult, DEFAULT_MATCHER_MODEL,
    DEFAULT_SIMILARITY_THRESHOLD,
};
