//! Assembles a live engine from the compiled-in camera and face backends.

use facegate_core::AuthEngine;

use crate::config::EngineConfig;
use crate::errors::AppResult;

#[cfg(all(feature = "v4l", feature = "dlib"))]
pub fn build_engine(config: &EngineConfig) -> AppResult<AuthEngine> {
    use std::rc::Rc;

    use facegate_core::capture::V4lDeviceOpener;
    use facegate_core::faces::{DlibBackend, EmbeddingMatcher, FaceDetector, FaceModelPaths};
    use facegate_core::identity::{IdentityStore, JsonFilePersistence};
    use facegate_core::images::FileImageStore;
    use image::GrayImage;

    let models = FaceModelPaths::resolve(
        config.landmark_model.clone(),
        config.encoder_model.clone(),
    )?;
    let backend = Rc::new(DlibBackend::new(&models)?);
    let detector = {
        let backend = Rc::clone(&backend);
        move |frame: &GrayImage| backend.detect(frame)
    };
    let matcher = EmbeddingMatcher::new(backend, config.matcher.clone());
    let store = IdentityStore::open(JsonFilePersistence::new(&config.store_path))?;

    Ok(AuthEngine::new(
        store,
        Box::new(FileImageStore::new(&config.image_dir)),
        Box::new(detector),
        Box::new(matcher),
        Box::new(V4lDeviceOpener),
        config.capture.clone(),
    ))
}

#[cfg(not(all(feature = "v4l", feature = "dlib")))]
pub fn build_engine(_config: &EngineConfig) -> AppResult<AuthEngine> {
    use crate::errors::CoreError;

    Err(CoreError::BackendUnavailable(missing_backend()).into())
}

#[cfg(not(all(feature = "v4l", feature = "dlib")))]
const fn missing_backend() -> &'static str {
    if cfg!(feature = "v4l") {
        "dlib face recognition"
    } else {
        "v4l camera"
    }
}

#[cfg(all(test, not(all(feature = "v4l", feature = "dlib"))))]
mod tests {
    use super::*;
    use crate::cli::{CaptureArgs, StoreArgs};
    use crate::config::merge;
    use facegate_config::{ConfigFile, ResolvedConfig};

    #[test]
    fn builds_without_backends_report_unavailable() {
        let config = merge(
            ResolvedConfig::from_raw_with_data_dir(ConfigFile::default(), None),
            &StoreArgs::default(),
            &CaptureArgs::default(),
        );
        let err = match build_engine(&config) {
            Ok(_) => panic!("expected missing backend"),
            Err(err) => err,
        };
        assert_eq!(err.tag(), "backend_unavailable");
    }
}
