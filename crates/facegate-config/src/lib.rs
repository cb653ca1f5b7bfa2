use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/facegate/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/facegate/config.toml";
pub const DATA_DIR_ENV: &str = "FACEGATE_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "/var/lib/facegate";
pub const STORE_FILE_NAME: &str = "identities.json";
pub const IMAGE_DIR_NAME: &str = "images";
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_DEVICE_CANDIDATES: [u32; 3] = [0, 1, 2];
pub const DEFAULT_PIXEL_FORMAT: &str = "YUYV";
pub const DEFAULT_WARMUP_FRAMES: u32 = 0;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.93;
pub const DEFAULT_JITTERS: u32 = 1;
pub const DEFAULT_MATCHER_MODEL: &str = "dlib-resnet-v1";

/// A capture device given either as a `/dev/videoN` index or as a path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DeviceSetting {
    Index(u32),
    Path(String),
}

impl fmt::Display for DeviceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSetting::Index(index) => write!(f, "{index}"),
            DeviceSetting::Path(path) => f.write_str(path),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub store_path: Option<PathBuf>,
    pub image_dir: Option<PathBuf>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub device_candidates: Option<Vec<DeviceSetting>>,
    pub pixel_format: Option<String>,
    pub warmup_frames: Option<u32>,
    pub similarity_threshold: Option<f64>,
    pub jitters: Option<u32>,
    pub matcher_model: Option<String>,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub store_path: PathBuf,
    pub image_dir: PathBuf,
    pub frame_width: u32,
    pub frame_height: u32,
    pub device_candidates: Vec<DeviceSetting>,
    pub pixel_format: String,
    pub warmup_frames: u32,
    pub similarity_threshold: f64,
    pub jitters: u32,
    pub matcher_model: String,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Fills gaps from `$FACEGATE_DATA_DIR` and the built-in defaults.
    pub fn from_raw(raw: ConfigFile) -> Self {
        let data_dir = env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        Self::from_raw_with_data_dir(raw, data_dir)
    }

    pub fn from_raw_with_data_dir(raw: ConfigFile, data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self {
            store_path: raw
                .store_path
                .unwrap_or_else(|| data_dir.join(STORE_FILE_NAME)),
            image_dir: raw
                .image_dir
                .unwrap_or_else(|| data_dir.join(IMAGE_DIR_NAME)),
            frame_width: raw.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH),
            frame_height: raw.frame_height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            device_candidates: raw.device_candidates.unwrap_or_else(|| {
                DEFAULT_DEVICE_CANDIDATES
                    .iter()
                    .copied()
                    .map(DeviceSetting::Index)
                    .collect()
            }),
            pixel_format: raw
                .pixel_format
                .unwrap_or_else(|| DEFAULT_PIXEL_FORMAT.to_string()),
            warmup_frames: raw.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
            similarity_threshold: raw
                .similarity_threshold
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            jitters: raw.jitters.unwrap_or(DEFAULT_JITTERS).max(1),
            matcher_model: raw
                .matcher_model
                .unwrap_or_else(|| DEFAULT_MATCHER_MODEL.to_string()),
            landmark_model: raw.landmark_model,
            encoder_model: raw.encoder_model,
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn default_search_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_search_paths())
}

/// The first existing file wins. Missing files are skipped, unreadable ones are errors.
pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn primary_path_wins() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        let secondary = dir.path().join("secondary.toml");
        fs::write(&secondary, "warmup_frames = 2").unwrap();
        fs::write(&primary, "warmup_frames = 5").unwrap();

        let loaded = load_from_paths(&[primary.clone(), secondary.clone()])
            .unwrap()
            .expect("config expected");
        assert_eq!(loaded.source(), primary.as_path());
        assert_eq!(loaded.contents.warmup_frames, Some(5));
    }

    #[test]
    fn secondary_used_when_primary_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let secondary = dir.path().join("secondary.toml");
        fs::write(&secondary, "pixel_format = \"GREY\"").unwrap();

        let loaded = load_from_paths(&[missing, secondary.clone()])
            .unwrap()
            .expect("config expected");
        assert_eq!(loaded.source, secondary);
        assert_eq!(loaded.contents.pixel_format.as_deref(), Some("GREY"));
    }

    #[test]
    fn parse_errors_are_reported() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "store_path = { invalid = true }").unwrap();

        let err = load_from_paths(&[broken.clone()]).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, broken),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn io_errors_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dir.toml");
        fs::create_dir_all(&path).unwrap();

        let err = load_from_paths(&[path.clone()]).unwrap_err();
        match err {
            ConfigError::Read { path: err_path, .. } => assert_eq!(err_path, path),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_paths_return_none() {
        let loaded = load_from_paths(&[]).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn defaults_apply_when_nothing_configured() {
        let resolved = ResolvedConfig::from_raw_with_data_dir(ConfigFile::default(), None);
        assert_eq!(
            resolved.store_path,
            PathBuf::from("/var/lib/facegate/identities.json")
        );
        assert_eq!(resolved.image_dir, PathBuf::from("/var/lib/facegate/images"));
        assert_eq!((resolved.frame_width, resolved.frame_height), (640, 480));
        assert_eq!(
            resolved.device_candidates,
            vec![
                DeviceSetting::Index(0),
                DeviceSetting::Index(1),
                DeviceSetting::Index(2)
            ]
        );
        assert_eq!(resolved.pixel_format, "YUYV");
        assert_eq!(resolved.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(resolved.matcher_model, "dlib-resnet-v1");
        assert!(resolved.landmark_model.is_none());
    }

    #[test]
    fn data_dir_relocates_only_unset_paths() {
        let raw = ConfigFile {
            image_dir: Some(PathBuf::from("/srv/faces")),
            ..ConfigFile::default()
        };
        let resolved =
            ResolvedConfig::from_raw_with_data_dir(raw, Some(PathBuf::from("/tmp/facegate")));
        assert_eq!(
            resolved.store_path,
            PathBuf::from("/tmp/facegate/identities.json")
        );
        assert_eq!(resolved.image_dir, PathBuf::from("/srv/faces"));
    }

    #[test]
    fn device_candidates_accept_indices_and_paths() {
        let raw: ConfigFile = toml::from_str(
            r#"
            device_candidates = [2, "/dev/v4l/by-id/usb-cam"]
            similarity_threshold = 0.8
            jitters = 0
            "#,
        )
        .unwrap();
        let resolved = ResolvedConfig::from_raw_with_data_dir(raw, None);
        assert_eq!(
            resolved.device_candidates,
            vec![
                DeviceSetting::Index(2),
                DeviceSetting::Path("/dev/v4l/by-id/usb-cam".into())
            ]
        );
        assert_eq!(resolved.similarity_threshold, 0.8);
        assert_eq!(resolved.jitters, 1);
    }

    #[test]
    fn resolved_config_reports_source() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        fs::write(&primary, "frame_width = 1280").unwrap();

        let resolved = load_resolved_from_paths(&[primary.clone()]).unwrap();
        assert_eq!(resolved.source, Some(primary));
        assert_eq!(resolved.resolved.frame_width, 1280);
    }
}
