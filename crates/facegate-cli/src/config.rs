use std::io;
use std::path::{Path, PathBuf};

use facegate_config::{
    default_search_paths, load_resolved_from_paths, ConfigError, DeviceSetting, ResolvedConfig,
};
use facegate_core::capture::{CaptureSettings, DeviceLocator};
use facegate_core::faces::MatcherSettings;
use tracing::debug;

use crate::cli::{CaptureArgs, StoreArgs};
use crate::errors::AppResult;

/// Everything needed to assemble an engine, after flags, config file and defaults are merged.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub store_path: PathBuf,
    pub image_dir: PathBuf,
    pub capture: CaptureSettings,
    pub matcher: MatcherSettings,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

/// `--config` replaces the system search list; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> AppResult<ResolvedConfig> {
    let loaded = match explicit {
        Some(path) => {
            let loaded = load_resolved_from_paths(&[path.to_path_buf()])?;
            if loaded.source.is_none() {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::NotFound, "config file not found"),
                }
                .into());
            }
            loaded
        }
        None => load_resolved_from_paths(&default_search_paths())?,
    };
    match &loaded.source {
        Some(path) => debug!(target: "config", path = %path.display(), "loaded configuration"),
        None => debug!(target: "config", "no config file found; using defaults"),
    }
    Ok(loaded.resolved)
}

pub fn resolve_engine_config(store: &StoreArgs, capture: &CaptureArgs) -> AppResult<EngineConfig> {
    let resolved = load_config(store.config.as_deref())?;
    Ok(merge(resolved, store, capture))
}

pub fn resolve_store_path(store: &StoreArgs) -> AppResult<PathBuf> {
    if let Some(path) = &store.store {
        return Ok(path.clone());
    }
    Ok(load_config(store.config.as_deref())?.store_path)
}

/// Flags override config values, which already carry the built-in defaults.
pub fn merge(resolved: ResolvedConfig, store: &StoreArgs, capture: &CaptureArgs) -> EngineConfig {
    let device_candidates = if capture.devices.is_empty() {
        resolved
            .device_candidates
            .iter()
            .map(device_locator)
            .collect()
    } else {
        capture
            .devices
            .iter()
            .map(|text| DeviceLocator::parse(text))
            .collect()
    };

    EngineConfig {
        store_path: store.store.clone().unwrap_or(resolved.store_path),
        image_dir: capture.image_dir.clone().unwrap_or(resolved.image_dir),
        capture: CaptureSettings {
            device_candidates,
            frame_width: capture.width.unwrap_or(resolved.frame_width),
            frame_height: capture.height.unwrap_or(resolved.frame_height),
            pixel_format: capture
                .pixel_format
                .clone()
                .unwrap_or(resolved.pixel_format),
            warmup_frames: capture.warmup_frames.unwrap_or(resolved.warmup_frames),
        },
        matcher: MatcherSettings {
            similarity_threshold: capture.threshold.unwrap_or(resolved.similarity_threshold),
            jitters: capture.jitters.unwrap_or(resolved.jitters).max(1),
            model_name: resolved.matcher_model,
        },
        landmark_model: capture.landmark_model.clone().or(resolved.landmark_model),
        encoder_model: capture.encoder_model.clone().or(resolved.encoder_model),
        preview: capture.preview.clone(),
    }
}

fn device_locator(setting: &DeviceSetting) -> DeviceLocator {
    match setting {
        DeviceSetting::Index(index) => DeviceLocator::Index(*index),
        DeviceSetting::Path(path) => DeviceLocator::Path(PathBuf::from(path)),
    }
}
