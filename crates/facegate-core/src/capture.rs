use std::fmt;
use std::path::PathBuf;

pub mod device;
pub mod frame;
pub mod overlay;
pub mod session;

pub use device::{open_first_available, DeviceOpener, FrameSource};
#[cfg(feature = "v4l")]
pub use device::{V4lDeviceOpener, V4lFrameSource};
pub use overlay::{draw_face_boxes, FrameFeedback};
pub use session::{
    CaptureCommand, CaptureOutcome, CaptureSession, CaptureWarning, CapturedFace, CommandSource,
    FeedbackSink, NullFeedback, SessionState,
};

pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_PIXEL_FORMAT: &str = "YUYV";
pub const DEFAULT_WARMUP_FRAMES: u32 = 0;
pub const DEFAULT_DEVICE_CANDIDATES: [u32; 3] = [0, 1, 2];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLocator {
    Index(u32),
    Path(PathBuf),
}

impl DeviceLocator {
    /// Numeric text is a device index, anything else a device path.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<u32>() {
            Ok(index) => DeviceLocator::Index(index),
            Err(_) => DeviceLocator::Path(PathBuf::from(text.trim())),
        }
    }

    pub fn display(&self) -> String {
        match self {
            DeviceLocator::Index(i) => format!("/dev/video{i}"),
            DeviceLocator::Path(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for DeviceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Tried in order; the first device that opens is used.
    pub device_candidates: Vec<DeviceLocator>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub pixel_format: String,
    pub warmup_frames: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_candidates: DEFAULT_DEVICE_CANDIDATES
                .iter()
                .copied()
                .map(DeviceLocator::Index)
                .collect(),
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            warmup_frames: DEFAULT_WARMUP_FRAMES,
        }
    }
}
