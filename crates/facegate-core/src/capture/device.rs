use image::GrayImage;
use tracing::{debug, warn};

use crate::capture::{CaptureSettings, DeviceLocator};
use crate::errors::{AppResult, DeviceError};

#[cfg(feature = "v4l")]
pub use v4l_backend::{V4lDeviceOpener, V4lFrameSource};

/// An opened, exclusively owned live frame source. Dropping it releases the device.
pub trait FrameSource: Send {
    fn describe(&self) -> String;
    fn next_frame(&mut self) -> AppResult<GrayImage>;
}

pub trait DeviceOpener: Send + Sync {
    fn open(
        &self,
        locator: &DeviceLocator,
        settings: &CaptureSettings,
    ) -> AppResult<Box<dyn FrameSource>>;
}

/// Opens the first candidate that succeeds, in configured order.
pub fn open_first_available(
    opener: &dyn DeviceOpener,
    settings: &CaptureSettings,
) -> Result<Box<dyn FrameSource>, DeviceError> {
    let mut tried = Vec::with_capacity(settings.device_candidates.len());
    let mut last_error = String::from("no capture device candidates configured");

    for locator in &settings.device_candidates {
        tried.push(locator.display());
        match opener.open(locator, settings) {
            Ok(source) => {
                debug!(target: "capture.device", device = %locator, "opened capture device");
                return Ok(source);
            }
            Err(err) => {
                warn!(target: "capture.device", device = %locator, "cannot open capture device: {err}");
                last_error = err.to_string();
            }
        }
    }

    Err(DeviceError::CannotOpenDevice {
        tried,
        message: last_error,
    })
}

#[cfg(feature = "v4l")]
mod v4l_backend {
    use image::GrayImage;
    use v4l::buffer::Type;
    use v4l::capability::{Capabilities, Flags as CapabilityFlags};
    use v4l::format::FourCC;
    use v4l::io::mmap::Stream;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;

    use super::{DeviceOpener, FrameSource};
    use crate::capture::frame::convert_frame_to_image;
    use crate::capture::{CaptureSettings, DeviceLocator};
    use crate::errors::{AppError, AppResult};

    const STREAM_BUFFERS: u32 = 4;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct V4lDeviceOpener;

    impl DeviceOpener for V4lDeviceOpener {
        fn open(
            &self,
            locator: &DeviceLocator,
            settings: &CaptureSettings,
        ) -> AppResult<Box<dyn FrameSource>> {
            Ok(Box::new(V4lFrameSource::open(locator, settings)?))
        }
    }

    pub struct V4lFrameSource {
        // Declared before `_device` so the mapped buffers are released first.
        stream: Stream<'static>,
        _device: v4l::Device,
        path: String,
        width: u32,
        height: u32,
        pixel_format: String,
    }

    impl V4lFrameSource {
        pub fn open(locator: &DeviceLocator, settings: &CaptureSettings) -> AppResult<Self> {
            let device = match locator {
                DeviceLocator::Index(index) => v4l::Device::new(*index as usize),
                DeviceLocator::Path(path) => v4l::Device::with_path(path),
            }
            .map_err(|source| AppError::DeviceOpen {
                device: locator.display(),
                source,
            })?;

            ensure_capabilities(&device.query_caps()?)?;

            let requested = parse_fourcc(&settings.pixel_format)
                .ok_or_else(|| AppError::UnsupportedFormat(settings.pixel_format.clone()))?;
            if !device
                .enum_formats()?
                .iter()
                .any(|format| format.fourcc == requested)
            {
                return Err(AppError::UnsupportedFormat(settings.pixel_format.clone()));
            }

            let mut format = device.format()?;
            format.fourcc = requested;
            format.width = settings.frame_width;
            format.height = settings.frame_height;
            let format = device.set_format(&format)?;

            let stream = Stream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)?;
            Ok(Self {
                stream,
                _device: device,
                path: locator.display(),
                width: format.width,
                height: format.height,
                pixel_format: fourcc_to_string(format.fourcc),
            })
        }
    }

    impl FrameSource for V4lFrameSource {
        fn describe(&self) -> String {
            format!(
                "{} ({} {}x{})",
                self.path, self.pixel_format, self.width, self.height
            )
        }

        fn next_frame(&mut self) -> AppResult<GrayImage> {
            let (data, _) = self.stream.next()?;
            convert_frame_to_image(data, self.width, self.height, &self.pixel_format)
        }
    }

    fn ensure_capabilities(caps: &Capabilities) -> AppResult<()> {
        let flags = caps.capabilities;
        let mut reasons = Vec::new();
        if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            reasons.push("missing VIDEO_CAPTURE".to_string());
        }
        if !flags.intersects(CapabilityFlags::READ_WRITE | CapabilityFlags::STREAMING) {
            reasons.push("missing READ_WRITE or STREAMING".to_string());
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(AppError::Capability(reasons.join(", ")))
        }
    }

    fn parse_fourcc(code: &str) -> Option<FourCC> {
        if code.is_empty() || code.len() > 4 {
            return None;
        }
        let mut repr = [b' '; 4];
        for (i, byte) in code.as_bytes().iter().enumerate() {
            repr[i] = *byte;
        }
        Some(FourCC::new(&repr))
    }

    fn fourcc_to_string(fourcc: FourCC) -> String {
        String::from_utf8_lossy(&fourcc.repr)
            .trim_matches(|c| c == char::from(0) || c == ' ')
            .to_string()
    }
}
