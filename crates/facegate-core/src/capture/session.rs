use std::sync::mpsc::{Receiver, TryRecvError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::device::{open_first_available, DeviceOpener, FrameSource};
use crate::capture::overlay::FrameFeedback;
use crate::capture::CaptureSettings;
use crate::errors::{AppError, AppResult, DeviceError};
use crate::faces::{BoundingBox, FaceDetector};
use crate::images::{CapturePurpose, ImageRef, ImageStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Streaming { has_face: bool },
    Captured,
    Cancelled,
    DeviceFailure,
    /// The frame was accepted but could not be stored.
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Captured
                | SessionState::Cancelled
                | SessionState::DeviceFailure
                | SessionState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Capture,
    Cancel,
}

/// External capture/cancel signals, sampled once per frame.
pub trait CommandSource {
    fn poll(&mut self) -> Option<CaptureCommand>;
}

impl CommandSource for Receiver<CaptureCommand> {
    fn poll(&mut self) -> Option<CaptureCommand> {
        match self.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) => None,
            // Nobody can ever press capture again.
            Err(TryRecvError::Disconnected) => Some(CaptureCommand::Cancel),
        }
    }
}

impl<F> CommandSource for F
where
    F: FnMut() -> Option<CaptureCommand>,
{
    fn poll(&mut self) -> Option<CaptureCommand> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureWarning {
    NoFaceDetected,
}

pub trait FeedbackSink {
    fn frame(&mut self, feedback: &FrameFeedback<'_>);

    fn warning(&mut self, _warning: CaptureWarning) {}

    fn state_changed(&mut self, _state: SessionState) {}
}

/// Discards feedback; useful for headless callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn frame(&mut self, _feedback: &FrameFeedback<'_>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFace {
    pub image: ImageRef,
    pub faces: Vec<BoundingBox>,
    pub device: String,
    pub frames_processed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured(CapturedFace),
    Cancelled,
    DeviceFailure(DeviceError),
}

/// Turns a live frame stream into one accepted face capture, a cancellation or a device failure.
///
/// A session runs at most once. The device is opened on entry and dropped on every exit.
pub struct CaptureSession<'a> {
    opener: &'a dyn DeviceOpener,
    detector: &'a dyn FaceDetector,
    images: &'a dyn ImageStore,
    settings: &'a CaptureSettings,
    state: SessionState,
    frames_processed: u64,
}

impl<'a> CaptureSession<'a> {
    pub fn new(
        opener: &'a dyn DeviceOpener,
        detector: &'a dyn FaceDetector,
        images: &'a dyn ImageStore,
        settings: &'a CaptureSettings,
    ) -> Self {
        Self {
            opener,
            detector,
            images,
            settings,
            state: SessionState::Idle,
            frames_processed: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Errors are reserved for failures outside the device, such as storing the captured frame.
    pub fn run(
        &mut self,
        purpose: CapturePurpose,
        commands: &mut dyn CommandSource,
        feedback: &mut dyn FeedbackSink,
    ) -> AppResult<CaptureOutcome> {
        if self.state != SessionState::Idle {
            return Err(AppError::SessionFinished);
        }

        let source = match open_first_available(self.opener, self.settings) {
            Ok(source) => source,
            Err(err) => {
                warn!(target: "capture.session", "{err}");
                self.transition(SessionState::DeviceFailure, feedback);
                return Ok(CaptureOutcome::DeviceFailure(err));
            }
        };
        let mut lease = DeviceLease::new(source);
        info!(target: "capture.session", device = %lease.name, purpose = purpose.as_str(), "capture session started");

        for idx in 0..self.settings.warmup_frames {
            if let Err(err) = lease.source.next_frame() {
                return Ok(self.read_failure(&lease, format!("warm-up frame {}: {err}", idx + 1), feedback));
            }
        }

        self.transition(SessionState::Streaming { has_face: false }, feedback);
        loop {
            let frame = match lease.source.next_frame() {
                Ok(frame) => frame,
                Err(err) => return Ok(self.read_failure(&lease, err.to_string(), feedback)),
            };
            self.frames_processed += 1;

            let faces = self.detector.detect(&frame);
            let has_face = !faces.is_empty();
            if self.state != (SessionState::Streaming { has_face }) {
                self.transition(SessionState::Streaming { has_face }, feedback);
            }
            let frame_feedback = FrameFeedback {
                frame_index: self.frames_processed,
                frame: &frame,
                faces: &faces,
            };
            debug!(
                target: "capture.session",
                frame = self.frames_processed,
                faces = faces.len(),
                status = frame_feedback.status_text(),
                "frame processed"
            );
            feedback.frame(&frame_feedback);

            match commands.poll() {
                Some(CaptureCommand::Capture) if !has_face => {
                    warn!(target: "capture.session", frame = self.frames_processed, "capture requested but no face detected");
                    feedback.warning(CaptureWarning::NoFaceDetected);
                }
                Some(CaptureCommand::Capture) => {
                    let image = match self.images.store(&frame, purpose) {
                        Ok(image) => image,
                        Err(err) => {
                            warn!(target: "capture.session", "failed to store captured frame: {err}");
                            self.transition(SessionState::Failed, feedback);
                            return Err(err);
                        }
                    };
                    info!(target: "capture.session", image = %image, faces = faces.len(), "face captured");
                    self.transition(SessionState::Captured, feedback);
                    return Ok(CaptureOutcome::Captured(CapturedFace {
                        image,
                        faces,
                        device: lease.name.clone(),
                        frames_processed: self.frames_processed,
                    }));
                }
                Some(CaptureCommand::Cancel) => {
                    info!(target: "capture.session", "capture cancelled");
                    self.transition(SessionState::Cancelled, feedback);
                    return Ok(CaptureOutcome::Cancelled);
                }
                None => {}
            }
        }
    }

    fn read_failure(
        &mut self,
        lease: &DeviceLease,
        message: String,
        feedback: &mut dyn FeedbackSink,
    ) -> CaptureOutcome {
        warn!(target: "capture.session", device = %lease.name, "frame read failed: {message}");
        self.transition(SessionState::DeviceFailure, feedback);
        CaptureOutcome::DeviceFailure(DeviceError::ReadFailure {
            device: lease.name.clone(),
            message,
        })
    }

    fn transition(&mut self, state: SessionState, feedback: &mut dyn FeedbackSink) {
        self.state = state;
        feedback.state_changed(state);
    }
}

struct DeviceLease {
    name: String,
    source: Box<dyn FrameSource>,
}

impl DeviceLease {
    fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            name: source.describe(),
            source,
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        debug!(target: "capture.session", device = %self.name, "released capture device");
    }
}
