//! Authorization decision engine.
//!
//! Both operations capture a face first and only then look at the supplied
//! username and password. `authorize` resolves to exactly one [`AuthDecision`]:
//!
//! | username known | password ok | face verifies | other identity found | decision            |
//! |----------------|-------------|---------------|----------------------|---------------------|
//! | no             |             |               | yes                  | `IdentityConflict`  |
//! | no             |             |               | no                   | `FaceNotFound`      |
//! | yes            | no          |               |                      | `WrongPassword`     |
//! | yes            | yes         | yes           |                      | `Granted`           |
//! | yes            | yes         | no            | yes                  | `IdentityConflict`  |
//! | yes            | yes         | no            | no                   | `FaceNotFound`      |

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::{
    CaptureOutcome, CaptureSession, CaptureSettings, CommandSource, DeviceOpener, FeedbackSink,
};
use crate::errors::{AppError, AppResult, DeviceError, ValidationError};
use crate::faces::{FaceDetector, FaceMatcher};
use crate::identity::{IdentityPersistence, IdentityStore, JsonFilePersistence};
use crate::images::{CapturePurpose, EphemeralImage, ImageRef, ImageStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegisterOutcome {
    Registered {
        username: String,
        reference_image: ImageRef,
    },
    Rejected {
        error: ValidationError,
    },
    Cancelled,
    DeviceError {
        error: DeviceError,
    },
}

impl RegisterOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            RegisterOutcome::Registered { .. } => "registered",
            RegisterOutcome::Rejected { error } => error.tag(),
            RegisterOutcome::Cancelled => "cancelled",
            RegisterOutcome::DeviceError { error } => error.tag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AuthDecision {
    /// Carries the claimed identity's enrolled reference image for display.
    Granted {
        username: String,
        display_image: ImageRef,
    },
    InvalidCredentials,
    WrongPassword,
    FaceNotFound,
    IdentityConflict {
        found: String,
    },
    Cancelled,
    DeviceError {
        error: DeviceError,
    },
}

impl AuthDecision {
    pub fn tag(&self) -> &'static str {
        match self {
            AuthDecision::Granted { .. } => "granted",
            AuthDecision::InvalidCredentials => "invalid_credentials",
            AuthDecision::WrongPassword => "wrong_password",
            AuthDecision::FaceNotFound => "face_not_found",
            AuthDecision::IdentityConflict { .. } => "identity_conflict",
            AuthDecision::Cancelled => "cancelled",
            AuthDecision::DeviceError { .. } => "device_error",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AuthDecision::Granted { .. })
    }
}

pub struct AuthEngine<P = JsonFilePersistence> {
    store: IdentityStore<P>,
    images: Box<dyn ImageStore>,
    detector: Box<dyn FaceDetector>,
    matcher: Box<dyn FaceMatcher>,
    opener: Box<dyn DeviceOpener>,
    settings: CaptureSettings,
    device: Mutex<()>,
}

impl<P: IdentityPersistence> AuthEngine<P> {
    pub fn new(
        store: IdentityStore<P>,
        images: Box<dyn ImageStore>,
        detector: Box<dyn FaceDetector>,
        matcher: Box<dyn FaceMatcher>,
        opener: Box<dyn DeviceOpener>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            store,
            images,
            detector,
            matcher,
            opener,
            settings,
            device: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &IdentityStore<P> {
        &self.store
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Captures an enrollment face and adds the identity.
    ///
    /// Validation failures come back as [`RegisterOutcome::Rejected`]; persistence
    /// failures as `Err`. In both cases the captured image is removed again.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        commands: &mut dyn CommandSource,
        feedback: &mut dyn FeedbackSink,
    ) -> AppResult<RegisterOutcome> {
        let captured = match self.capture(CapturePurpose::Register, commands, feedback)? {
            CaptureOutcome::Captured(face) => face,
            CaptureOutcome::Cancelled => return Ok(RegisterOutcome::Cancelled),
            CaptureOutcome::DeviceFailure(error) => {
                return Ok(RegisterOutcome::DeviceError { error })
            }
        };

        match self
            .store
            .register(username, password, captured.image.clone())
        {
            Ok(()) => Ok(RegisterOutcome::Registered {
                username: username.trim().to_string(),
                reference_image: captured.image,
            }),
            Err(AppError::Validation(error)) => {
                info!(target: "engine.register", username, reason = error.tag(), "registration rejected");
                self.discard(&captured.image);
                Ok(RegisterOutcome::Rejected { error })
            }
            Err(err) => {
                self.discard(&captured.image);
                Err(err)
            }
        }
    }

    /// Captures a probe face and decides whether `username` may pass.
    ///
    /// A matcher failure on the claimed identity's own comparison is returned as
    /// `Err(AppError::Matcher)`. The probe image is gone on every return path.
    pub fn authorize(
        &self,
        username: &str,
        password: &str,
        commands: &mut dyn CommandSource,
        feedback: &mut dyn FeedbackSink,
    ) -> AppResult<AuthDecision> {
        let captured = match self.capture(CapturePurpose::Authorize, commands, feedback)? {
            CaptureOutcome::Captured(face) => face,
            CaptureOutcome::Cancelled => return Ok(AuthDecision::Cancelled),
            CaptureOutcome::DeviceFailure(error) => {
                return Ok(AuthDecision::DeviceError { error })
            }
        };
        let probe = EphemeralImage::new(self.images.as_ref(), captured.image);

        let decision = self.decide(username, password, probe.image())?;
        info!(target: "engine.authorize", username, decision = decision.tag(), "authorization decided");
        Ok(decision)
    }

    /// First identity, in enrollment order, whose reference verifies against `probe`.
    ///
    /// Matcher failures on a candidate count as "no match" for that candidate.
    pub fn find_identity_by_face(&self, probe: &ImageRef) -> Option<String> {
        for record in self.store.all() {
            match self.matcher.verify(&record.reference_image, probe) {
                Ok(result) if result.verified => {
                    debug!(
                        target: "engine.authorize",
                        candidate = %record.username,
                        distance = result.distance,
                        "probe matched enrolled identity"
                    );
                    return Some(record.username);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "engine.authorize", candidate = %record.username, reason = err.tag(), "skipping candidate: {err}");
                }
            }
        }
        None
    }

    fn decide(&self, username: &str, password: &str, probe: &ImageRef) -> AppResult<AuthDecision> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(AuthDecision::InvalidCredentials);
        }

        let Some(record) = self.store.get(username) else {
            debug!(target: "engine.authorize", username, "unknown username, searching by face");
            return Ok(self.disambiguate(username, probe));
        };

        if !record.credential.verify(password) {
            return Ok(AuthDecision::WrongPassword);
        }

        let result = self
            .matcher
            .verify(&record.reference_image, probe)
            .map_err(|err| {
                warn!(target: "engine.authorize", username, "claimed identity comparison failed: {err}");
                AppError::Matcher(err)
            })?;
        debug!(
            target: "engine.authorize",
            username,
            verified = result.verified,
            distance = result.distance,
            model = %result.model_used,
            "claimed identity compared"
        );

        if result.verified {
            Ok(AuthDecision::Granted {
                username: record.username,
                display_image: record.reference_image,
            })
        } else {
            Ok(self.disambiguate(username, probe))
        }
    }

    fn disambiguate(&self, claimed: &str, probe: &ImageRef) -> AuthDecision {
        match self.find_identity_by_face(probe) {
            Some(found) if found != claimed => AuthDecision::IdentityConflict { found },
            _ => AuthDecision::FaceNotFound,
        }
    }

    fn capture(
        &self,
        purpose: CapturePurpose,
        commands: &mut dyn CommandSource,
        feedback: &mut dyn FeedbackSink,
    ) -> AppResult<CaptureOutcome> {
        let _device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = CaptureSession::new(
            self.opener.as_ref(),
            self.detector.as_ref(),
            self.images.as_ref(),
            &self.settings,
        );
        session.run(purpose, commands, feedback)
    }

    fn discard(&self, image: &ImageRef) {
        if let Err(err) = self.images.remove(image) {
            warn!(target: "engine.register", image = %image, "failed to remove unused capture: {err}");
        }
    }
}
