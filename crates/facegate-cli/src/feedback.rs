use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use facegate_core::capture::{
    CaptureCommand, CaptureWarning, FeedbackSink, FrameFeedback, SessionState,
};
use tracing::{debug, warn};

pub const CAPTURE_INSTRUCTIONS: &str =
    "Look at the camera. Type 'c' + Enter to capture, 'q' + Enter to cancel.";

pub fn parse_command(line: &str) -> Option<CaptureCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "c" | "capture" => Some(CaptureCommand::Capture),
        "q" | "quit" | "cancel" => Some(CaptureCommand::Cancel),
        _ => None,
    }
}

/// Feeds capture commands from stdin. End of input closes the channel, which cancels.
pub fn stdin_commands() -> Receiver<CaptureCommand> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => eprintln!("unrecognised input '{}'; {CAPTURE_INSTRUCTIONS}", line.trim()),
            }
        }
    });
    rx
}

/// Prints detection status changes to stderr and optionally keeps a preview PNG updated.
pub struct TerminalFeedback {
    preview: Option<PathBuf>,
    last_status: Option<&'static str>,
}

impl TerminalFeedback {
    pub fn new(preview: Option<PathBuf>) -> Self {
        Self {
            preview,
            last_status: None,
        }
    }
}

impl FeedbackSink for TerminalFeedback {
    fn frame(&mut self, feedback: &FrameFeedback<'_>) {
        let status = feedback.status_text();
        if self.last_status != Some(status) {
            eprintln!("{status}");
            self.last_status = Some(status);
        }
        if let Some(path) = &self.preview {
            if let Err(err) = feedback.render().save(path) {
                warn!(target: "capture.preview", path = %path.display(), "failed to write preview: {err}");
                self.preview = None;
            }
        }
    }

    fn warning(&mut self, warning: CaptureWarning) {
        match warning {
            CaptureWarning::NoFaceDetected => {
                eprintln!("No face detected; face the camera and capture again.")
            }
        }
    }

    fn state_changed(&mut self, state: SessionState) {
        debug!(target: "capture.session", ?state, "session state changed");
        if state.is_terminal() {
            self.last_status = None;
        }
    }
}
