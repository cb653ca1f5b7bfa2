use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use facegate_cli::cli::{AuthorizeArgs, CaptureArgs, OutputMode, StoreArgs};
use facegate_cli::commands::{AuthorizeHandler, CommandHandler};
use facegate_cli::errors::{AppError, CoreError};
use facegate_core::errors::{DeviceError, MatcherError};
use facegate_core::images::ImageRef;
use facegate_core::AuthDecision;

fn sample_args() -> AuthorizeArgs {
    AuthorizeArgs {
        user: "alice".into(),
        password: Some("pw1".into()),
        store: StoreArgs::default(),
        capture: CaptureArgs::default(),
    }
}

fn run_with(decision: AuthDecision) -> (ExitCode, Vec<(String, OutputMode)>) {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let handler = AuthorizeHandler::with_dependencies(
        sample_args(),
        move |_args| Ok(decision.clone()),
        {
            let rendered = Arc::clone(&rendered);
            move |decision, mode| {
                rendered
                    .lock()
                    .unwrap()
                    .push((decision.tag().to_string(), mode));
                Ok(())
            }
        },
    );
    let exit = handler.execute(OutputMode::Json, false).unwrap();
    let calls = rendered.lock().unwrap().clone();
    (exit, calls)
}

#[test]
fn granted_decision_exits_successfully() {
    let (exit, calls) = run_with(AuthDecision::Granted {
        username: "alice".into(),
        display_image: ImageRef::new("/var/lib/facegate/images/register-a.png"),
    });
    assert_eq!(exit, ExitCode::SUCCESS);
    assert_eq!(calls, vec![("granted".to_string(), OutputMode::Json)]);
}

#[test]
fn denials_are_rendered_and_fail_the_process() {
    for decision in [
        AuthDecision::WrongPassword,
        AuthDecision::FaceNotFound,
        AuthDecision::IdentityConflict {
            found: "bob".into(),
        },
        AuthDecision::InvalidCredentials,
    ] {
        let tag = decision.tag().to_string();
        let (exit, calls) = run_with(decision);
        assert_eq!(exit, ExitCode::from(1));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, tag);
    }
}

#[test]
fn cancel_and_device_failures_have_own_exit_codes() {
    let (exit, _) = run_with(AuthDecision::Cancelled);
    assert_eq!(exit, ExitCode::from(6));

    let (exit, _) = run_with(AuthDecision::DeviceError {
        error: DeviceError::CannotOpenDevice {
            tried: vec!["/dev/video0".into()],
            message: "busy".into(),
        },
    });
    assert_eq!(exit, ExitCode::from(4));
}

#[test]
fn matcher_errors_skip_rendering() {
    let rendered = Arc::new(Mutex::new(0usize));
    let handler = AuthorizeHandler::with_dependencies(
        sample_args(),
        |_args| {
            Err(AppError::Core(CoreError::Matcher(
                MatcherError::Backend("model crashed".into()),
            )))
        },
        {
            let rendered = Arc::clone(&rendered);
            move |_decision, _mode| {
                *rendered.lock().unwrap() += 1;
                Ok(())
            }
        },
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert_eq!(err.tag(), "matcher_backend");
    assert_eq!(err.exit_code(), ExitCode::from(3));
    assert_eq!(*rendered.lock().unwrap(), 0);
}
