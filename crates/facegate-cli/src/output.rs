use std::error::Error;
use std::io::{self, Write};

use facegate_core::{AuthDecision, RegisterOutcome};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputMode;
use crate::errors::{AppError, AppResult};
use crate::runtime::IdentitySummary;

pub fn decision_message(decision: &AuthDecision) -> String {
    match decision {
        AuthDecision::Granted {
            username,
            display_image,
        } => format!("Access granted for {username} (reference image: {display_image})"),
        AuthDecision::InvalidCredentials => {
            "Access denied: username and password are required".into()
        }
        AuthDecision::WrongPassword => "Access denied: wrong password".into(),
        AuthDecision::FaceNotFound => "Access denied: face not recognised".into(),
        AuthDecision::IdentityConflict { found } => {
            format!("Access denied: face belongs to enrolled user '{found}'")
        }
        AuthDecision::Cancelled => "Authorization cancelled".into(),
        AuthDecision::DeviceError { error } => format!("Capture device error: {error}"),
    }
}

pub fn register_message(outcome: &RegisterOutcome) -> String {
    match outcome {
        RegisterOutcome::Registered {
            username,
            reference_image,
        } => format!("Registered {username} (reference image: {reference_image})"),
        RegisterOutcome::Rejected { error } => format!("Registration rejected: {error}"),
        RegisterOutcome::Cancelled => "Registration cancelled".into(),
        RegisterOutcome::DeviceError { error } => format!("Capture device error: {error}"),
    }
}

pub fn render_authorize(decision: &AuthDecision, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!("{}", decision_message(decision)),
        OutputMode::Json => write_json(decision)?,
    }
    Ok(())
}

pub fn render_register(outcome: &RegisterOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!("{}", register_message(outcome)),
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_users(users: &[IdentitySummary], mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if users.is_empty() {
                println!("No identities registered");
            }
            for user in users {
                println!("{}\t{}", user.username, user.enrolled_at);
            }
        }
        OutputMode::Json => write_json(&json!({ "identities": users }))?,
    }
    Ok(())
}

pub fn render_user(user: &IdentitySummary, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            println!("username:        {}", user.username);
            println!("enrolled at:     {}", user.enrolled_at);
            println!("reference image: {}", user.reference_image);
        }
        OutputMode::Json => write_json(user)?,
    }
    Ok(())
}

fn write_json(payload: &impl Serialize) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn error_payload(err: &AppError) -> serde_json::Value {
    json!({
        "success": false,
        "tag": err.tag(),
        "error": err.human_message(),
    })
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => eprintln!("error: {}", err.human_message()),
        OutputMode::Json => {
            if let Ok(json) = serde_json::to_string(&error_payload(err)) {
                println!("{json}");
            }
        }
    }
    if let Some(source) = err.source() {
        eprintln!("cause: {source}");
    }
}
