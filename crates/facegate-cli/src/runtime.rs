//! Live register/authorize flows and identity listing behind the command handlers.

use std::io::{self, BufRead, Write};

use facegate_core::identity::{IdentityRecord, IdentityStore, JsonFilePersistence};
use facegate_core::{AuthDecision, RegisterOutcome};
use serde::Serialize;

use crate::backend::build_engine;
use crate::cli::{AuthorizeArgs, RegisterArgs, StoreArgs};
use crate::config::{resolve_engine_config, resolve_store_path};
use crate::errors::{AppError, AppResult};
use crate::feedback::{stdin_commands, TerminalFeedback, CAPTURE_INSTRUCTIONS};

/// Public view of an identity record. The credential is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySummary {
    pub username: String,
    pub reference_image: String,
    pub enrolled_at: String,
}

impl From<&IdentityRecord> for IdentitySummary {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            username: record.username.clone(),
            reference_image: record.reference_image.to_string(),
            enrolled_at: record.enrolled_at.clone(),
        }
    }
}

pub fn run_register(args: &RegisterArgs) -> AppResult<RegisterOutcome> {
    let config = resolve_engine_config(&args.store, &args.capture)?;
    let engine = build_engine(&config)?;
    let password = resolve_password(args.password.as_deref(), &args.user)?;

    eprintln!("{CAPTURE_INSTRUCTIONS}");
    let mut commands = stdin_commands();
    let mut feedback = TerminalFeedback::new(config.preview.clone());
    engine
        .register(&args.user, &password, &mut commands, &mut feedback)
        .map_err(AppError::from)
}

pub fn run_authorize(args: &AuthorizeArgs) -> AppResult<AuthDecision> {
    let config = resolve_engine_config(&args.store, &args.capture)?;
    let engine = build_engine(&config)?;
    let password = resolve_password(args.password.as_deref(), &args.user)?;

    eprintln!("{CAPTURE_INSTRUCTIONS}");
    let mut commands = stdin_commands();
    let mut feedback = TerminalFeedback::new(config.preview.clone());
    engine
        .authorize(&args.user, &password, &mut commands, &mut feedback)
        .map_err(AppError::from)
}

pub fn list_identities(store: &StoreArgs) -> AppResult<Vec<IdentitySummary>> {
    let store = open_store(store)?;
    Ok(store.all().iter().map(IdentitySummary::from).collect())
}

pub fn show_identity(store: &StoreArgs, user: &str) -> AppResult<IdentitySummary> {
    let store = open_store(store)?;
    store
        .get(user)
        .map(|record| IdentitySummary::from(&record))
        .ok_or_else(|| AppError::UnknownUser(user.to_string()))
}

fn open_store(store: &StoreArgs) -> AppResult<IdentityStore> {
    let path = resolve_store_path(store)?;
    Ok(IdentityStore::open(JsonFilePersistence::new(path))?)
}

fn resolve_password(flag: Option<&str>, user: &str) -> AppResult<String> {
    if let Some(password) = flag {
        return Ok(password.to_string());
    }
    let stdin = io::stdin();
    prompt_password(user, &mut stdin.lock(), &mut io::stderr())
}

/// Reads one line as the password. The line terminator is not part of it.
pub fn prompt_password(
    user: &str,
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> AppResult<String> {
    write!(prompt, "Password for {user}: ").map_err(AppError::PasswordPrompt)?;
    prompt.flush().map_err(AppError::PasswordPrompt)?;
    let mut line = String::new();
    input.read_line(&mut line).map_err(AppError::PasswordPrompt)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
