use std::any::Any;
use std::process::ExitCode;

use facegate_core::AuthDecision;

use crate::cli::{AuthorizeArgs, OutputMode};
use crate::commands::{CommandHandler, EXIT_CANCELLED};
use crate::errors::AppResult;
use crate::output::render_authorize;
use crate::runtime;

pub struct AuthorizeHandler {
    args: AuthorizeArgs,
    run: Box<dyn Fn(&AuthorizeArgs) -> AppResult<AuthDecision> + Send + Sync>,
    render: Box<dyn Fn(&AuthDecision, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl AuthorizeHandler {
    pub fn new(args: AuthorizeArgs) -> Self {
        Self::with_dependencies(args, runtime::run_authorize, render_authorize)
    }

    pub fn with_dependencies(
        args: AuthorizeArgs,
        run: impl Fn(&AuthorizeArgs) -> AppResult<AuthDecision> + Send + Sync + 'static,
        render: impl Fn(&AuthDecision, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for AuthorizeHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let decision = (self.run)(&self.args)?;
        (self.render)(&decision, mode)?;
        Ok(decision_exit_code(&decision))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Zero only for a granted decision, so shell callers can gate on the status.
pub fn decision_exit_code(decision: &AuthDecision) -> ExitCode {
    match decision {
        AuthDecision::Granted { .. } => ExitCode::SUCCESS,
        AuthDecision::InvalidCredentials
        | AuthDecision::WrongPassword
        | AuthDecision::FaceNotFound
        | AuthDecision::IdentityConflict { .. } => ExitCode::from(1),
        AuthDecision::DeviceError { .. } => ExitCode::from(4),
        AuthDecision::Cancelled => ExitCode::from(EXIT_CANCELLED),
    }
}
