use std::any::Any;
use std::process::ExitCode;

use facegate_core::RegisterOutcome;

use crate::cli::{OutputMode, RegisterArgs};
use crate::commands::{CommandHandler, EXIT_CANCELLED};
use crate::errors::AppResult;
use crate::output::render_register;
use crate::runtime;

pub struct RegisterHandler {
    args: RegisterArgs,
    run: Box<dyn Fn(&RegisterArgs) -> AppResult<RegisterOutcome> + Send + Sync>,
    render: Box<dyn Fn(&RegisterOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl RegisterHandler {
    pub fn new(args: RegisterArgs) -> Self {
        Self::with_dependencies(args, runtime::run_register, render_register)
    }

    pub fn with_dependencies(
        args: RegisterArgs,
        run: impl Fn(&RegisterArgs) -> AppResult<RegisterOutcome> + Send + Sync + 'static,
        render: impl Fn(&RegisterOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RegisterHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode)?;
        Ok(register_exit_code(&outcome))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register_exit_code(outcome: &RegisterOutcome) -> ExitCode {
    match outcome {
        RegisterOutcome::Registered { .. } => ExitCode::SUCCESS,
        RegisterOutcome::Rejected { .. } => ExitCode::from(2),
        RegisterOutcome::DeviceError { .. } => ExitCode::from(4),
        RegisterOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
    }
}
