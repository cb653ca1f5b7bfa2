use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod authorize;
mod register;
mod users;

pub use authorize::{decision_exit_code, AuthorizeHandler};
pub use register::{register_exit_code, RegisterHandler};
pub use users::{UsersHandler, UsersHandlerDeps};

/// Exit status for a capture that was cancelled by the user.
pub const EXIT_CANCELLED: u8 = 6;

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Register(args) => Box::new(RegisterHandler::new(args)),
            Commands::Authorize(args) => Box::new(AuthorizeHandler::new(args)),
            Commands::Users(cmd) => Box::new(UsersHandler::new(cmd)),
        }
    }
}
