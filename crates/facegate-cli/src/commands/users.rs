use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, StoreArgs, UsersCommands};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::{render_user, render_users};
use crate::runtime::{self, IdentitySummary};

pub struct UsersHandler {
    command: UsersCommands,
    deps: UsersHandlerDeps,
}

pub struct UsersHandlerDeps {
    pub list: Box<dyn Fn(&StoreArgs) -> AppResult<Vec<IdentitySummary>> + Send + Sync>,
    pub show: Box<dyn Fn(&StoreArgs, &str) -> AppResult<IdentitySummary> + Send + Sync>,
    pub render_list: Box<dyn Fn(&[IdentitySummary], OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_show: Box<dyn Fn(&IdentitySummary, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl UsersHandlerDeps {
    pub fn new(
        list: impl Fn(&StoreArgs) -> AppResult<Vec<IdentitySummary>> + Send + Sync + 'static,
        show: impl Fn(&StoreArgs, &str) -> AppResult<IdentitySummary> + Send + Sync + 'static,
        render_list: impl Fn(&[IdentitySummary], OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_show: impl Fn(&IdentitySummary, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            list: Box::new(list),
            show: Box::new(show),
            render_list: Box::new(render_list),
            render_show: Box::new(render_show),
        }
    }
}

impl Default for UsersHandlerDeps {
    fn default() -> Self {
        Self::new(
            runtime::list_identities,
            runtime::show_identity,
            render_users,
            render_user,
        )
    }
}

impl UsersHandler {
    pub fn new(command: UsersCommands) -> Self {
        Self {
            command,
            deps: UsersHandlerDeps::default(),
        }
    }

    pub fn with_dependencies(command: UsersCommands, deps: UsersHandlerDeps) -> Self {
        Self { command, deps }
    }
}

impl CommandHandler for UsersHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            UsersCommands::List(args) => {
                let users = (self.deps.list)(&args.store)?;
                (self.deps.render_list)(&users, mode)?;
            }
            UsersCommands::Show(args) => {
                let user = (self.deps.show)(&args.store, &args.user)?;
                (self.deps.render_show)(&user, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
