use facegate_cli::cli::{
    AuthorizeArgs, CaptureArgs, Commands, RegisterArgs, StoreArgs, UsersCommands, UsersListArgs,
    UsersShowArgs,
};
use facegate_cli::commands::{AuthorizeHandler, CommandHandler, RegisterHandler, UsersHandler};

fn assert_dispatch<T: 'static>(command: Commands)
where
    T: CommandHandler,
{
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

#[test]
fn register_command_dispatches_register_handler() {
    assert_dispatch::<RegisterHandler>(Commands::Register(RegisterArgs {
        user: "alice".into(),
        password: None,
        store: StoreArgs::default(),
        capture: CaptureArgs::default(),
    }));
}

#[test]
fn authorize_command_dispatches_authorize_handler() {
    assert_dispatch::<AuthorizeHandler>(Commands::Authorize(AuthorizeArgs {
        user: "alice".into(),
        password: Some("pw1".into()),
        store: StoreArgs::default(),
        capture: CaptureArgs::default(),
    }));
}

#[test]
fn users_commands_dispatch_users_handler() {
    assert_dispatch::<UsersHandler>(Commands::Users(UsersCommands::List(
        UsersListArgs::default(),
    )));
    assert_dispatch::<UsersHandler>(Commands::Users(UsersCommands::Show(UsersShowArgs {
        user: "bob".into(),
        store: StoreArgs::default(),
    })));
}
