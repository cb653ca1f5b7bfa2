use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "facegate",
    version,
    about = "Face plus password registration and authorization"
)]
pub struct Cli {
    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Capture a face and enroll a new identity
    Register(RegisterArgs),
    /// Capture a face and decide whether the claimed identity may pass
    Authorize(AuthorizeArgs),
    /// Inspect enrolled identities
    #[command(subcommand)]
    Users(UsersCommands),
}

#[derive(Debug, Clone, Subcommand)]
pub enum UsersCommands {
    /// List enrolled usernames in enrollment order
    List(UsersListArgs),
    /// Show one enrolled identity
    Show(UsersShowArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Config file to use instead of the system search paths
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Identity table JSON file
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CaptureArgs {
    /// Capture device index or path; repeat to give fallbacks in order
    #[arg(long = "device", value_name = "DEVICE")]
    pub devices: Vec<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// V4L2 FourCC, e.g. YUYV, GREY or Y16
    #[arg(long)]
    pub pixel_format: Option<String>,

    /// Frames to discard before detection starts
    #[arg(long)]
    pub warmup_frames: Option<u32>,

    /// Directory for captured face images
    #[arg(long, value_name = "DIR")]
    pub image_dir: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub landmark_model: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub encoder_model: Option<PathBuf>,

    /// Minimum cosine similarity for a face match
    #[arg(long)]
    pub threshold: Option<f64>,

    #[arg(long)]
    pub jitters: Option<u32>,

    /// Continuously write an annotated preview frame to this PNG
    #[arg(long, value_name = "PATH")]
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[arg(long, short)]
    pub user: String,

    /// Password; prompted on stdin when omitted
    #[arg(long)]
    pub password: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Debug, Clone, Args)]
pub struct AuthorizeArgs {
    #[arg(long, short)]
    pub user: String,

    /// Password; prompted on stdin when omitted
    #[arg(long)]
    pub password: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct UsersListArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct UsersShowArgs {
    pub user: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn authorize_accepts_device_fallbacks() {
        let cli = Cli::try_parse_from([
            "facegate",
            "--json",
            "authorize",
            "--user",
            "alice",
            "--device",
            "2",
            "--device",
            "/dev/video9",
        ])
        .unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Json);
        match cli.command {
            Commands::Authorize(args) => {
                assert_eq!(args.user, "alice");
                assert!(args.password.is_none());
                assert_eq!(args.capture.devices, vec!["2", "/dev/video9"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn users_show_takes_positional_name() {
        let cli = Cli::try_parse_from(["facegate", "-vv", "users", "show", "bob"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Users(UsersCommands::Show(args)) => assert_eq!(args.user, "bob"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
