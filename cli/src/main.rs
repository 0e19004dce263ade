//! # orgboard-cli
//!
//! Command-line client for Orgboard: browse organizations, boards, tasks,
//! users and parties, and chat in rooms.
//!
//! ## Commands
//!
//! - `ob auth login` - Sign in and store the token
//! - `ob list <resource>` - Search, sort and page through a list
//! - `ob board use <id>` - Remember the board `articles`/`tasks` default to
//! - `ob chat join <room-id>` - Join a chat room
//!
//! See `ob --help` for the full command reference.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::process;

mod commands;
mod config;
mod telemetry;
mod ui;

#[derive(Parser)]
#[command(name = "ob")]
#[command(about = "Orgboard CLI - browse lists and chat from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to orgboard.toml configuration file
    #[arg(short, long, global = true, default_value = "orgboard.toml")]
    config: String,

    /// Output as JSON (machine-readable format)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommands),

    /// List organizations, articles, tasks, users or parties
    List(commands::list::ListArgs),

    /// Board selection commands
    #[command(subcommand)]
    Board(BoardCommands),

    /// Chat commands
    #[command(subcommand)]
    Chat(ChatCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Register a new account
    Register,

    /// Sign in and store the token on this device
    Login,

    /// Remove the stored token
    Logout,

    /// Show whether a token is stored (local only)
    Status,
}

#[derive(Subcommand)]
enum BoardCommands {
    /// Remember a board as the default for articles and tasks
    Use {
        /// Board id
        board_id: i64,
    },

    /// Print the remembered board
    Current,
}

#[derive(Subcommand)]
enum ChatCommands {
    /// List chat rooms
    Rooms,

    /// Join a room: print history, stream new messages, send stdin lines
    Join {
        /// Room id
        room_id: i64,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Validate the configuration file
    Validate,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "ob", &mut io::stdout());
        return;
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    telemetry::init(&telemetry::LogConfig {
        verbose: cli.verbose,
        json_logs: cli.log_json,
    })?;

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let mut ctx = commands::Context::new(&cli.config, cli.json)?;
    let result = runtime.block_on(dispatch(&ctx, command));

    if ctx.sign_in_required() {
        ui::print_warning("Your session has expired. Run 'ob auth login' to sign in again.");
    }
    result
}

async fn dispatch(ctx: &commands::Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Auth(auth_cmd) => match auth_cmd {
            AuthCommands::Register => commands::auth::register(ctx).await,
            AuthCommands::Login => commands::auth::login(ctx).await,
            AuthCommands::Logout => commands::auth::logout(ctx),
            AuthCommands::Status => commands::auth::status(ctx),
        },
        Commands::List(args) => commands::list::list(ctx, args).await,
        Commands::Board(board_cmd) => match board_cmd {
            BoardCommands::Use { board_id } => commands::board::use_board(ctx, board_id),
            BoardCommands::Current => commands::board::current(ctx),
        },
        Commands::Chat(chat_cmd) => match chat_cmd {
            ChatCommands::Rooms => commands::chat::rooms(ctx).await,
            ChatCommands::Join { room_id } => commands::chat::join(ctx, room_id).await,
        },
        Commands::Config(ConfigCommands::Validate) => validate_config(&ctx.config_path),
    }
}

fn validate_config(path: &str) -> anyhow::Result<()> {
    match config::OrgboardConfig::load_optional(path)? {
        Some(_) => ui::print_success(&format!("{} is valid", path)),
        None => ui::print_warning(&format!("{} not found, using defaults", path)),
    }
    Ok(())
}
