//! `foundry-probe`: check that a chat-completions API accepts a
//! delegated-user token, or print such a token as JSON.
//!
//! Exit codes: `0` success, `1` probe or token failure, `2` settings missing
//! or invalid (clap uses `2` for usage errors as well).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use foundry_auth::Interaction;
use tracing_subscriber::EnvFilter;

mod probe;
mod report;
mod settings;
mod token;

use settings::{Settings, SettingsError, DEFAULT_CONFIG_FILE};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "foundry-probe")]
#[command(about = "Delegated-user token acquisition and chat-completions API probe")]
#[command(version)]
struct Cli {
    /// Settings file (KEY=value lines).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire a bearer token and send one chat-completion request.
    Probe(probe::ProbeArgs),
    /// Acquire a bearer token and print it as JSON.
    Token(token::TokenArgs),
}

/// Sign-in options shared by both subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct AuthArgs {
    /// Fail instead of opening a browser when no cached credential works.
    #[arg(long)]
    pub silent_only: bool,

    /// Username to pre-fill on the sign-in page.
    #[arg(long)]
    pub login_hint: Option<String>,
}

impl AuthArgs {
    /// Whether the interactive fallback is allowed.
    pub fn interaction(&self) -> Interaction {
        if self.silent_only {
            Interaction::Never
        } else {
            Interaction::Allowed
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Stdout is reserved for reports (and the token JSON).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(e) if e.downcast_ref::<SettingsError>().is_some() => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = Settings::load(&cli.config)?;
    match cli.command {
        Command::Probe(args) => probe::run(&settings, &args).await,
        Command::Token(args) => token::run(&settings, &args).await,
    }
}
