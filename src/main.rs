use anyhow::{Context, Result};
use clap::Parser;
use secrecy::ExposeSecret;
use std::path::PathBuf;

use gator::commands::{self, Command, State};
use gator::config::{self, Config, ConfigError};
use gator::storage::Database;

#[derive(Parser, Debug)]
#[command(
    name = "gator",
    about = "RSS aggregator: register feeds, poll them into SQLite, browse the posts"
)]
struct Args {
    /// Config file to use instead of ~/.gatorconfig.json
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command to run (register, login, users, reset, agg, addfeed, feeds,
    /// follow, unfollow, following, browse)
    command: String,

    /// Arguments for the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => config::default_path()?,
    };
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e @ ConfigError::NotFound(_)) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("Create it with, for example:");
            eprintln!(r#"  {{"db_url": "sqlite:gator.db"}}"#);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    let db = Database::open(config.db_url.expose_secret())
        .await
        .context("Failed to open database")?;

    let registry = commands::builtin();
    let command = Command::new(args.command, args.args);
    let mut state = State { db, config };

    registry.run(&mut state, &command).await
}
