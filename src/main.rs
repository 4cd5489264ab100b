//! Taskboard server
//!
//! Task-management backend: task lifecycle, activity logs, goal tracking,
//! and dashboard aggregation over HTTP/JSON.

use anyhow::{bail, Result};
use clap::Parser;
use taskboard::auth::TokenSigner;
use taskboard::cli::{Cli, Command};
use taskboard::config::Config;
use taskboard::db::Database;
use taskboard::http::{serve, AppState};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "taskboard=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.server.db_path = database;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    debug!(db_path = %config.server.db_path.display(), "configuration loaded");

    let db = Database::open(&config.server.db_path)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = AppState::new(db, &config);
            serve(state, config.server.port).await?;
        }
        Command::Token(args) => {
            let Some(user) = db.get_user(&args.user_id)? else {
                bail!("unknown user: {}", args.user_id);
            };
            let signer = TokenSigner::new(&config.auth);
            let token = signer
                .sign(&user.id, user.email.as_deref(), user.is_admin)
                .map_err(anyhow::Error::from)?;
            println!("{}", token);
        }
    }

    Ok(())
}
