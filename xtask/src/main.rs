use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use gait_core::auth::LOGIN_PATH;
use gait_core::conversation::{HISTORY_PATH, SEND_PROMPT_PATH};
use gait_core::mock::{mint_token, MockBackend};
use gait_core::{telemetry, ApiResponse, Clock, GaitClient, MemoryTokenStore, SystemClock};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for GAIT")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in, load history and ask one question against an in-process backend.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let backend = MockBackend::new();
    let token = mint_token("smoke@gait.local", SystemClock.now() + Duration::hours(1));
    backend.reply(LOGIN_PATH, ApiResponse::new(200, token));
    backend.reply(HISTORY_PATH, ApiResponse::new(200, "[]"));
    backend.reply(SEND_PROMPT_PATH, ApiResponse::new(200, "pong"));

    let client = GaitClient::new(
        Arc::new(backend.clone()),
        Arc::new(MemoryTokenStore::new()),
        Arc::new(SystemClock),
    );

    runtime
        .block_on(client.session().login("smoke@gait.local", "smoke"))
        .context("smoke login")?;
    runtime
        .block_on(client.conversations().ensure_history())
        .context("smoke history")?;
    let entry = runtime
        .block_on(client.conversations().send_prompt("ping from xtask"))
        .context("smoke prompt")?;
    let history = client.conversations().history();
    if history.first() != Some(&entry) {
        bail!("answered prompt missing from history");
    }

    info!(
        answer = %entry.answer,
        history = history.len(),
        requests = backend.request_count(),
        "smoke test passed"
    );
    Ok(())
}

