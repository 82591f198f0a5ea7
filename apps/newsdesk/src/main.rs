mod commands;
mod config;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    auth::token_from_launch_url,
    store::JsonFileStore,
    AppContext, BearerToken, HttpNewsdeskClient, NewsdeskApi,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "newsdesk", version, about = "Operator console for the news pipeline backend")]
struct Args {
    /// Config file; defaults to ./newsdesk.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Launch address carrying `?bearer=<token>`.
    #[arg(long, global = true)]
    launch_url: Option<Url>,
    #[arg(long, global = true, env = "NEWSDESK_BEARER", hide_env_values = true)]
    bearer: Option<String>,
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    settings.apply_flags(args.base_url.as_deref(), args.data_dir.clone())?;
    std::fs::create_dir_all(&settings.data_dir).with_context(|| {
        format!(
            "failed to create data directory '{}'",
            settings.data_dir.display()
        )
    })?;

    let launch_token = match (&args.launch_url, &args.bearer) {
        (Some(url), _) => token_from_launch_url(url),
        (None, Some(raw)) => BearerToken::new(raw),
        (None, None) => None,
    };
    let session = JsonFileStore::new(settings.session_path());
    let preferences = Arc::new(JsonFileStore::new(settings.preferences_path()));
    let ctx = AppContext::initialize(settings.client.clone(), launch_token, &session, preferences)
        .context("failed to initialize application context")?;

    let client = HttpNewsdeskClient::from_context(&ctx)?;
    info!(
        command = args.command.name(),
        base_url = client.base_url(),
        session = %session.path().display(),
        "newsdesk: running command"
    );
    let api: Arc<dyn NewsdeskApi> = Arc::new(client);

    let succeeded = commands::execute(args.command, &ctx, api).await?;
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
