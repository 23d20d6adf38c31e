use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use quill_store::file::POSTS_FILE;
use quill_server::{AppState, QuillServer, ServerConfig, StorageBackend};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => cmd_serve(apply_serve_args(config, args)).await,
        Command::Config(_) => cmd_config(&config),
        Command::Check(_) => cmd_check(config),
    }
}

/// Defaults, then the optional TOML file, then `QUILL_*` variables.
fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let base = match path {
        Some(path) => ServerConfig::from_toml_file(path)?,
        None => ServerConfig::default(),
    };
    Ok(base.with_env()?)
}

fn apply_serve_args(mut config: ServerConfig, args: ServeArgs) -> ServerConfig {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.upload_dir {
        config.upload_dir = dir;
    }
    if args.memory {
        config.storage = StorageBackend::Memory;
    }
    config
}

async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    if config.storage == StorageBackend::Memory {
        tracing::warn!("posts are kept in memory and will be lost on exit");
    }
    let server = QuillServer::new(config).context("failed to open post store")?;
    println!(
        "{} Quill on {} (login required to: {})",
        "▶".green().bold(),
        server.config().bind_addr.to_string().bold(),
        gated_list(server.config()).yellow(),
    );
    server.serve().await?;
    Ok(())
}

fn cmd_config(config: &ServerConfig) -> anyhow::Result<()> {
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}

fn cmd_check(config: ServerConfig) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    let storage = match config.storage {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::JsonFile => config.data_dir.join(POSTS_FILE).display().to_string(),
    };
    let state = AppState::from_config(config).context("failed to open post store")?;
    let count = state.posts.len()?;
    println!("{} Configuration valid", "✓".green().bold());
    println!("  Storage: {}", storage.cyan());
    println!("  Posts: {}", count.to_string().bold());
    println!("  Uploads: {}", state.uploads.dir().display());
    println!("  Login required to: {}", gated_list(&state.config).yellow());
    Ok(())
}

fn gated_list(config: &ServerConfig) -> String {
    let gated: Vec<String> = config.policy.gated().iter().map(ToString::to_string).collect();
    if gated.is_empty() {
        "nothing".into()
    } else {
        gated.join(", ")
    }
}
