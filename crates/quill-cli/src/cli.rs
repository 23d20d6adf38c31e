use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill — a small blog server with posts, likes, and comments",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file, applied before QUILL_* environment variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration (secrets redacted)
    Config(ConfigArgs),
    /// Validate configuration and open the post store
    Check(CheckArgs),
}

#[derive(Args, Default)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,
    /// Keep posts in memory only
    #[arg(long)]
    pub memory: bool,
}

#[derive(Args)]
pub struct ConfigArgs {}

#[derive(Args)]
pub struct CheckArgs {}
