use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Address to listen on (default: 0.0.0.0 with the port from `PORT`).
    #[arg(long)]
    pub addr: Option<SocketAddr>,

    /// Static web assets directory (served if it exists).
    #[arg(long, default_value = "public")]
    pub public_dir: PathBuf,

    /// Environment file to load instead of `./.env`.
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}
