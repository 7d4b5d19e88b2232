use clap::Parser;
use std::path::PathBuf;

/// Multi-agent natural-language to SQL service
#[derive(Parser, Debug, Clone)]
#[command(name = "datacrew", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "DATACREW_CONFIG", default_value = "datacrew.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "DATACREW_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "DATACREW_PORT")]
    pub port: Option<u16>,

    /// Run the full agent pipeline for one query and exit instead of serving HTTP
    #[arg(long)]
    pub prompt: Option<String>,

    /// Answer the prompt with the hosted assistant instead of agent teams
    #[arg(long, requires = "prompt")]
    pub assistant: bool,

    /// Root directory for per-session results
    #[arg(long, env = "DATACREW_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}
