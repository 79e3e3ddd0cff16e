use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "fw-backend")]
#[command(about = "Translate compiled firewall IR into target configurations")]
pub struct Cli {
    /// Target language id (e.g. IPTABLES, JUNOS), or `list` to show every target.
    pub target: String,
    /// Working directory holding the compiled IR; generated files go to its output directory.
    pub directory: Option<PathBuf>,
    /// Optional layout TOML overriding artifact directories and file names.
    #[arg(long)]
    pub layout: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
