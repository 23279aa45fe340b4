use std::{path::PathBuf, sync::OnceLock};

use clap::Parser;

/// Control and watch the containers on this host from Telegram.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the config file. A missing file is treated as empty.
    #[arg(short, long, default_value = "dockgram.toml")]
    pub config: PathBuf,
    /// Environment file loaded before the configuration is read.
    #[arg(short, long, default_value = ".env")]
    pub env_file: PathBuf,
}

static ARGS: OnceLock<Args> = OnceLock::new();

pub fn get_cli_args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}
