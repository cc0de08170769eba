use std::path::PathBuf;

use clap::Parser;
use tracing::metadata::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    #[arg(short, long, default_value_t = String::from("/etc/runtime-conformance/config.yaml"))]
    config: String,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    #[arg(long)]
    print_debug_info: bool,
}

impl Cli {
    /// Parses command line arguments
    pub fn init_runtime_conformance_cli() -> Self {
        Self::parse()
    }

    pub fn get_config(&self) -> PathBuf {
        PathBuf::from(&self.config)
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn print_debug_info(&self) -> bool {
        self.print_debug_info
    }
}
