#![forbid(unsafe_code)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use triage_lib::{config::load_from_path, server};

#[derive(Parser, Debug)]
#[command(author, version, about = "Admission-control front for the clinic API")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/triage.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match load_from_path(&cli.config) {
        Ok(cfg) => {
            init_tracing(&cfg.logging.level, cfg.logging.show_target);
            info!(?cfg.listen, gate_enabled = cfg.gate.enabled, "configuration loaded");
            let cfg = Arc::new(cfg);
            if let Err(err) = server::run(cfg.clone()).await {
                error!(%err, "admission server exited with error");
                std::process::exit(1);
            }
        }
        Err(err) => {
            init_tracing("info", false);
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    }
}

fn init_tracing(default_level: &str, show_target: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(show_target)
        .init();
}
