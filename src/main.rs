mod aggregate;
mod collectors;
mod config;
mod http;
mod metrics;
mod shortcuts;
mod snapshot;

use aggregate::Aggregator;
use axum::serve;
use clap::Parser;
use collectors::system::SysinfoSource;
use config::Config;
use metrics::Metrics;
use shortcuts::ShortcutStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[derive(Parser, Debug)]
#[command(name = "dashd")]
#[command(version)]
#[command(about = "Self-hosted server dashboard with a shortcut list")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Overrides `listen` from the config file.
    #[arg(long)]
    listen: Option<String>,
    /// Overrides `shortcuts_file` from the config file.
    #[arg(long)]
    shortcuts_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) if err.is_missing_file() && cli.config == DEFAULT_CONFIG_PATH => {
            warn!(path = %cli.config, "config file not found, using defaults");
            Config::default()
        }
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Some(path) = cli.shortcuts_file {
        cfg.shortcuts_file = path;
    }
    if let Err(err) = cfg.validate() {
        error!(error = %err, "invalid configuration");
        std::process::exit(1);
    }

    info!(
        listen = %cfg.listen,
        shortcuts_file = %cfg.shortcuts_file.display(),
        nvidia_smi = cfg.gpu.nvidia_smi,
        "starting dashd"
    );

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let source = Arc::new(SysinfoSource::new(cfg.gpu.nvidia_smi));
    let state = http::HttpAppState {
        aggregator: Arc::new(Aggregator::new(source)),
        store: Arc::new(ShortcutStore::new(cfg.shortcuts_file.clone())),
        metrics,
    };
    let app = http::build_router(state);

    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, listen = %addr, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    let server = serve(listener, app).with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to wait for Ctrl+C");
        }
        info!("received Ctrl+C, shutting down");
    });

    if let Err(err) = server.await {
        error!(error = %err, "HTTP server error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_overrides_parse() {
        let cli = Cli::parse_from([
            "dashd",
            "--listen",
            "0.0.0.0:8080",
            "--shortcuts-file",
            "/tmp/s.json",
        ]);
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert_eq!(cli.listen.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(cli.shortcuts_file, Some(PathBuf::from("/tmp/s.json")));
    }
}
