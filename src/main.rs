//! Binary entry point: parses the `--config` flag, then sequences the three
//! steps [`app`] exposes - load configuration, build the domain tracker,
//! spawn the worker pool - and waits for `ctrl_c` before shutting down.
#![forbid(unsafe_code)]

use clap::Parser;
use torrust_udp_tracker::{app, logging};

#[derive(Parser, Debug)]
#[command(author, version, about = "A BitTorrent UDP tracker (BEP-15).", long_about = None)]
struct Args {
    /// Path to a `tracker.toml` configuration file. When omitted, only the
    /// compiled-in defaults and environment variable overrides apply.
    #[arg(short, long, env = "TORRUST_TRACKER_UDP_CONFIG_TOML_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match app::configure(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("torrust-udp-tracker: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.log_level);

    let tracker = app::tracker(&config);

    let launcher = match app::start(&config, tracker).await {
        Ok(launcher) => launcher,
        Err(e) => {
            tracing::error!(err = %e, "failed to start");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %launcher.local_addr(), "running, press ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(err = %e, "failed to listen for ctrl-c, shutting down anyway");
    }

    launcher.shutdown().await;
}
