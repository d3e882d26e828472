use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use cinder_http::{HttpServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "cinderd", about = "Single-threaded HTTP/1.1 file server")]
struct Args {
    /// Path to a YAML config file. When absent, built-in defaults are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Overrides the configured port.
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match ServerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to load config");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let mut server = match HttpServer::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to bind server");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run() {
        error!(error = %e, "server loop exited");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
