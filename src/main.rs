//! Lattice - A headless Matrix client.
//!
//! Lattice logs into a Matrix account, keeps an in-memory timeline of every
//! joined room and lets the user read and send messages from the console.
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! matrix:
//!   user_id: "@lattice:matrix.org"
//!   password: "your-password"
//!
//! settings:
//!   markdown: true
//!   typing_notifications: true
//! ```
//!
//! Any value can be overridden with an environment variable prefixed with
//! `LATTICE_`:
//!
//! ```bash
//! export LATTICE_MATRIX__PASSWORD="your-password"
//! ```
//!
//! # Usage
//!
//! ```bash
//! lattice --config config.yaml --data ./lattice-data
//! ```
//!
//! Type `/help` once started to list the console commands.
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use lattice::{app::App, config::Config};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: String,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain `session/`, holding the Matrix access
    /// token, the last sync token and the SQLite store. Restrict its
    /// permissions accordingly.
    #[arg(short, long)]
    data: String,
}

#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting lattice {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return;
        }
    };

    let app = match App::new(config, &args.data).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize lattice: {:?}", e);
            return;
        }
    };
    app.start().await;
}
