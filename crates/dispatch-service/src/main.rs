//! Main entry point for the dispatch order-intake service.
//!
//! This binary wires storage, geocoding, routing, pricing, and the dialog
//! router from a TOML configuration file, then serves chat events until
//! interrupted. The console transport stands in for a platform adapter,
//! which connects through the same `ChatTransport` seam in deployment.

use clap::Parser;
use dispatch_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod builder;
mod engine;
mod transport;

use engine::DispatchService;
use transport::ConsoleTransport;

/// Command-line arguments for the dispatch service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
	fmt().with_env_filter(env_filter).with_target(true).init();

	let config = Config::from_file_async(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let router = builder::build_router(&config)?;
	let service = DispatchService::new(router, Arc::new(ConsoleTransport::new()));

	tokio::select! {
		_ = service.run() => {
			tracing::info!("Transport closed");
		}
		result = tokio::signal::ctrl_c() => {
			result?;
			tracing::info!("Interrupt received");
		}
	}

	tracing::info!("Stopped dispatch service");
	Ok(())
}
