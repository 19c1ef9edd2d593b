//! `federation-broker` server binary.

// std
use std::path::PathBuf;
// crates.io
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
// self
use federation_broker::{
	config::BrokerConfig,
	flows::Broker,
	web::{self, AppState},
};

#[derive(Debug, Parser)]
#[command(version, about = "Federated sign-in adapter for OAuth 2.0, OIDC, and SAML 2.0.")]
struct Cli {
	/// Path to the TOML configuration file.
	#[arg(short, long, env = "FEDERATION_BROKER_CONFIG", default_value = "federation-broker.toml")]
	config: PathBuf,
	/// Emit logs as JSON lines.
	#[arg(long, env = "FEDERATION_BROKER_LOG_JSON")]
	log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();

	init_tracing(cli.log_json);

	let config = BrokerConfig::from_file(&cli.config)
		.wrap_err_with(|| format!("failed to load {}", cli.config.display()))?;
	let (registry, settings, server) = config.into_parts()?;
	let environments = registry.len();
	let broker = Broker::new(registry, settings)?;
	let router = web::router(AppState::new(broker, server.public_scheme.as_str()));
	let addr = server.socket_addr();
	let listener = TcpListener::bind(addr).await.wrap_err_with(|| format!("failed to bind {addr}"))?;

	tracing::info!(%addr, environments, "Federation broker listening.");

	web::serve(listener, router).await?;

	Ok(())
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry().with(filter);

	if json {
		registry.with(tracing_subscriber::fmt::layer().json()).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}
