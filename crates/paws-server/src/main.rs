// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Paws server binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use paws_server::{create_router, state::build_policy, AppState};
use paws_server_config::{load_config, load_config_with_file, load_policy_tables, LoggingConfig};
use paws_server_db::{create_pool, migrate, DocumentStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Paws server - authorization-aware API for the adoption platform.
#[derive(Parser, Debug)]
#[command(name = "paws-server", about = "Paws adoption platform server", version)]
struct Args {
	/// Config file; defaults to /etc/paws/server.toml.
	#[arg(long, env = "PAWS_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Validate the policy tables and exit.
	CheckPolicy,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);
	if logging.json {
		registry.with(tracing_subscriber::fmt::layer().json()).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => load_config_with_file(path),
		None => load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config.logging);

	let tables = load_policy_tables(&config.policy).context("failed to load policy tables")?;

	if let Some(Command::CheckPolicy) = args.command {
		build_policy(&tables).context("policy tables are invalid")?;
		println!(
			"policy ok: {} permission rules, {} resources",
			tables.permissions.len(),
			tables.fields.len()
		);
		return Ok(());
	}

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting paws-server"
	);

	let pool = create_pool(&config.database.url)
		.await
		.context("failed to open database")?;
	migrate(&pool).await.context("failed to run migrations")?;

	let state = AppState::bootstrap(DocumentStore::new(pool), &tables, config.auth.dev_mode)
		.context("failed to initialise application state")?;
	if state.dev_mode {
		tracing::warn!("dev mode enabled: principals are read from x-dev-* headers");
	}

	let app = create_router(state);
	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!(%addr, "listening");

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	tracing::info!("server shutdown complete");
	Ok(())
}
