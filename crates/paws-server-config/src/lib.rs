// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Paws server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`PAWS_SERVER_*`)
//! - The static authorization tables (permission policies and field
//!   sensitivity), parsed from TOML and loaded once at startup
//!
//! # Usage
//!
//! ```ignore
//! use paws_server_config::{load_config, load_policy_tables};
//!
//! let config = load_config()?;
//! let tables = load_policy_tables(&config.policy)?;
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
pub mod tables;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use tables::{
	default_policy_tables, load_policy_tables, FieldRuleConfig, PermissionRuleConfig,
	PolicyTablesConfig,
};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub auth: AuthConfig,
	pub logging: LoggingConfig,
	pub policy: PolicyConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`PAWS_SERVER_*`)
/// 2. Config file (`/etc/paws/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let policy = layer.policy.unwrap_or_default().finalize();

	validate_config(&auth)?;

	info!(
		host = %http.host,
		port = http.port,
		dev_mode = auth.dev_mode,
		policy_file = ?policy.file,
		"configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		auth,
		logging,
		policy,
	})
}

fn validate_config(auth: &AuthConfig) -> Result<(), ConfigError> {
	if auth.dev_mode && auth.is_production() {
		return Err(ConfigError::Validation(
			"dev mode authentication must not be enabled in production".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_finalize() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
		assert!(!config.auth.dev_mode);
		assert!(config.policy.file.is_none());
	}

	#[test]
	fn dev_mode_in_production_is_rejected() {
		let layer = ServerConfigLayer {
			auth: Some(AuthConfigLayer {
				dev_mode: Some(true),
				environment: Some("production".to_string()),
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn file_layer_overrides_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("server.toml");
		std::fs::write(
			&path,
			r#"
[http]
port = 9000

[database]
url = "sqlite:/var/lib/paws/paws.db"

[policy]
file = "/etc/paws/policy.toml"
"#,
		)
		.unwrap();

		let mut merged = ServerConfigLayer::default();
		merged.merge(DefaultsSource.load().unwrap());
		merged.merge(TomlSource::new(&path).load().unwrap());
		let config = finalize(merged).unwrap();

		assert_eq!(config.http.port, 9000);
		assert_eq!(config.database.url, "sqlite:/var/lib/paws/paws.db");
		assert_eq!(
			config.policy.file.as_deref(),
			Some(std::path::Path::new("/etc/paws/policy.toml"))
		);
	}
}
