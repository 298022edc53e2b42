// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LoggingConfigLayer, PolicyConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/paws/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: PAWS_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_vars(|name| std::env::var(name).ok())
	}
}

fn layer_from_vars<F>(get: F) -> Result<ServerConfigLayer, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let var = |name: &str| get(name).filter(|s| !s.is_empty());
	let flag = |name: &str| var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1");
	let port = match var("PAWS_SERVER_HTTP_PORT") {
		Some(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
			key: "PAWS_SERVER_HTTP_PORT".to_string(),
			message: format!("invalid u16 value '{v}'"),
		})?),
		None => None,
	};

	Ok(ServerConfigLayer {
		http: Some(HttpConfigLayer {
			host: var("PAWS_SERVER_HTTP_HOST"),
			port,
		}),
		database: Some(DatabaseConfigLayer {
			url: var("PAWS_SERVER_DATABASE_URL"),
		}),
		auth: Some(AuthConfigLayer {
			dev_mode: flag("PAWS_SERVER_AUTH_DEV_MODE"),
			environment: var("PAWS_SERVER_AUTH_ENVIRONMENT"),
		}),
		logging: Some(LoggingConfigLayer {
			level: var("PAWS_SERVER_LOGGING_LEVEL"),
			json: flag("PAWS_SERVER_LOGGING_JSON"),
		}),
		policy: Some(PolicyConfigLayer {
			file: var("PAWS_SERVER_POLICY_FILE").map(PathBuf::from),
		}),
	})
}
