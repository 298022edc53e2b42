// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
	/// Build principals from `x-dev-*` headers instead of an upstream
	/// authentication layer. Never allowed in production.
	pub dev_mode: bool,
	pub environment: String,
}

impl AuthConfig {
	pub fn is_production(&self) -> bool {
		self.environment.eq_ignore_ascii_case("production")
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub dev_mode: Option<bool>,
	#[serde(default)]
	pub environment: Option<String>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.dev_mode.is_some() {
			self.dev_mode = other.dev_mode;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			dev_mode: self.dev_mode.unwrap_or(false),
			environment: self.environment.unwrap_or_else(|| "development".to_string()),
		}
	}
}
