// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Location of the authorization tables.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
	/// Replaces the built-in tables when set.
	pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfigLayer {
	#[serde(default)]
	pub file: Option<PathBuf>,
}

impl PolicyConfigLayer {
	pub fn merge(&mut self, other: PolicyConfigLayer) {
		if other.file.is_some() {
			self.file = other.file;
		}
	}

	pub fn finalize(self) -> PolicyConfig {
		PolicyConfig { file: self.file }
	}
}
