// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static authorization tables: permission policies and field sensitivity.
//!
//! Parsing here is purely structural. Names are kept as strings and are
//! checked against the known permissions, flags and resource kinds when the
//! auth crate builds its runtime tables.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::sections::PolicyConfig;

const DEFAULT_POLICY: &str = include_str!("default_policy.toml");

/// One row of the permission table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionRuleConfig {
	pub permission: String,
	/// Roles that hold the permission outright.
	#[serde(default)]
	pub roles: Vec<String>,
	/// Roles that hold the permission only when affiliated with the target.
	#[serde(default)]
	pub affiliated_roles: Vec<String>,
}

/// Read requirement for one declared field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRuleConfig {
	#[serde(default)]
	pub permission: Option<String>,
	#[serde(default)]
	pub flags: Option<Vec<String>>,
	/// Resource kind of a nested object field.
	#[serde(default)]
	pub nested: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyTablesConfig {
	#[serde(default)]
	pub permissions: Vec<PermissionRuleConfig>,
	/// resource kind -> field name -> rule
	#[serde(default)]
	pub fields: BTreeMap<String, BTreeMap<String, FieldRuleConfig>>,
}

impl PolicyTablesConfig {
	pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(content)
	}
}

/// The tables compiled into the binary.
pub fn default_policy_tables() -> Result<PolicyTablesConfig, ConfigError> {
	PolicyTablesConfig::from_toml_str(DEFAULT_POLICY).map_err(|e| ConfigError::TomlParse {
		path: "<built-in default_policy.toml>".into(),
		source: e,
	})
}

/// Load the tables named by `config.file`, or the built-in ones.
pub fn load_policy_tables(config: &PolicyConfig) -> Result<PolicyTablesConfig, ConfigError> {
	let Some(path) = config.file.as_ref() else {
		debug!("using built-in policy tables");
		return default_policy_tables();
	};

	let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
		path: path.clone(),
		source: e,
	})?;
	let tables = PolicyTablesConfig::from_toml_str(&content).map_err(|e| ConfigError::TomlParse {
		path: path.clone(),
		source: e,
	})?;

	info!(
		path = %path.display(),
		permissions = tables.permissions.len(),
		resources = tables.fields.len(),
		"loaded policy tables"
	);
	Ok(tables)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn built_in_tables_parse() {
		let tables = default_policy_tables().unwrap();
		assert!(tables
			.permissions
			.iter()
			.any(|p| p.permission == "edit_reports"));
		let report = tables.fields.get("report").unwrap();
		assert_eq!(
			report.get("reporter_id").unwrap().permission.as_deref(),
			Some("view_reporter_identity")
		);
		assert_eq!(report.get("id").unwrap(), &FieldRuleConfig::default());
		let application = tables.fields.get("application").unwrap();
		assert_eq!(
			application.get("animal").unwrap().nested.as_deref(),
			Some("animal")
		);
	}

	#[test]
	fn file_replaces_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("policy.toml");
		std::fs::write(
			&path,
			r#"
[[permissions]]
permission = "view_reports"
roles = ["auditor"]
"#,
		)
		.unwrap();

		let tables = load_policy_tables(&PolicyConfig { file: Some(path) }).unwrap();
		assert_eq!(tables.permissions.len(), 1);
		assert_eq!(tables.permissions[0].roles, vec!["auditor".to_string()]);
		assert!(tables.permissions[0].affiliated_roles.is_empty());
		assert!(tables.fields.is_empty());
	}

	#[test]
	fn missing_file_is_an_error() {
		let config = PolicyConfig {
			file: Some("/nonexistent/paws/policy.toml".into()),
		};
		let err = load_policy_tables(&config).unwrap_err();
		assert!(matches!(err, ConfigError::FileRead { .. }));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = PolicyTablesConfig::from_toml_str(
			r#"
[fields.report]
id = { permision = "view_reports" }
"#,
		);
		assert!(err.is_err());
	}

	proptest! {
		/// Role lists survive parsing unchanged and in order.
		#[test]
		fn role_lists_parse_in_order(roles in prop::collection::vec("[a-z_]{1,12}", 0..6)) {
			let quoted: Vec<String> = roles.iter().map(|r| format!("\"{r}\"")).collect();
			let content = format!(
				"[[permissions]]\npermission = \"view_users\"\nroles = [{}]\n",
				quoted.join(", ")
			);
			let tables = PolicyTablesConfig::from_toml_str(&content).unwrap();
			prop_assert_eq!(&tables.permissions[0].roles, &roles);
		}
	}
}
