// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static permission table: permission -> direct roles and affiliated roles.
//!
//! Built once at startup from [`PermissionRuleConfig`] rows. Every name is
//! validated while building, so lookups at request time cannot fail.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use paws_server_config::PermissionRuleConfig;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::types::{Permission, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
	pub permission: Permission,
	pub roles: BTreeSet<Role>,
	pub affiliated_roles: BTreeSet<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
	policies: HashMap<Permission, Policy>,
}

fn empty_roles() -> &'static BTreeSet<Role> {
	static EMPTY: OnceLock<BTreeSet<Role>> = OnceLock::new();
	EMPTY.get_or_init(BTreeSet::new)
}

impl PolicyTable {
	pub fn from_config(rows: &[PermissionRuleConfig]) -> Result<Self, AuthError> {
		let mut policies = HashMap::with_capacity(rows.len());
		for row in rows {
			let permission: Permission = row.permission.parse()?;
			let policy = Policy {
				permission,
				roles: row.roles.iter().map(|r| Role::new(r.as_str())).collect(),
				affiliated_roles: row
					.affiliated_roles
					.iter()
					.map(|r| Role::new(r.as_str()))
					.collect(),
			};
			if policies.insert(permission, policy).is_some() {
				return Err(AuthError::Configuration(format!(
					"permission '{permission}' is listed more than once"
				)));
			}
		}

		for permission in Permission::all() {
			if !policies.contains_key(permission) {
				warn!(permission = %permission, "permission has no policy; no role holds it");
			}
		}

		info!(policies = policies.len(), "policy table loaded");
		Ok(Self { policies })
	}

	pub fn from_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
		Self {
			policies: policies.into_iter().map(|p| (p.permission, p)).collect(),
		}
	}

	pub fn get(&self, permission: Permission) -> Option<&Policy> {
		self.policies.get(&permission)
	}

	/// Roles holding `permission` directly.
	pub fn roles_for(&self, permission: Permission) -> &BTreeSet<Role> {
		self
			.policies
			.get(&permission)
			.map(|p| &p.roles)
			.unwrap_or_else(|| empty_roles())
	}

	/// Roles holding `permission` only when affiliated with the target.
	pub fn affiliated_roles_for(&self, permission: Permission) -> &BTreeSet<Role> {
		self
			.policies
			.get(&permission)
			.map(|p| &p.affiliated_roles)
			.unwrap_or_else(|| empty_roles())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(permission: &str, roles: &[&str], affiliated: &[&str]) -> PermissionRuleConfig {
		PermissionRuleConfig {
			permission: permission.to_string(),
			roles: roles.iter().map(|s| s.to_string()).collect(),
			affiliated_roles: affiliated.iter().map(|s| s.to_string()).collect(),
		}
	}

	#[test]
	fn lookups_return_configured_roles() {
		let table = PolicyTable::from_config(&[row(
			"view_reports",
			&["admin", "moderator"],
			&["shelter_staff"],
		)])
		.unwrap();

		assert!(table
			.roles_for(Permission::ViewReports)
			.contains(&Role::from("moderator")));
		assert_eq!(
			table.affiliated_roles_for(Permission::ViewReports),
			&BTreeSet::from([Role::from("shelter_staff")])
		);
	}

	#[test]
	fn unlisted_permission_has_no_roles() {
		let table = PolicyTable::from_config(&[]).unwrap();
		assert!(table.roles_for(Permission::EditUsers).is_empty());
		assert!(table.affiliated_roles_for(Permission::EditUsers).is_empty());
	}

	#[test]
	fn unknown_permission_fails_at_load() {
		let err = PolicyTable::from_config(&[row("edit_galaxies", &["admin"], &[])]).unwrap_err();
		assert!(matches!(err, AuthError::Configuration(_)));
	}

	#[test]
	fn duplicate_permission_fails_at_load() {
		let err = PolicyTable::from_config(&[
			row("view_users", &["admin"], &[]),
			row("view_users", &["moderator"], &[]),
		])
		.unwrap_err();
		assert!(matches!(err, AuthError::Configuration(_)));
	}

	#[test]
	fn built_in_tables_are_valid() {
		let tables = paws_server_config::default_policy_tables().unwrap();
		let table = PolicyTable::from_config(&tables.permissions).unwrap();
		for permission in Permission::all() {
			assert!(table.get(*permission).is_some(), "{permission} missing");
		}
	}
}
