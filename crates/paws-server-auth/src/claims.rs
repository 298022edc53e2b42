// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Claim extraction from a verified principal.
//!
//! The upstream authentication layer verifies the caller and hands over the
//! claim map. Only three claims are read:
//!
//! - `sub`: the user id, a UUID string (required)
//! - `roles`: an array of role names, or a single role name
//! - `scope`: space-separated permission names

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::types::{Permission, Role, UserId};

pub const SUBJECT_CLAIM: &str = "sub";
pub const ROLES_CLAIM: &str = "roles";
pub const SCOPE_CLAIM: &str = "scope";

/// Claims of an already-verified caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(Map<String, Value>);

impl Principal {
	pub fn new(claims: Map<String, Value>) -> Self {
		Self(claims)
	}

	/// Principal with `sub` and `roles` set.
	pub fn for_user<I, R>(user_id: UserId, roles: I) -> Self
	where
		I: IntoIterator<Item = R>,
		R: Into<String>,
	{
		let mut claims = Map::new();
		claims.insert(SUBJECT_CLAIM.to_string(), Value::String(user_id.to_string()));
		claims.insert(
			ROLES_CLAIM.to_string(),
			Value::Array(roles.into_iter().map(|r| Value::String(r.into())).collect()),
		);
		Self(claims)
	}

	pub fn with_scope<I>(mut self, permissions: I) -> Self
	where
		I: IntoIterator<Item = Permission>,
	{
		let scope = permissions
			.into_iter()
			.map(|p| p.as_str())
			.collect::<Vec<_>>()
			.join(" ");
		self.0.insert(SCOPE_CLAIM.to_string(), Value::String(scope));
		self
	}

	pub fn claim(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}
}

/// What the authorization pipeline knows about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
	pub user_id: UserId,
	pub roles: BTreeSet<Role>,
	pub permissions: BTreeSet<Permission>,
}

/// Extract the user id. Fails when there is no principal or `sub` is absent
/// or not a UUID.
pub fn extract_user_id(principal: Option<&Principal>) -> Result<UserId, AuthError> {
	let principal =
		principal.ok_or_else(|| AuthError::Authentication("no verified principal".to_string()))?;
	let sub = principal
		.claim(SUBJECT_CLAIM)
		.and_then(Value::as_str)
		.ok_or_else(|| AuthError::Authentication("missing subject claim".to_string()))?;
	sub
		.parse()
		.map_err(|_| AuthError::Authentication("malformed subject claim".to_string()))
}

pub fn extract_roles(principal: &Principal) -> BTreeSet<Role> {
	match principal.claim(ROLES_CLAIM) {
		Some(Value::String(role)) => std::iter::once(Role::new(role.as_str())).collect(),
		Some(Value::Array(values)) => values
			.iter()
			.filter_map(Value::as_str)
			.map(Role::from)
			.collect(),
		_ => BTreeSet::new(),
	}
}

/// Permission names from `scope`. Names this build does not know are skipped.
pub fn extract_permissions(principal: &Principal) -> BTreeSet<Permission> {
	let Some(scope) = principal.claim(SCOPE_CLAIM).and_then(Value::as_str) else {
		return BTreeSet::new();
	};
	scope
		.split_whitespace()
		.filter_map(|name| match name.parse::<Permission>() {
			Ok(permission) => Some(permission),
			Err(_) => {
				tracing::debug!(scope = name, "ignoring unknown scope entry");
				None
			}
		})
		.collect()
}

pub fn extract_claims(principal: Option<&Principal>) -> Result<Claims, AuthError> {
	let user_id = extract_user_id(principal)?;
	// extract_user_id already rejected the None case.
	let (roles, permissions) = principal
		.map(|p| (extract_roles(p), extract_permissions(p)))
		.unwrap_or_default();
	Ok(Claims {
		user_id,
		roles,
		permissions,
	})
}
