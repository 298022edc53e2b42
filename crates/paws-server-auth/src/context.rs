// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request authorization snapshot and its builder.

use std::collections::BTreeSet;

use crate::claims::{extract_claims, Principal};
use crate::error::AuthError;
use crate::policy::PolicyTable;
use crate::resource::{AffiliatedResource, OwnedResource, ResourceResolver, ResourceTarget};
use crate::types::{Permission, Role, UserId};

/// Immutable once built. Created at the start of an operation and dropped at
/// the end of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
	user_id: UserId,
	roles: BTreeSet<Role>,
	permissions: BTreeSet<Permission>,
	owned: Option<OwnedResource>,
	affiliated: Option<AffiliatedResource>,
}

impl AuthContext {
	pub fn user_id(&self) -> UserId {
		self.user_id
	}

	pub fn roles(&self) -> &BTreeSet<Role> {
		&self.roles
	}

	/// Permission names carried in the caller's `scope` claim. Informational;
	/// decisions go through the policy table.
	pub fn permissions(&self) -> &BTreeSet<Permission> {
		&self.permissions
	}

	pub fn owned(&self) -> Option<&OwnedResource> {
		self.owned.as_ref()
	}

	pub fn affiliated(&self) -> Option<&AffiliatedResource> {
		self.affiliated.as_ref()
	}
}

/// Fluent builder producing exactly one [`AuthContext`].
///
/// ```ignore
/// let ctx = authz
///     .context(principal)
///     .owned_from(target, [report.reporter_id])
///     .affiliated_with(target, Permission::ViewReports, None)
///     .build()?;
/// ```
#[must_use]
pub struct AuthContextBuilder<'a> {
	policy: &'a PolicyTable,
	principal: Option<&'a Principal>,
	owned: Option<PendingOwner>,
	affiliated: Option<AffiliatedResource>,
}

struct PendingOwner {
	target: ResourceTarget,
	owner_ids: Option<Vec<UserId>>,
}

impl<'a> AuthContextBuilder<'a> {
	pub fn new(policy: &'a PolicyTable, principal: Option<&'a Principal>) -> Self {
		Self {
			policy,
			principal,
			owned: None,
			affiliated: None,
		}
	}

	/// The target is owned by `owner_ids`.
	pub fn owned_from<I>(mut self, target: ResourceTarget, owner_ids: I) -> Self
	where
		I: IntoIterator<Item = UserId>,
	{
		self.owned = Some(PendingOwner {
			target,
			owner_ids: Some(owner_ids.into_iter().collect()),
		});
		self
	}

	/// The target is owned by the caller.
	pub fn owned_by_caller(mut self, target: ResourceTarget) -> Self {
		self.owned = Some(PendingOwner {
			target,
			owner_ids: None,
		});
		self
	}

	/// Holders of `roles` are affiliated with the target. `None` takes the
	/// affiliated roles configured for `permission`.
	pub fn affiliated_with(
		mut self,
		target: ResourceTarget,
		permission: Permission,
		roles: Option<Vec<Role>>,
	) -> Self {
		self.affiliated = Some(ResourceResolver::build_affiliated_resource(
			target,
			roles,
			permission,
			self.policy,
		));
		self
	}

	pub fn build(self) -> Result<AuthContext, AuthError> {
		let claims = extract_claims(self.principal)?;
		let owned: Option<OwnedResource> = self.owned.map(|pending| {
			ResourceResolver::build_owned_resource(
				pending.target,
				pending.owner_ids,
				claims.user_id,
			)
		});
		Ok(AuthContext {
			user_id: claims.user_id,
			roles: claims.roles,
			permissions: claims.permissions,
			owned,
			affiliated: self.affiliated,
		})
	}
}
