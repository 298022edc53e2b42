// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decision engine.
//!
//! Two primitives:
//!
//! 1. **Bare permission**: do the caller's roles intersect the roles that hold
//!    the permission directly?
//! 2. **Contextual**: each path named in the requested [`AuthorizationFlags`]
//!    is an alternative. Permission, ownership and affiliation are tried in
//!    that order and the first that holds grants access. Paths whose
//!    descriptor is absent from the context are skipped.
//!
//! Decisions are pure functions of the context and the policy table.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::claims::Principal;
use crate::context::{AuthContext, AuthContextBuilder};
use crate::error::AuthError;
use crate::flags::AuthorizationFlags;
use crate::policy::PolicyTable;
use crate::types::{Permission, ResourceKind, Role};

#[derive(Debug, Clone)]
pub struct AuthorizationService {
	policy: Arc<PolicyTable>,
}

impl AuthorizationService {
	pub fn new(policy: Arc<PolicyTable>) -> Self {
		Self { policy }
	}

	pub fn policy(&self) -> &PolicyTable {
		&self.policy
	}

	/// Start building the context for one request.
	pub fn context<'a>(&'a self, principal: Option<&'a Principal>) -> AuthContextBuilder<'a> {
		AuthContextBuilder::new(&self.policy, principal)
	}

	/// True iff `roles` intersects the roles holding `permission` directly.
	pub fn is_permitted(&self, roles: &BTreeSet<Role>, permission: Permission) -> bool {
		!roles.is_disjoint(self.policy.roles_for(permission))
	}

	pub fn authorize_permission(&self, ctx: &AuthContext, permission: Permission) -> bool {
		self.is_permitted(ctx.roles(), permission)
	}

	/// Affiliated roles the caller actually holds for `permission` on the
	/// context's target.
	pub fn affiliated_roles_held(
		&self,
		ctx: &AuthContext,
		permission: Permission,
	) -> BTreeSet<Role> {
		let Some(affiliated) = ctx.affiliated() else {
			return BTreeSet::new();
		};
		let configured = self.policy.affiliated_roles_for(permission);
		affiliated
			.roles
			.iter()
			.filter(|role| configured.contains(*role) && ctx.roles().contains(*role))
			.cloned()
			.collect()
	}

	fn path_holds(
		&self,
		ctx: &AuthContext,
		permission: Permission,
		path: AuthorizationFlags,
	) -> bool {
		if path == AuthorizationFlags::PERMISSION {
			self.authorize_permission(ctx, permission)
		} else if path == AuthorizationFlags::OWNER {
			ctx
				.owned()
				.map(|owned| owned.is_owned_by(ctx.user_id()))
				.unwrap_or(false)
		} else if path == AuthorizationFlags::AFFILIATION {
			!self.affiliated_roles_held(ctx, permission).is_empty()
		} else {
			false
		}
	}

	/// Every path in `flags` that holds for this context.
	pub fn evaluate(
		&self,
		ctx: &AuthContext,
		permission: Permission,
		flags: AuthorizationFlags,
	) -> AuthorizationFlags {
		flags
			.iter()
			.filter(|path| self.path_holds(ctx, permission, *path))
			.fold(AuthorizationFlags::NONE, |acc, path| acc | path)
	}

	/// True on the first path in `flags` that holds. Never errors.
	#[instrument(
		level = "debug",
		skip(self, ctx),
		fields(user_id = %ctx.user_id(), permission = %permission, flags = %flags)
	)]
	pub fn authorize(
		&self,
		ctx: &AuthContext,
		permission: Permission,
		flags: AuthorizationFlags,
	) -> bool {
		match flags.iter().find(|path| self.path_holds(ctx, permission, *path)) {
			Some(path) => {
				debug!(granted_by = %path, "authorization granted");
				true
			}
			None => false,
		}
	}

	/// [`AuthorizationService::authorize`], turning a denial into
	/// [`AuthError::Forbidden`].
	pub fn require(
		&self,
		ctx: &AuthContext,
		permission: Permission,
		flags: AuthorizationFlags,
		resource: ResourceKind,
	) -> Result<(), AuthError> {
		if self.authorize(ctx, permission, flags) {
			return Ok(());
		}
		info!(
			user_id = %ctx.user_id(),
			permission = %permission,
			flags = %flags,
			resource = %resource,
			"authorization denied"
		);
		Err(AuthError::forbidden(permission, resource))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::Policy;
	use crate::resource::ResourceTarget;
	use crate::types::UserId;
	use proptest::prelude::*;

	const ROLE_NAMES: [&str; 5] = ["admin", "moderator", "shelter_staff", "adopter", "volunteer"];

	fn service() -> AuthorizationService {
		let tables = paws_server_config::default_policy_tables().unwrap();
		AuthorizationService::new(Arc::new(PolicyTable::from_config(&tables.permissions).unwrap()))
	}

	fn report() -> ResourceTarget {
		ResourceTarget::single(ResourceKind::Report, "report-1")
	}

	fn roles_from_mask(mask: u8) -> Vec<&'static str> {
		ROLE_NAMES
			.iter()
			.enumerate()
			.filter(|(i, _)| mask & (1 << i) != 0)
			.map(|(_, r)| *r)
			.collect()
	}

	fn arb_permission() -> impl Strategy<Value = Permission> {
		prop::sample::select(Permission::all().to_vec())
	}

	#[test]
	fn scenario_no_path_is_forbidden() {
		let authz = service();
		let caller = UserId::generate();
		let principal = Principal::for_user(caller, ["adopter"]);
		let ctx = authz
			.context(Some(&principal))
			.owned_from(report(), [UserId::generate()])
			.build()
			.unwrap();

		assert!(!authz.authorize(
			&ctx,
			Permission::EditReports,
			AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION
		));
		let err = authz
			.require(
				&ctx,
				Permission::EditReports,
				AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION,
				ResourceKind::Report,
			)
			.unwrap_err();
		assert_eq!(
			err,
			AuthError::forbidden(Permission::EditReports, ResourceKind::Report)
		);
	}

	#[test]
	fn scenario_owner_without_permission_is_allowed() {
		let authz = service();
		let caller = UserId::generate();
		let principal = Principal::for_user(caller, ["adopter"]);
		let ctx = authz
			.context(Some(&principal))
			.owned_from(report(), [caller])
			.build()
			.unwrap();

		assert!(!authz.authorize_permission(&ctx, Permission::EditReports));
		assert!(authz.authorize(
			&ctx,
			Permission::EditReports,
			AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION
		));
		assert_eq!(
			authz.evaluate(
				&ctx,
				Permission::EditReports,
				AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION
			),
			AuthorizationFlags::OWNER
		);
	}

	#[test]
	fn permission_path_holds_on_owner_only_context() {
		let authz = service();
		let principal = Principal::for_user(UserId::generate(), ["moderator"]);
		let ctx = authz
			.context(Some(&principal))
			.owned_from(report(), [UserId::generate()])
			.build()
			.unwrap();
		assert!(authz.authorize(&ctx, Permission::EditReports, AuthorizationFlags::PERMISSION));
	}

	#[test]
	fn none_never_grants() {
		let authz = service();
		let caller = UserId::generate();
		let principal = Principal::for_user(caller, ROLE_NAMES);
		let ctx = authz
			.context(Some(&principal))
			.owned_from(report(), [caller])
			.affiliated_with(report(), Permission::ViewReports, None)
			.build()
			.unwrap();
		assert!(!authz.authorize(&ctx, Permission::ViewReports, AuthorizationFlags::NONE));
	}

	#[test]
	fn affiliation_requires_configured_role() {
		let authz = service();
		let principal = Principal::for_user(UserId::generate(), ["moderator"]);
		// moderator is named on the descriptor but is not an affiliated role
		// for view_reports.
		let ctx = authz
			.context(Some(&principal))
			.affiliated_with(
				report(),
				Permission::ViewReports,
				Some(vec![Role::from("moderator")]),
			)
			.build()
			.unwrap();
		assert!(!authz.authorize(&ctx, Permission::ViewReports, AuthorizationFlags::AFFILIATION));
	}

	proptest! {
		/// Authorize(p) holds iff the caller's roles meet RolesFor(p).
		#[test]
		fn permission_iff_role_intersection(mask in 0u8..32, permission in arb_permission()) {
			let authz = service();
			let roles = roles_from_mask(mask);
			let principal = Principal::for_user(UserId::generate(), roles.clone());
			let ctx = authz.context(Some(&principal)).build().unwrap();

			let expected = roles
				.iter()
				.any(|r| authz.policy().roles_for(permission).contains(&Role::from(*r)));
			prop_assert_eq!(authz.authorize_permission(&ctx, permission), expected);
		}

		/// With only an owned descriptor, the owner path ignores roles entirely.
		#[test]
		fn owner_path_iff_caller_in_owner_set(
			mask in 0u8..32,
			permission in arb_permission(),
			caller_owns in any::<bool>(),
			others in 0usize..4,
		) {
			let authz = service();
			let caller = UserId::generate();
			let mut owners: Vec<UserId> = (0..others).map(|_| UserId::generate()).collect();
			if caller_owns {
				owners.push(caller);
			}
			let principal = Principal::for_user(caller, roles_from_mask(mask));
			let ctx = authz.context(Some(&principal)).owned_from(report(), owners).build().unwrap();

			let granted = authz.authorize(&ctx, permission, AuthorizationFlags::OWNER);
			prop_assert_eq!(granted, caller_owns);
		}

		/// With only an affiliated descriptor, the affiliation path holds iff the
		/// caller has a role in AffiliatedRolesFor(p).
		#[test]
		fn affiliation_path_iff_caller_holds_affiliated_role(
			mask in 0u8..32,
			permission in arb_permission(),
		) {
			let authz = service();
			let roles = roles_from_mask(mask);
			let principal = Principal::for_user(UserId::generate(), roles.clone());
			let ctx = authz
				.context(Some(&principal))
				.affiliated_with(report(), permission, None)
				.build()
				.unwrap();

			let expected = roles
				.iter()
				.any(|r| authz.policy().affiliated_roles_for(permission).contains(&Role::from(*r)));
			let granted = authz.authorize(&ctx, permission, AuthorizationFlags::AFFILIATION);
			prop_assert_eq!(granted, expected);
		}

		/// Flag combinations are OR of their single-path checks.
		#[test]
		fn combined_flags_are_or_of_parts(
			mask in 0u8..32,
			permission in arb_permission(),
			bits in 0u8..8,
			caller_owns in any::<bool>(),
			affiliated in any::<bool>(),
		) {
			let authz = service();
			let caller = UserId::generate();
			let owner = if caller_owns { caller } else { UserId::generate() };
			let principal = Principal::for_user(caller, roles_from_mask(mask));
			let mut builder = authz.context(Some(&principal)).owned_from(report(), [owner]);
			if affiliated {
				builder = builder.affiliated_with(report(), permission, None);
			}
			let ctx = builder.build().unwrap();

			let flags = AuthorizationFlags::from_bits_truncate(bits);
			let expected = flags.iter().any(|f| authz.authorize(&ctx, permission, f));
			prop_assert_eq!(authz.authorize(&ctx, permission, flags), expected);
			prop_assert_eq!(
				authz.authorize(&ctx, permission, AuthorizationFlags::OWNER_OR_PERMISSION),
				authz.authorize(&ctx, permission, AuthorizationFlags::OWNER)
					|| authz.authorize_permission(&ctx, permission)
			);
			prop_assert_eq!(!authz.evaluate(&ctx, permission, flags).is_empty(), expected);
		}
	}

	#[test]
	fn custom_policy_table() {
		let policy = PolicyTable::from_policies([Policy {
			permission: Permission::ViewMessages,
			roles: BTreeSet::from([Role::from("auditor")]),
			affiliated_roles: BTreeSet::new(),
		}]);
		let authz = AuthorizationService::new(Arc::new(policy));
		let auditor = BTreeSet::from([Role::from("auditor")]);
		let admin = BTreeSet::from([Role::from("admin")]);
		assert!(authz.is_permitted(&auditor, Permission::ViewMessages));
		assert!(!authz.is_permitted(&admin, Permission::ViewMessages));
	}
}
