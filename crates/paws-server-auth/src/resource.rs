// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ownership and affiliation descriptors for the records a request targets.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::policy::PolicyTable;
use crate::types::{Permission, ResourceKind, Role, UserId};

/// The records a lookup asks for. `ids` is empty when the lookup is not
/// restricted by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceTarget {
	pub kind: ResourceKind,
	pub ids: Vec<String>,
}

impl ResourceTarget {
	pub fn new(kind: ResourceKind) -> Self {
		Self {
			kind,
			ids: Vec::new(),
		}
	}

	pub fn single(kind: ResourceKind, id: impl Into<String>) -> Self {
		Self {
			kind,
			ids: vec![id.into()],
		}
	}
}

/// "These users own the target." An empty owner set offers no ownership path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OwnedResource {
	pub user_ids: BTreeSet<UserId>,
	pub target: ResourceTarget,
}

impl OwnedResource {
	pub fn is_owned_by(&self, user_id: UserId) -> bool {
		self.user_ids.contains(&user_id)
	}
}

/// "Holders of these roles are affiliated with the target."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AffiliatedResource {
	pub roles: BTreeSet<Role>,
	pub target: ResourceTarget,
}

/// Pure constructors for the descriptors; nothing here touches the store.
pub struct ResourceResolver;

impl ResourceResolver {
	/// Owners default to the caller when `owner_ids` is `None`.
	pub fn build_owned_resource<I>(
		target: ResourceTarget,
		owner_ids: Option<I>,
		current_user: UserId,
	) -> OwnedResource
	where
		I: IntoIterator<Item = UserId>,
	{
		let user_ids = match owner_ids {
			Some(ids) => ids.into_iter().collect(),
			None => BTreeSet::from([current_user]),
		};
		OwnedResource { user_ids, target }
	}

	/// Roles default to the permission's affiliated roles when `roles` is `None`.
	pub fn build_affiliated_resource(
		target: ResourceTarget,
		roles: Option<Vec<Role>>,
		permission: Permission,
		policy: &PolicyTable,
	) -> AffiliatedResource {
		let roles = match roles {
			Some(roles) => roles.into_iter().collect(),
			None => policy.affiliated_roles_for(permission).clone(),
		};
		AffiliatedResource { roles, target }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::Policy;
	use proptest::prelude::*;

	#[test]
	fn owners_default_to_caller() {
		let caller = UserId::generate();
		let owned = ResourceResolver::build_owned_resource(
			ResourceTarget::new(ResourceKind::Report),
			None::<Vec<UserId>>,
			caller,
		);
		assert_eq!(owned.user_ids, BTreeSet::from([caller]));
		assert!(owned.is_owned_by(caller));
	}

	#[test]
	fn affiliated_roles_default_to_policy() {
		let policy = PolicyTable::from_policies([Policy {
			permission: Permission::EditAnimals,
			roles: BTreeSet::from([Role::from("admin")]),
			affiliated_roles: BTreeSet::from([Role::from("shelter_staff")]),
		}]);
		let affiliated = ResourceResolver::build_affiliated_resource(
			ResourceTarget::new(ResourceKind::Animal),
			None,
			Permission::EditAnimals,
			&policy,
		);
		assert_eq!(affiliated.roles, BTreeSet::from([Role::from("shelter_staff")]));

		let explicit = ResourceResolver::build_affiliated_resource(
			ResourceTarget::new(ResourceKind::Animal),
			Some(vec![]),
			Permission::EditAnimals,
			&policy,
		);
		assert!(explicit.roles.is_empty());
	}

	proptest! {
		/// Owner sets compare equal regardless of input order or duplicates.
		#[test]
		fn owner_set_is_order_independent(seeds in prop::collection::vec(any::<u128>(), 0..8)) {
			let ids: Vec<UserId> = seeds
				.iter()
				.map(|s| UserId::new(uuid::Uuid::from_u128(*s)))
				.collect();
			let mut shuffled = ids.clone();
			shuffled.reverse();
			shuffled.extend(ids.iter().copied());

			let caller = UserId::generate();
			let target = ResourceTarget::new(ResourceKind::Report);
			let a = ResourceResolver::build_owned_resource(target.clone(), Some(ids), caller);
			let b = ResourceResolver::build_owned_resource(target, Some(shuffled), caller);
			prop_assert_eq!(a, b);
		}
	}
}
