// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service operations.
//!
//! Every read runs the same pipeline: build an [`AuthContext`], censor the
//! requested fields, compose the authorised query, collect inside a session,
//! then build DTOs from the allowed fields.
//!
//! Listings censor twice. The request-level pass uses a context in which the
//! caller owns and is affiliated with everything they could reach; it fails
//! the request when nothing at all is readable and bounds what any record
//! can show. Each record is then censored against its own owners and
//! affiliated roles before it is built.

pub mod animals;
pub mod applications;
pub mod reports;

use std::collections::BTreeMap;

use paws_server_auth::{
	extract_claims, AuthContext, AuthorizationFlags, AuthorizationService, FieldCensor, FieldPath,
	Permission, Principal, ResourceTarget, Role,
};
use paws_server_db::{FieldSelection, Lookup, Query, Queryable, ResultBuilder, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerError;
use crate::resources::{affiliated_roles, owner_ids, record_id};
use crate::state::AppState;

/// Paths accepted for reading any of the resources.
pub const READ_FLAGS: AuthorizationFlags = AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	/// Matching records before pagination.
	pub total: u64,
	pub offset: u64,
	pub limit: u32,
}

/// Context for a listing: the caller owns what carries their id and may be
/// affiliated through any role they hold.
pub(crate) fn listing_context(
	authz: &AuthorizationService,
	principal: Option<&Principal>,
	target: ResourceTarget,
	permission: Permission,
) -> Result<AuthContext, ServerError> {
	let roles: Vec<Role> = extract_claims(principal)?.roles.into_iter().collect();
	Ok(authz
		.context(principal)
		.owned_by_caller(target.clone())
		.affiliated_with(target, permission, Some(roles))
		.build()?)
}

/// Context for one stored record of `R`.
pub(crate) fn record_context<R: Queryable>(
	authz: &AuthorizationService,
	principal: Option<&Principal>,
	permission: Permission,
	record: &Value,
) -> Result<AuthContext, ServerError> {
	let target = ResourceTarget::single(R::KIND, record_id(record).unwrap_or_default());
	Ok(authz
		.context(principal)
		.owned_from(target.clone(), owner_ids(record, R::OWNER_FIELDS))
		.affiliated_with(
			target,
			permission,
			Some(affiliated_roles(record, R::AFFILIATION_FIELD)),
		)
		.build()?)
}

/// One pass of the listing pipeline for resource `R`.
pub(crate) struct Listing<'a, R: Queryable, B> {
	pub state: &'a AppState,
	pub principal: Option<&'a Principal>,
	pub permission: Permission,
	pub builder: &'a B,
	pub lookup: Lookup<R::Criteria>,
}

impl<R, B> Listing<'_, R, B>
where
	R: Queryable,
	B: ResultBuilder,
{
	pub async fn run(self) -> Result<Page<B::Output>, ServerError> {
		self.lookup.validate()?;
		let state = self.state;
		let target = self.lookup.target(R::KIND);
		let ctx = listing_context(&state.authz, self.principal, target, self.permission)?;

		let censor = state.censor(R::KIND)?;
		let fields = censor.censor_or_forbid(&self.lookup.fields, &ctx)?;

		let mut session = state.store.connect().await?;
		let query = Query::<R>::enrich(self.lookup, &ctx, &state.authz)
			.authorise(self.permission, READ_FLAGS);
		let offset = query.lookup().offset;
		let limit = query.lookup().limit();
		let total = query.count(&mut session).await?;
		let records = query.collect(&mut session).await?;

		let items = build_per_record::<R, B>(
			&mut session,
			RecordCensor {
				censor: &censor,
				authz: &state.authz,
				principal: self.principal,
				permission: self.permission,
			},
			self.builder,
			&fields,
			records,
		)
		.await?;

		tracing::debug!(
			resource = %R::KIND,
			total,
			returned = items.len(),
			"listing complete"
		);
		Ok(Page {
			items,
			total,
			offset,
			limit,
		})
	}
}

pub(crate) struct RecordCensor<'a> {
	pub censor: &'a FieldCensor,
	pub authz: &'a AuthorizationService,
	pub principal: Option<&'a Principal>,
	pub permission: Permission,
}

/// Censor `fields` for each record and build the DTOs. Records that end up
/// with the same field set are built together. Output order follows
/// `records`.
///
/// A record the read check rejects is skipped; the query restriction is
/// derived from the same check, so this only trips on data changed between
/// the two.
pub(crate) async fn build_per_record<R, B>(
	session: &mut Session,
	records_censor: RecordCensor<'_>,
	builder: &B,
	fields: &[FieldPath],
	records: Vec<Value>,
) -> Result<Vec<B::Output>, ServerError>
where
	R: Queryable,
	B: ResultBuilder,
{
	let RecordCensor {
		censor,
		authz,
		principal,
		permission,
	} = records_censor;

	let count = records.len();
	let mut groups: BTreeMap<Vec<FieldPath>, Vec<(usize, Value)>> = BTreeMap::new();
	for (index, record) in records.into_iter().enumerate() {
		let ctx = record_context::<R>(authz, principal, permission, &record)?;
		if !authz.authorize(&ctx, permission, READ_FLAGS) {
			tracing::warn!(
				resource = %R::KIND,
				record_id = record_id(&record).unwrap_or_default(),
				"record returned by an authorised query failed the read check"
			);
			continue;
		}
		let allowed = censor.censor(fields, &ctx)?;
		groups.entry(allowed).or_default().push((index, record));
	}

	let mut slots: Vec<Option<B::Output>> = std::iter::repeat_with(|| None).take(count).collect();
	for (allowed, members) in groups {
		let selection = FieldSelection::from_paths(&allowed);
		let (indices, group): (Vec<usize>, Vec<Value>) = members.into_iter().unzip();
		let built = builder.build(session, group, &selection).await?;
		for (index, dto) in indices.into_iter().zip(built) {
			slots[index] = Some(dto);
		}
	}
	Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
pub(crate) mod test_support {
	use paws_server_auth::{Principal, UserId};
	use paws_server_config::default_policy_tables;
	use paws_server_db::testing::create_test_store;

	use crate::state::AppState;

	pub async fn test_state() -> AppState {
		let store = create_test_store().await;
		AppState::bootstrap(store, &default_policy_tables().unwrap(), true).unwrap()
	}

	pub fn principal(user: UserId, roles: &[&str]) -> Principal {
		Principal::for_user(user, roles.iter().copied())
	}
}
