// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query composition: a [`Lookup`] bound to its resource, optionally
//! restricted to what the caller may see.
//!
//! ```ignore
//! let records = Query::<Report>::enrich(lookup, &ctx, &authz)
//!     .authorise(Permission::ViewReports, AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION)
//!     .collect(&mut session)
//!     .await?;
//! ```
//!
//! The restriction is derived from the same decision the authorization
//! service makes for `(permission, flags)`: each path that holds becomes one
//! alternative of an OR, and the OR is ANDed with the business filters.

use std::marker::PhantomData;

use paws_server_auth::{
	AuthContext, AuthorizationFlags, AuthorizationService, Permission, ResourceKind,
};
use serde_json::Value;
use tracing::instrument;

use crate::error::{DbError, Result};
use crate::filter::Filter;
use crate::lookup::{Criteria, Lookup};
use crate::store::{FindOptions, Session};

/// Storage description of one resource kind.
pub trait Queryable {
	const KIND: ResourceKind;
	const COLLECTION: &'static str;
	/// Body fields holding owner user ids (scalar or array).
	const OWNER_FIELDS: &'static [&'static str];
	/// Body field holding the roles affiliated with the record.
	const AFFILIATION_FIELD: Option<&'static str>;
	/// Body fields searched by the free-text query.
	const TEXT_FIELDS: &'static [&'static str];
	const SORTABLE_FIELDS: &'static [&'static str];

	type Criteria: Criteria;
}

/// The clause that limits a query to records reachable through the paths
/// that hold for `(permission, flags)`.
pub fn authorise_clause<R: Queryable>(
	ctx: &AuthContext,
	authz: &AuthorizationService,
	permission: Permission,
	flags: AuthorizationFlags,
) -> Filter {
	let held = authz.evaluate(ctx, permission, flags);
	if held.contains(AuthorizationFlags::PERMISSION) {
		return Filter::All;
	}

	let mut alternatives = Vec::new();
	if held.contains(AuthorizationFlags::OWNER) {
		if let Some(owned) = ctx.owned() {
			let ids: Vec<Value> = owned
				.user_ids
				.iter()
				.map(|id| Value::String(id.to_string()))
				.collect();
			for field in R::OWNER_FIELDS {
				alternatives.push(Filter::is_in(*field, ids.clone()));
			}
		}
	}
	if held.contains(AuthorizationFlags::AFFILIATION) {
		if let Some(field) = R::AFFILIATION_FIELD {
			let roles = authz.affiliated_roles_held(ctx, permission);
			alternatives.push(Filter::is_in(
				field,
				roles.iter().map(|r| Value::String(r.to_string())),
			));
		}
	}
	Filter::or(alternatives)
}

pub struct Query<'a, R: Queryable> {
	lookup: Lookup<R::Criteria>,
	ctx: &'a AuthContext,
	authz: &'a AuthorizationService,
	restriction: Option<Filter>,
	_resource: PhantomData<R>,
}

impl<'a, R: Queryable> Query<'a, R> {
	/// Bind `lookup` to the resource's storage.
	pub fn enrich(
		lookup: Lookup<R::Criteria>,
		ctx: &'a AuthContext,
		authz: &'a AuthorizationService,
	) -> Self {
		Self {
			lookup,
			ctx,
			authz,
			restriction: None,
			_resource: PhantomData,
		}
	}

	/// Restrict results to records the caller reaches through `flags`.
	#[must_use]
	pub fn authorise(mut self, permission: Permission, flags: AuthorizationFlags) -> Self {
		self.restriction = Some(authorise_clause::<R>(self.ctx, self.authz, permission, flags));
		self
	}

	pub fn lookup(&self) -> &Lookup<R::Criteria> {
		&self.lookup
	}

	/// Business filters AND the authorisation restriction.
	pub fn filter(&self) -> Filter {
		let text = match self.lookup.query.as_deref().map(str::trim) {
			Some(q) if !q.is_empty() => Filter::Text {
				fields: R::TEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
				query: q.to_string(),
			},
			_ => Filter::All,
		};
		Filter::and([
			self.lookup.criteria.filter(),
			text,
			self.restriction.clone().unwrap_or(Filter::All),
		])
	}

	fn options(&self) -> Result<FindOptions> {
		if let Some(key) = self
			.lookup
			.sort
			.iter()
			.find(|key| !R::SORTABLE_FIELDS.contains(&key.as_str()))
		{
			return Err(DbError::InvalidLookup(format!(
				"cannot sort {} by '{key}'",
				R::KIND
			)));
		}
		Ok(FindOptions {
			sort: self.lookup.sort.clone(),
			direction: self.lookup.direction,
			offset: self.lookup.offset,
			limit: Some(self.lookup.limit()),
			projection: None,
		})
	}

	/// Execute and return raw records in store order.
	#[instrument(
		skip(self, session),
		fields(resource = %R::KIND, user_id = %self.ctx.user_id(), offset = self.lookup.offset)
	)]
	pub async fn collect(self, session: &mut Session) -> Result<Vec<Value>> {
		self.lookup.validate()?;
		let options = self.options()?;
		let filter = self.filter();
		session.find(R::COLLECTION, &filter, &options).await
	}

	/// Number of records matching the composed filter, ignoring pagination.
	pub async fn count(&self, session: &mut Session) -> Result<u64> {
		session.count(R::COLLECTION, &self.filter()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lookup::ids_filter;
	use crate::testing::create_test_store;
	use paws_server_auth::{PolicyTable, Principal, ResourceTarget, UserId};
	use proptest::prelude::*;
	use serde_json::json;
	use std::sync::Arc;

	struct Note;

	#[derive(Debug, Clone, Default)]
	struct NoteCriteria {
		ids: Vec<String>,
	}

	impl Criteria for NoteCriteria {
		fn filter(&self) -> Filter {
			ids_filter("id", &self.ids)
		}

		fn ids(&self) -> Vec<String> {
			self.ids.clone()
		}
	}

	impl Queryable for Note {
		const KIND: ResourceKind = ResourceKind::Report;
		const COLLECTION: &'static str = "notes";
		const OWNER_FIELDS: &'static [&'static str] = &["author_id"];
		const AFFILIATION_FIELD: Option<&'static str> = Some("affiliated_roles");
		const TEXT_FIELDS: &'static [&'static str] = &["text"];
		const SORTABLE_FIELDS: &'static [&'static str] = &["created_at"];

		type Criteria = NoteCriteria;
	}

	fn authz() -> AuthorizationService {
		let tables = paws_server_config::default_policy_tables().unwrap();
		AuthorizationService::new(Arc::new(PolicyTable::from_config(&tables.permissions).unwrap()))
	}

	fn ctx(authz: &AuthorizationService, caller: UserId, roles: &[&str]) -> AuthContext {
		let principal = Principal::for_user(caller, roles.iter().copied());
		authz
			.context(Some(&principal))
			.owned_by_caller(ResourceTarget::new(ResourceKind::Report))
			.affiliated_with(
				ResourceTarget::new(ResourceKind::Report),
				Permission::ViewReports,
				None,
			)
			.build()
			.unwrap()
	}

	/// (id, author, text, affiliated role)
	async fn seed(session: &mut Session, notes: &[(&str, UserId, &str, Option<&str>)]) {
		for (id, author, text, role) in notes {
			let roles: Vec<&str> = role.iter().copied().collect();
			session
				.insert(
					"notes",
					id,
					&json!({
						"id": id,
						"author_id": author.to_string(),
						"text": text,
						"affiliated_roles": roles,
						"created_at": "2025-01-01T00:00:00Z",
					}),
				)
				.await
				.unwrap();
		}
	}

	#[test]
	fn permission_path_removes_restriction() {
		let authz = authz();
		let ctx = ctx(&authz, UserId::generate(), &["moderator"]);
		assert_eq!(
			authorise_clause::<Note>(
				&ctx,
				&authz,
				Permission::ViewReports,
				AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION
			),
			Filter::All
		);
	}

	#[test]
	fn no_path_matches_nothing() {
		let authz = authz();
		let ctx = ctx(&authz, UserId::generate(), &["adopter"]);
		assert_eq!(
			authorise_clause::<Note>(
				&ctx,
				&authz,
				Permission::ViewReports,
				AuthorizationFlags::PERMISSION
			),
			Filter::Nothing
		);
	}

	#[test]
	fn owner_and_affiliation_are_alternatives() {
		let authz = authz();
		let caller = UserId::generate();
		let ctx = ctx(&authz, caller, &["shelter_staff"]);
		assert_eq!(
			authorise_clause::<Note>(
				&ctx,
				&authz,
				Permission::ViewReports,
				AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION
			),
			Filter::Or(vec![
				Filter::is_in("author_id", [caller.to_string()]),
				Filter::is_in("affiliated_roles", ["shelter_staff"]),
			])
		);
	}

	#[tokio::test]
	async fn owner_restriction_returns_only_owned_records() {
		let store = create_test_store().await;
		let authz = authz();
		let caller = UserId::generate();
		let other = UserId::generate();
		let mut session = store.connect().await.unwrap();
		seed(
			&mut session,
			&[
				("n1", caller, "mine", None),
				("n2", other, "theirs", None),
				("n3", caller, "also mine", Some("shelter_staff")),
			],
		)
		.await;

		let ctx = ctx(&authz, caller, &["adopter"]);
		let records = Query::<Note>::enrich(Lookup::new(NoteCriteria::default()), &ctx, &authz)
			.authorise(
				Permission::ViewReports,
				AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION,
			)
			.collect(&mut session)
			.await
			.unwrap();
		let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
		assert_eq!(ids, vec!["n1", "n3"]);
	}

	#[tokio::test]
	async fn affiliation_and_text_and_criteria_combine() {
		let store = create_test_store().await;
		let authz = authz();
		let caller = UserId::generate();
		let other = UserId::generate();
		let mut session = store.connect().await.unwrap();
		seed(
			&mut session,
			&[
				("n1", other, "Barking at night", Some("shelter_staff")),
				("n2", other, "barking again", None),
				("n3", other, "quiet", Some("shelter_staff")),
				("n4", caller, "barking mine", None),
			],
		)
		.await;

		let ctx = ctx(&authz, caller, &["shelter_staff"]);
		let mut lookup = Lookup::new(NoteCriteria {
			ids: vec!["n1".into(), "n2".into(), "n3".into(), "n4".into()],
		});
		lookup.query = Some("BARK".to_string());
		let query = Query::<Note>::enrich(lookup, &ctx, &authz).authorise(
			Permission::ViewReports,
			AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION,
		);
		assert_eq!(query.count(&mut session).await.unwrap(), 2);
		let records = query.collect(&mut session).await.unwrap();
		let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
		assert_eq!(ids, vec!["n1", "n4"]);
	}

	#[tokio::test]
	async fn unsortable_key_is_rejected() {
		let store = create_test_store().await;
		let authz = authz();
		let ctx = ctx(&authz, UserId::generate(), &["admin"]);
		let mut session = store.connect().await.unwrap();
		let mut lookup = Lookup::new(NoteCriteria::default());
		lookup.sort = vec!["author_id".to_string()];
		let err = Query::<Note>::enrich(lookup, &ctx, &authz)
			.collect(&mut session)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::InvalidLookup(_)));
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(16))]

		/// With only the owner path available, every collected record belongs
		/// to the caller, whatever else is stored.
		#[test]
		fn owner_restriction_round_trip(
			owned_by_caller in prop::collection::vec(any::<bool>(), 0..12)
		) {
			let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
			rt.block_on(async {
				let store = create_test_store().await;
				let authz = authz();
				let caller = UserId::generate();
				let mut session = store.connect().await.unwrap();
				let ids: Vec<String> =
					(0..owned_by_caller.len()).map(|i| format!("n{i}")).collect();
				let notes: Vec<(&str, UserId, &str, Option<&str>)> = owned_by_caller
					.iter()
					.zip(&ids)
					.map(|(mine, id)| {
						let author = if *mine { caller } else { UserId::generate() };
						(id.as_str(), author, "text", None)
					})
					.collect();
				seed(&mut session, &notes).await;

				let ctx = ctx(&authz, caller, &["adopter"]);
				let mut lookup = Lookup::new(NoteCriteria::default());
				lookup.page_size = 200;
				let records = Query::<Note>::enrich(lookup, &ctx, &authz)
					.authorise(Permission::ViewReports, AuthorizationFlags::OWNER)
					.collect(&mut session)
					.await
					.unwrap();

				let expected = owned_by_caller.iter().filter(|m| **m).count();
				assert_eq!(records.len(), expected);
				for record in &records {
					assert_eq!(record["author_id"], json!(caller.to_string()));
				}
			});
		}
	}
}
