// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource definitions: stored records, lookup criteria, response DTOs and
//! their builders.

pub mod animal;
pub mod application;
pub mod report;

pub use animal::{Animal, AnimalBuilder, AnimalCriteria, AnimalDto, AnimalRecord};
pub use application::{
	Application, ApplicationBuilder, ApplicationCriteria, ApplicationDto, ApplicationRecord,
	ApplicationStatus,
};
pub use report::{Report, ReportBuilder, ReportCriteria, ReportDto, ReportRecord, ReportStatus};

use paws_server_auth::{ResourceDeclaration, Role, UserId};
use paws_server_db::DbError;
use serde_json::{Map, Value};

/// Body field listing the roles affiliated with a record.
pub const AFFILIATION_FIELD: &str = "affiliated_roles";

/// Every resource the field sensitivity table must describe.
pub const DECLARATIONS: &[ResourceDeclaration] = &[
	report::DECLARATION,
	animal::DECLARATION,
	application::DECLARATION,
];

/// Owner ids held in `fields` of `record`. Each field may hold one id or an
/// array of ids; values that are not user ids are skipped.
pub fn owner_ids(record: &Value, fields: &[&str]) -> Vec<UserId> {
	let mut ids = Vec::new();
	for field in fields {
		let values = match record.get(*field) {
			Some(Value::Array(items)) => items.iter().collect(),
			Some(value) => vec![value],
			None => Vec::new(),
		};
		ids.extend(
			values
				.into_iter()
				.filter_map(Value::as_str)
				.filter_map(|s| s.parse::<UserId>().ok()),
		);
	}
	ids
}

/// Roles listed in `field` of `record`.
pub fn affiliated_roles(record: &Value, field: Option<&str>) -> Vec<Role> {
	field
		.and_then(|f| record.get(f))
		.and_then(Value::as_array)
		.map(|roles| roles.iter().filter_map(Value::as_str).map(Role::from).collect())
		.unwrap_or_default()
}

pub(crate) fn record_id(record: &Value) -> Option<&str> {
	record.get("id").and_then(Value::as_str)
}

pub(crate) fn into_object(record: Value) -> Result<Map<String, Value>, DbError> {
	match record {
		Value::Object(map) => Ok(map),
		other => Err(DbError::Internal(format!(
			"expected a document object, found {other}"
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn owner_ids_read_scalars_and_arrays() {
		let a = UserId::generate();
		let b = UserId::generate();
		let record = json!({
			"reporter_id": a.to_string(),
			"staff": [b.to_string(), "not-a-uuid", 7],
		});
		assert_eq!(owner_ids(&record, &["reporter_id"]), vec![a]);
		assert_eq!(owner_ids(&record, &["reporter_id", "staff"]), vec![a, b]);
		assert!(owner_ids(&record, &["missing"]).is_empty());
	}

	#[test]
	fn affiliated_roles_need_an_array() {
		let record = json!({ "affiliated_roles": ["shelter_staff"], "other": "admin" });
		assert_eq!(
			affiliated_roles(&record, Some(AFFILIATION_FIELD)),
			vec![Role::from("shelter_staff")]
		);
		assert!(affiliated_roles(&record, Some("other")).is_empty());
		assert!(affiliated_roles(&record, None).is_empty());
	}
}
