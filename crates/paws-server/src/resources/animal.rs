// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Animals listed by shelters.

use async_trait::async_trait;
use paws_server_auth::{DeclaredField, ResourceDeclaration, ResourceKind, Role, UserId};
use paws_server_db::{
	ids_filter, take_selected, Criteria, DbError, FieldSelection, Filter, Queryable, ResultBuilder,
	Session,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{into_object, AFFILIATION_FIELD};

pub const COLLECTION: &str = "animals";

pub const DECLARATION: ResourceDeclaration = ResourceDeclaration {
	kind: ResourceKind::Animal,
	fields: &[
		DeclaredField::scalar("id"),
		DeclaredField::scalar("name"),
		DeclaredField::scalar("species"),
		DeclaredField::scalar("breed"),
		DeclaredField::scalar("status"),
		DeclaredField::scalar("shelter_id"),
		DeclaredField::scalar("medical_notes"),
		DeclaredField::scalar("shelter_staff_ids"),
	],
};

/// An animal as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
	pub id: String,
	pub name: String,
	pub species: String,
	pub breed: Option<String>,
	pub status: String,
	pub shelter_id: String,
	pub medical_notes: Option<String>,
	pub shelter_staff_ids: Vec<UserId>,
	#[serde(default)]
	pub affiliated_roles: Vec<Role>,
}

pub struct Animal;

impl Queryable for Animal {
	const KIND: ResourceKind = ResourceKind::Animal;
	const COLLECTION: &'static str = COLLECTION;
	const OWNER_FIELDS: &'static [&'static str] = &["shelter_staff_ids"];
	const AFFILIATION_FIELD: Option<&'static str> = Some(AFFILIATION_FIELD);
	const TEXT_FIELDS: &'static [&'static str] = &["name", "breed"];
	const SORTABLE_FIELDS: &'static [&'static str] = &["name", "species", "status"];

	type Criteria = AnimalCriteria;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimalCriteria {
	pub ids: Vec<String>,
	pub shelter_ids: Vec<String>,
	pub species: Vec<String>,
	pub statuses: Vec<String>,
}

impl Criteria for AnimalCriteria {
	fn filter(&self) -> Filter {
		Filter::and([
			ids_filter("id", &self.ids),
			ids_filter("shelter_id", &self.shelter_ids),
			ids_filter("species", &self.species),
			ids_filter("status", &self.statuses),
		])
	}

	fn ids(&self) -> Vec<String> {
		self.ids.clone()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimalDto {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub species: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub breed: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shelter_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub medical_notes: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shelter_staff_ids: Option<Vec<UserId>>,
}

impl AnimalDto {
	pub fn from_record(record: Value, selection: &FieldSelection) -> Result<Self, DbError> {
		let mut map = into_object(record)?;
		Ok(Self {
			id: take_selected(&mut map, selection, "id")?,
			name: take_selected(&mut map, selection, "name")?,
			species: take_selected(&mut map, selection, "species")?,
			breed: take_selected(&mut map, selection, "breed")?,
			status: take_selected(&mut map, selection, "status")?,
			shelter_id: take_selected(&mut map, selection, "shelter_id")?,
			medical_notes: take_selected(&mut map, selection, "medical_notes")?,
			shelter_staff_ids: take_selected(&mut map, selection, "shelter_staff_ids")?,
		})
	}
}

pub struct AnimalBuilder;

#[async_trait]
impl ResultBuilder for AnimalBuilder {
	type Output = AnimalDto;

	async fn build(
		&self,
		_session: &mut Session,
		records: Vec<Value>,
		selection: &FieldSelection,
	) -> paws_server_db::Result<Vec<AnimalDto>> {
		records
			.into_iter()
			.map(|record| AnimalDto::from_record(record, selection))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use paws_server_auth::FieldPath;
	use serde_json::json;

	#[test]
	fn staff_ids_deserialize_when_selected() {
		let staff = UserId::generate();
		let record = json!({
			"id": "a1",
			"name": "Biscuit",
			"species": "dog",
			"breed": null,
			"status": "available",
			"shelter_id": "s1",
			"medical_notes": "vaccinated",
			"shelter_staff_ids": [staff.to_string()],
		});
		let paths: Vec<FieldPath> = ["name", "breed", "shelter_staff_ids"]
			.iter()
			.map(|n| n.parse().unwrap())
			.collect();
		let dto = AnimalDto::from_record(record, &FieldSelection::from_paths(&paths)).unwrap();
		assert_eq!(dto.name.as_deref(), Some("Biscuit"));
		assert_eq!(dto.breed, None);
		assert_eq!(dto.shelter_staff_ids, Some(vec![staff]));
		assert_eq!(dto.medical_notes, None);
	}

	#[test]
	fn empty_criteria_match_everything() {
		assert_eq!(AnimalCriteria::default().filter(), Filter::All);
		let criteria = AnimalCriteria {
			species: vec!["cat".into()],
			..Default::default()
		};
		assert_eq!(criteria.filter(), Filter::is_in("species", ["cat"]));
	}
}
