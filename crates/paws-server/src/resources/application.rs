// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Adoption applications.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paws_server_auth::{DeclaredField, ResourceDeclaration, ResourceKind, Role, UserId};
use paws_server_db::{
	ids_filter, take_selected, Criteria, DateRange, DbError, FieldSelection, Filter, FindOptions,
	Queryable, ResultBuilder, Session,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::animal::{self, AnimalDto};
use super::{into_object, record_id, AFFILIATION_FIELD};
use crate::error::ServerError;

pub const COLLECTION: &str = "applications";

pub const DECLARATION: ResourceDeclaration = ResourceDeclaration {
	kind: ResourceKind::Application,
	fields: &[
		DeclaredField::scalar("id"),
		DeclaredField::scalar("status"),
		DeclaredField::scalar("animal_id"),
		DeclaredField::nested("animal", ResourceKind::Animal),
		DeclaredField::scalar("created_at"),
		DeclaredField::scalar("applicant_id"),
		DeclaredField::scalar("statement"),
		DeclaredField::scalar("contact_email"),
		DeclaredField::scalar("contact_phone"),
	],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
	Submitted,
	UnderReview,
	Approved,
	Rejected,
	Withdrawn,
}

impl ApplicationStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ApplicationStatus::Submitted => "submitted",
			ApplicationStatus::UnderReview => "under_review",
			ApplicationStatus::Approved => "approved",
			ApplicationStatus::Rejected => "rejected",
			ApplicationStatus::Withdrawn => "withdrawn",
		}
	}
}

impl FromStr for ApplicationStatus {
	type Err = ServerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"submitted" => Ok(ApplicationStatus::Submitted),
			"under_review" => Ok(ApplicationStatus::UnderReview),
			"approved" => Ok(ApplicationStatus::Approved),
			"rejected" => Ok(ApplicationStatus::Rejected),
			"withdrawn" => Ok(ApplicationStatus::Withdrawn),
			other => Err(ServerError::BadRequest(format!(
				"unknown application status '{other}'"
			))),
		}
	}
}

/// An application as stored. The animal is referenced by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
	pub id: String,
	pub status: ApplicationStatus,
	pub animal_id: String,
	pub created_at: DateTime<Utc>,
	pub applicant_id: UserId,
	pub statement: String,
	pub contact_email: String,
	pub contact_phone: Option<String>,
	#[serde(default)]
	pub affiliated_roles: Vec<Role>,
}

pub struct Application;

impl Queryable for Application {
	const KIND: ResourceKind = ResourceKind::Application;
	const COLLECTION: &'static str = COLLECTION;
	const OWNER_FIELDS: &'static [&'static str] = &["applicant_id"];
	const AFFILIATION_FIELD: Option<&'static str> = Some(AFFILIATION_FIELD);
	const TEXT_FIELDS: &'static [&'static str] = &["statement"];
	const SORTABLE_FIELDS: &'static [&'static str] = &["created_at", "status"];

	type Criteria = ApplicationCriteria;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationCriteria {
	pub ids: Vec<String>,
	pub animal_ids: Vec<String>,
	pub statuses: Vec<ApplicationStatus>,
	pub created: DateRange,
}

impl Criteria for ApplicationCriteria {
	fn filter(&self) -> Filter {
		let statuses: Vec<String> = self.statuses.iter().map(|s| s.as_str().to_string()).collect();
		Filter::and([
			ids_filter("id", &self.ids),
			ids_filter("animal_id", &self.animal_ids),
			ids_filter("status", &statuses),
			self.created.to_filter("created_at"),
		])
	}

	fn ids(&self) -> Vec<String> {
		self.ids.clone()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDto {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<ApplicationStatus>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub animal_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub animal: Option<AnimalDto>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub applicant_id: Option<UserId>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub statement: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contact_email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contact_phone: Option<String>,
}

impl ApplicationDto {
	fn from_record(
		record: Value,
		selection: &FieldSelection,
		animal: Option<AnimalDto>,
	) -> Result<Self, DbError> {
		let mut map = into_object(record)?;
		Ok(Self {
			id: take_selected(&mut map, selection, "id")?,
			status: take_selected(&mut map, selection, "status")?,
			animal_id: take_selected(&mut map, selection, "animal_id")?,
			animal,
			created_at: take_selected(&mut map, selection, "created_at")?,
			applicant_id: take_selected(&mut map, selection, "applicant_id")?,
			statement: take_selected(&mut map, selection, "statement")?,
			contact_email: take_selected(&mut map, selection, "contact_email")?,
			contact_phone: take_selected(&mut map, selection, "contact_phone")?,
		})
	}
}

/// Loads referenced animals in one query, and only when `animal` is selected.
pub struct ApplicationBuilder;

impl ApplicationBuilder {
	async fn load_animals(
		session: &mut Session,
		records: &[Value],
	) -> paws_server_db::Result<HashMap<String, Value>> {
		let ids: BTreeSet<&str> = records
			.iter()
			.filter_map(|r| r.get("animal_id").and_then(Value::as_str))
			.collect();
		if ids.is_empty() {
			return Ok(HashMap::new());
		}
		let animals = session
			.find(
				animal::COLLECTION,
				&Filter::is_in("id", ids),
				&FindOptions::default(),
			)
			.await?;
		Ok(animals
			.into_iter()
			.filter_map(|a| record_id(&a).map(str::to_string).map(|id| (id, a)))
			.collect())
	}
}

#[async_trait]
impl ResultBuilder for ApplicationBuilder {
	type Output = ApplicationDto;

	async fn build(
		&self,
		session: &mut Session,
		records: Vec<Value>,
		selection: &FieldSelection,
	) -> paws_server_db::Result<Vec<ApplicationDto>> {
		let animal_selection = selection.nested("animal").filter(|s| !s.is_empty());
		let animals = match animal_selection {
			Some(_) => Self::load_animals(session, &records).await?,
			None => HashMap::new(),
		};

		let mut out = Vec::with_capacity(records.len());
		for record in records {
			let animal = match animal_selection {
				Some(nested) => record
					.get("animal_id")
					.and_then(Value::as_str)
					.and_then(|id| animals.get(id))
					.map(|a| AnimalDto::from_record(a.clone(), nested))
					.transpose()?,
				None => None,
			};
			out.push(ApplicationDto::from_record(record, selection, animal)?);
		}
		Ok(out)
	}
}
