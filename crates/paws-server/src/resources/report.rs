// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Moderation reports filed against users, shelters or listings.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paws_server_auth::{DeclaredField, ResourceDeclaration, ResourceKind, Role, UserId};
use paws_server_db::{
	ids_filter, take_selected, Criteria, DateRange, DbError, FieldSelection, Filter, Queryable,
	ResultBuilder, Session,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{into_object, AFFILIATION_FIELD};
use crate::error::ServerError;

pub const COLLECTION: &str = "reports";
pub const NOTES_COLLECTION: &str = "report_notes";

pub const DECLARATION: ResourceDeclaration = ResourceDeclaration {
	kind: ResourceKind::Report,
	fields: &[
		DeclaredField::scalar("id"),
		DeclaredField::scalar("reason"),
		DeclaredField::scalar("status"),
		DeclaredField::scalar("created_at"),
		DeclaredField::scalar("subject_id"),
		DeclaredField::scalar("details"),
		DeclaredField::scalar("reporter_id"),
	],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
	Open,
	UnderReview,
	Resolved,
	Dismissed,
}

impl ReportStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ReportStatus::Open => "open",
			ReportStatus::UnderReview => "under_review",
			ReportStatus::Resolved => "resolved",
			ReportStatus::Dismissed => "dismissed",
		}
	}
}

impl fmt::Display for ReportStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ReportStatus {
	type Err = ServerError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"open" => Ok(ReportStatus::Open),
			"under_review" => Ok(ReportStatus::UnderReview),
			"resolved" => Ok(ReportStatus::Resolved),
			"dismissed" => Ok(ReportStatus::Dismissed),
			other => Err(ServerError::BadRequest(format!("unknown report status '{other}'"))),
		}
	}
}

/// A report as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
	pub id: String,
	pub reason: String,
	pub status: ReportStatus,
	pub created_at: DateTime<Utc>,
	pub subject_id: String,
	pub details: String,
	pub reporter_id: UserId,
	#[serde(default)]
	pub affiliated_roles: Vec<Role>,
}

pub struct Report;

impl Queryable for Report {
	const KIND: ResourceKind = ResourceKind::Report;
	const COLLECTION: &'static str = COLLECTION;
	const OWNER_FIELDS: &'static [&'static str] = &["reporter_id"];
	const AFFILIATION_FIELD: Option<&'static str> = Some(AFFILIATION_FIELD);
	const TEXT_FIELDS: &'static [&'static str] = &["reason", "details"];
	const SORTABLE_FIELDS: &'static [&'static str] = &["created_at", "status", "reason"];

	type Criteria = ReportCriteria;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportCriteria {
	pub ids: Vec<String>,
	pub statuses: Vec<ReportStatus>,
	pub subject_ids: Vec<String>,
	pub created: DateRange,
}

impl Criteria for ReportCriteria {
	fn filter(&self) -> Filter {
		let statuses: Vec<String> = self.statuses.iter().map(|s| s.as_str().to_string()).collect();
		Filter::and([
			ids_filter("id", &self.ids),
			ids_filter("status", &statuses),
			ids_filter("subject_id", &self.subject_ids),
			self.created.to_filter("created_at"),
		])
	}

	fn ids(&self) -> Vec<String> {
		self.ids.clone()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDto {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<ReportStatus>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reporter_id: Option<UserId>,
}

impl ReportDto {
	pub fn from_record(record: Value, selection: &FieldSelection) -> Result<Self, DbError> {
		let mut map = into_object(record)?;
		Ok(Self {
			id: take_selected(&mut map, selection, "id")?,
			reason: take_selected(&mut map, selection, "reason")?,
			status: take_selected(&mut map, selection, "status")?,
			created_at: take_selected(&mut map, selection, "created_at")?,
			subject_id: take_selected(&mut map, selection, "subject_id")?,
			details: take_selected(&mut map, selection, "details")?,
			reporter_id: take_selected(&mut map, selection, "reporter_id")?,
		})
	}
}

pub struct ReportBuilder;

#[async_trait]
impl ResultBuilder for ReportBuilder {
	type Output = ReportDto;

	async fn build(
		&self,
		_session: &mut Session,
		records: Vec<Value>,
		selection: &FieldSelection,
	) -> paws_server_db::Result<Vec<ReportDto>> {
		records
			.into_iter()
			.map(|record| ReportDto::from_record(record, selection))
			.collect()
	}
}
