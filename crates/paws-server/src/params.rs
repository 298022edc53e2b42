// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query-string parameters for listing endpoints.
//!
//! Lists are comma separated (`?fields=id,animal.name&status=open,resolved`).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use paws_server_auth::FieldPath;
use paws_server_db::{DateRange, Lookup, SortDirection, DEFAULT_PAGE_SIZE};
use serde::Deserialize;

use crate::error::ServerError;
use crate::resources::{
	AnimalCriteria, ApplicationCriteria, ApplicationStatus, ReportCriteria, ReportStatus,
};

/// Paging, sorting, projection and free text shared by every listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupParams {
	pub offset: Option<u64>,
	pub limit: Option<u32>,
	pub sort: Option<String>,
	pub direction: Option<SortDirection>,
	pub fields: Option<String>,
	pub q: Option<String>,
}

impl LookupParams {
	pub fn into_lookup<C>(self, criteria: C) -> Result<Lookup<C>, ServerError> {
		let mut lookup = Lookup::new(criteria);
		lookup.offset = self.offset.unwrap_or(0);
		lookup.page_size = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
		lookup.sort = split(self.sort.as_deref());
		lookup.direction = self.direction.unwrap_or_default();
		lookup.fields = parse_fields(self.fields.as_deref())?;
		lookup.query = self.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
		Ok(lookup)
	}
}

pub fn parse_fields(raw: Option<&str>) -> Result<Vec<FieldPath>, ServerError> {
	split(raw)
		.iter()
		.map(|f| {
			f.parse::<FieldPath>()
				.map_err(|e| ServerError::BadRequest(e.to_string()))
		})
		.collect()
}

fn split(raw: Option<&str>) -> Vec<String> {
	raw.map(|s| {
		s.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect()
	})
	.unwrap_or_default()
}

fn parse_all<T: FromStr<Err = ServerError>>(raw: Option<&str>) -> Result<Vec<T>, ServerError> {
	split(raw).iter().map(|s| s.parse()).collect()
}

fn date_range(
	from: Option<DateTime<Utc>>,
	to: Option<DateTime<Utc>>,
) -> Result<DateRange, ServerError> {
	if let (Some(from), Some(to)) = (from, to) {
		if from > to {
			return Err(ServerError::BadRequest(
				"created_from must not be after created_to".to_string(),
			));
		}
	}
	Ok(DateRange { from, to })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilters {
	pub ids: Option<String>,
	pub status: Option<String>,
	pub subject_ids: Option<String>,
	pub created_from: Option<DateTime<Utc>>,
	pub created_to: Option<DateTime<Utc>>,
}

impl ReportFilters {
	pub fn into_criteria(self) -> Result<ReportCriteria, ServerError> {
		Ok(ReportCriteria {
			ids: split(self.ids.as_deref()),
			statuses: parse_all::<ReportStatus>(self.status.as_deref())?,
			subject_ids: split(self.subject_ids.as_deref()),
			created: date_range(self.created_from, self.created_to)?,
		})
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnimalFilters {
	pub ids: Option<String>,
	pub shelter_ids: Option<String>,
	pub species: Option<String>,
	pub status: Option<String>,
}

impl AnimalFilters {
	pub fn into_criteria(self) -> AnimalCriteria {
		AnimalCriteria {
			ids: split(self.ids.as_deref()),
			shelter_ids: split(self.shelter_ids.as_deref()),
			species: split(self.species.as_deref()),
			statuses: split(self.status.as_deref()),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilters {
	pub ids: Option<String>,
	pub animal_ids: Option<String>,
	pub status: Option<String>,
	pub created_from: Option<DateTime<Utc>>,
	pub created_to: Option<DateTime<Utc>>,
}

impl ApplicationFilters {
	pub fn into_criteria(self) -> Result<ApplicationCriteria, ServerError> {
		Ok(ApplicationCriteria {
			ids: split(self.ids.as_deref()),
			animal_ids: split(self.animal_ids.as_deref()),
			statuses: parse_all::<ApplicationStatus>(self.status.as_deref())?,
			created: date_range(self.created_from, self.created_to)?,
		})
	}
}
