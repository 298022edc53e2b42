// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed, paginated lookups.

use chrono::{DateTime, SecondsFormat, Utc};
use paws_server_auth::{FieldPath, ResourceKind, ResourceTarget};
use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::filter::Filter;
use crate::store::SortDirection;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Resource-specific filter fields of a [`Lookup`].
pub trait Criteria: Send + Sync {
	fn filter(&self) -> Filter;

	/// Record ids the lookup is restricted to, if any.
	fn ids(&self) -> Vec<String> {
		Vec::new()
	}
}

impl Criteria for () {
	fn filter(&self) -> Filter {
		Filter::All
	}
}

#[derive(Debug, Clone)]
pub struct Lookup<C> {
	pub offset: u64,
	pub page_size: u32,
	/// Body fields to sort by; each must be sortable on the resource.
	pub sort: Vec<String>,
	pub direction: SortDirection,
	/// Requested fields. Empty means the resource's default fields.
	pub fields: Vec<FieldPath>,
	/// Free-text query over the resource's text fields.
	pub query: Option<String>,
	pub criteria: C,
}

impl<C: Default> Default for Lookup<C> {
	fn default() -> Self {
		Self::new(C::default())
	}
}

impl<C> Lookup<C> {
	pub fn new(criteria: C) -> Self {
		Self {
			offset: 0,
			page_size: DEFAULT_PAGE_SIZE,
			sort: Vec::new(),
			direction: SortDirection::Asc,
			fields: Vec::new(),
			query: None,
			criteria,
		}
	}

	pub fn validate(&self) -> Result<()> {
		if self.page_size == 0 {
			return Err(DbError::InvalidLookup("page size must be positive".to_string()));
		}
		Ok(())
	}

	pub fn limit(&self) -> u32 {
		self.page_size.min(MAX_PAGE_SIZE)
	}

	pub fn with_fields(mut self, fields: Vec<FieldPath>) -> Self {
		self.fields = fields;
		self
	}
}

impl<C: Criteria> Lookup<C> {
	/// What this lookup requests, for ownership and affiliation descriptors.
	pub fn target(&self, kind: ResourceKind) -> ResourceTarget {
		ResourceTarget {
			kind,
			ids: self.criteria.ids(),
		}
	}
}

/// Inclusive date range over an RFC 3339 timestamp field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
	pub from: Option<DateTime<Utc>>,
	pub to: Option<DateTime<Utc>>,
}

impl DateRange {
	pub fn is_empty(&self) -> bool {
		self.from.is_none() && self.to.is_none()
	}

	pub fn to_filter(&self, field: &str) -> Filter {
		if self.is_empty() {
			return Filter::All;
		}
		let format = |d: DateTime<Utc>| d.to_rfc3339_opts(SecondsFormat::AutoSi, true);
		Filter::TimeRange {
			field: field.to_string(),
			from: self.from.map(format),
			to: self.to.map(format),
		}
	}
}

/// `field IN ids`, or no restriction when `ids` is empty.
pub fn ids_filter(field: &str, ids: &[String]) -> Filter {
	if ids.is_empty() {
		Filter::All
	} else {
		Filter::is_in(field, ids.iter().cloned())
	}
}
