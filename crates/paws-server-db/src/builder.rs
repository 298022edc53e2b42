// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hydrating response DTOs from raw records.

use std::collections::BTreeMap;

use async_trait::async_trait;
use paws_server_auth::FieldPath;
use serde_json::Value;

use crate::error::Result;
use crate::store::Session;

/// Tree of the field paths a caller may read.
///
/// `animal.name` and `animal.breed` become one `animal` node with two
/// children. A node without children selects the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
	children: BTreeMap<String, FieldSelection>,
}

impl FieldSelection {
	pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a FieldPath>) -> Self {
		let mut root = Self::default();
		for path in paths {
			let mut node = &mut root;
			for segment in path.segments() {
				node = node.children.entry(segment.clone()).or_default();
			}
		}
		root
	}

	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	pub fn contains(&self, field: &str) -> bool {
		self.children.contains_key(field)
	}

	/// Selection below `field`, if `field` is selected.
	pub fn nested(&self, field: &str) -> Option<&FieldSelection> {
		self.children.get(field)
	}

	pub fn fields(&self) -> impl Iterator<Item = &str> {
		self.children.keys().map(String::as_str)
	}
}

/// Turns raw records into response DTOs.
///
/// Implementations populate only what `selection` names and leave the rest
/// unset. Referenced records outside the selection are not loaded. Output
/// order matches `records` and nothing is deduplicated.
#[async_trait]
pub trait ResultBuilder: Send + Sync {
	type Output: Send;

	async fn build(
		&self,
		session: &mut Session,
		records: Vec<Value>,
		selection: &FieldSelection,
	) -> Result<Vec<Self::Output>>;
}

/// `Some(value)` when `field` is selected and present on `record`.
pub fn take_selected<T: serde::de::DeserializeOwned>(
	record: &mut serde_json::Map<String, Value>,
	selection: &FieldSelection,
	field: &str,
) -> Result<Option<T>> {
	if !selection.contains(field) {
		return Ok(None);
	}
	match record.remove(field) {
		None | Some(Value::Null) => Ok(None),
		Some(value) => Ok(Some(serde_json::from_value(value)?)),
	}
}
