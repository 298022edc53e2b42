// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filter expressions over JSON documents, compiled to SQLite SQL.
//!
//! Field names are dotted paths into the document body. `Eq` and `In` match
//! a scalar field or any element of an array field.

use serde_json::Value;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
	All,
	Nothing,
	Eq { field: String, value: Value },
	In { field: String, values: Vec<Value> },
	Range {
		field: String,
		gte: Option<Value>,
		lte: Option<Value>,
	},
	/// Inclusive range over RFC 3339 timestamps, compared as instants so
	/// that `...00Z` and `...00.000Z` are equal.
	TimeRange {
		field: String,
		from: Option<String>,
		to: Option<String>,
	},
	/// Case-insensitive substring match against any of `fields`.
	Text { fields: Vec<String>, query: String },
	And(Vec<Filter>),
	Or(Vec<Filter>),
}

impl Filter {
	pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
		Filter::Eq {
			field: field.into(),
			value: value.into(),
		}
	}

	pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Filter::In {
			field: field.into(),
			values: values.into_iter().map(Into::into).collect(),
		}
	}

	/// AND of `filters`, dropping `All` and collapsing on `Nothing`.
	pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
		let mut parts = Vec::new();
		for filter in filters {
			match filter {
				Filter::All => {}
				Filter::Nothing => return Filter::Nothing,
				other => parts.push(other),
			}
		}
		match parts.len() {
			0 => Filter::All,
			1 => parts.remove(0),
			_ => Filter::And(parts),
		}
	}

	/// OR of `filters`, dropping `Nothing` and collapsing on `All`.
	pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
		let mut parts = Vec::new();
		for filter in filters {
			match filter {
				Filter::Nothing => {}
				Filter::All => return Filter::All,
				other => parts.push(other),
			}
		}
		match parts.len() {
			0 => Filter::Nothing,
			1 => parts.remove(0),
			_ => Filter::Or(parts),
		}
	}
}

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
	Null,
	Integer(i64),
	Real(f64),
	Text(String),
}

impl SqlValue {
	fn from_json(value: &Value) -> Result<Self> {
		Ok(match value {
			Value::Null => SqlValue::Null,
			Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
			Value::Number(n) => match n.as_i64() {
				Some(i) => SqlValue::Integer(i),
				None => SqlValue::Real(n.as_f64().unwrap_or_default()),
			},
			Value::String(s) => SqlValue::Text(s.clone()),
			Value::Array(_) | Value::Object(_) => {
				return Err(DbError::InvalidLookup(
					"filters compare against scalar values only".to_string(),
				))
			}
		})
	}
}

/// Compiled WHERE fragment plus its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
	pub sql: String,
	pub params: Vec<SqlValue>,
}

/// `field.sub` -> `$.field.sub`, rejecting anything but identifiers.
pub fn json_path(field: &str) -> Result<String> {
	let valid = !field.is_empty()
		&& field.split('.').all(|segment| {
			!segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
		});
	if !valid {
		return Err(DbError::InvalidLookup(format!("invalid field name '{field}'")));
	}
	Ok(format!("$.{field}"))
}

fn escape_like(query: &str) -> String {
	let mut escaped = String::with_capacity(query.len() + 2);
	escaped.push('%');
	for c in query.to_lowercase().chars() {
		if matches!(c, '%' | '_' | '\\') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped.push('%');
	escaped
}

impl Filter {
	pub fn compile(&self) -> Result<CompiledFilter> {
		let mut params = Vec::new();
		let sql = self.compile_into(&mut params)?;
		Ok(CompiledFilter { sql, params })
	}

	fn compile_into(&self, params: &mut Vec<SqlValue>) -> Result<String> {
		match self {
			Filter::All => Ok("1 = 1".to_string()),
			Filter::Nothing => Ok("1 = 0".to_string()),
			Filter::Eq { field, value } => Filter::In {
				field: field.clone(),
				values: vec![value.clone()],
			}
			.compile_into(params),
			Filter::In { field, values } => {
				if values.is_empty() {
					return Ok("1 = 0".to_string());
				}
				params.push(SqlValue::Text(json_path(field)?));
				for value in values {
					params.push(SqlValue::from_json(value)?);
				}
				let placeholders = vec!["?"; values.len()].join(", ");
				Ok(format!(
					"EXISTS (SELECT 1 FROM json_each(documents.body, ?) AS je \
					 WHERE je.value IN ({placeholders}))"
				))
			}
			Filter::Range { field, gte, lte } => {
				let path = json_path(field)?;
				let mut clauses = Vec::new();
				if let Some(gte) = gte {
					params.push(SqlValue::Text(path.clone()));
					params.push(SqlValue::from_json(gte)?);
					clauses.push("json_extract(documents.body, ?) >= ?");
				}
				if let Some(lte) = lte {
					params.push(SqlValue::Text(path));
					params.push(SqlValue::from_json(lte)?);
					clauses.push("json_extract(documents.body, ?) <= ?");
				}
				if clauses.is_empty() {
					return Ok("1 = 1".to_string());
				}
				Ok(format!("({})", clauses.join(" AND ")))
			}
			Filter::TimeRange { field, from, to } => {
				let path = json_path(field)?;
				let mut clauses = Vec::new();
				if let Some(from) = from {
					params.push(SqlValue::Text(path.clone()));
					params.push(SqlValue::Text(from.clone()));
					clauses.push("julianday(json_extract(documents.body, ?)) >= julianday(?)");
				}
				if let Some(to) = to {
					params.push(SqlValue::Text(path));
					params.push(SqlValue::Text(to.clone()));
					clauses.push("julianday(json_extract(documents.body, ?)) <= julianday(?)");
				}
				if clauses.is_empty() {
					return Ok("1 = 1".to_string());
				}
				Ok(format!("({})", clauses.join(" AND ")))
			}
			Filter::Text { fields, query } => {
				if fields.is_empty() {
					return Ok("1 = 0".to_string());
				}
				let pattern = escape_like(query);
				let mut clauses = Vec::with_capacity(fields.len());
				for field in fields {
					params.push(SqlValue::Text(json_path(field)?));
					params.push(SqlValue::Text(pattern.clone()));
					clauses.push(r"lower(json_extract(documents.body, ?)) LIKE ? ESCAPE '\'");
				}
				Ok(format!("({})", clauses.join(" OR ")))
			}
			Filter::And(filters) => Self::compile_group(filters, " AND ", "1 = 1", params),
			Filter::Or(filters) => Self::compile_group(filters, " OR ", "1 = 0", params),
		}
	}

	fn compile_group(
		filters: &[Filter],
		joiner: &str,
		empty: &str,
		params: &mut Vec<SqlValue>,
	) -> Result<String> {
		if filters.is_empty() {
			return Ok(empty.to_string());
		}
		let parts = filters
			.iter()
			.map(|f| f.compile_into(params))
			.collect::<Result<Vec<_>>>()?;
		Ok(format!("({})", parts.join(joiner)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn empty_groups_and_lists() {
		assert_eq!(Filter::And(vec![]).compile().unwrap().sql, "1 = 1");
		assert_eq!(Filter::Or(vec![]).compile().unwrap().sql, "1 = 0");
		assert_eq!(
			Filter::is_in("status", Vec::<Value>::new()).compile().unwrap().sql,
			"1 = 0"
		);
	}

	#[test]
	fn and_or_helpers_simplify() {
		assert_eq!(Filter::and([Filter::All, Filter::All]), Filter::All);
		assert_eq!(
			Filter::and([Filter::eq("a", 1), Filter::Nothing]),
			Filter::Nothing
		);
		assert_eq!(Filter::or([Filter::Nothing]), Filter::Nothing);
		assert_eq!(Filter::or([Filter::eq("a", 1), Filter::All]), Filter::All);
		assert_eq!(Filter::and([Filter::eq("a", 1)]), Filter::eq("a", 1));
	}

	#[test]
	fn params_follow_placeholder_order() {
		let filter = Filter::and([
			Filter::is_in("status", ["open", "closed"]),
			Filter::Range {
				field: "created_at".to_string(),
				gte: Some(json!("2025-01-01")),
				lte: None,
			},
			Filter::eq("flagged", true),
		]);
		let compiled = filter.compile().unwrap();
		assert_eq!(compiled.sql.matches('?').count(), compiled.params.len());
		assert_eq!(
			compiled.params,
			vec![
				SqlValue::Text("$.status".to_string()),
				SqlValue::Text("open".to_string()),
				SqlValue::Text("closed".to_string()),
				SqlValue::Text("$.created_at".to_string()),
				SqlValue::Text("2025-01-01".to_string()),
				SqlValue::Text("$.flagged".to_string()),
				SqlValue::Integer(1),
			]
		);
	}

	#[test]
	fn time_range_compares_instants() {
		let compiled = Filter::TimeRange {
			field: "created_at".to_string(),
			from: None,
			to: Some("2025-06-01T08:30:00Z".to_string()),
		}
		.compile()
		.unwrap();
		assert_eq!(
			compiled.sql,
			"(julianday(json_extract(documents.body, ?)) <= julianday(?))"
		);
		assert_eq!(
			compiled.params,
			vec![
				SqlValue::Text("$.created_at".to_string()),
				SqlValue::Text("2025-06-01T08:30:00Z".to_string()),
			]
		);
	}

	#[test]
	fn text_pattern_is_escaped_and_lowercased() {
		let compiled = Filter::Text {
			fields: vec!["reason".to_string()],
			query: "50%_Off".to_string(),
		}
		.compile()
		.unwrap();
		assert_eq!(
			compiled.params[1],
			SqlValue::Text(r"%50\%\_off%".to_string())
		);
	}

	#[test]
	fn field_names_are_checked() {
		assert!(json_path("animal.name").is_ok());
		for bad in ["", "a..b", "name'); DROP TABLE documents; --", "$.x"] {
			assert!(json_path(bad).is_err(), "{bad}");
		}
		assert!(Filter::eq("x", json!({ "nested": 1 })).compile().is_err());
	}
}
