// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field censoring.
//!
//! Every field a resource exposes is declared in code ([`ResourceDeclaration`])
//! and annotated in the field sensitivity table with the permission and
//! authorization paths needed to read it. [`FieldSchemas::from_config`] joins
//! the two at startup and rejects any mismatch.
//!
//! [`FieldCensor::censor`] walks each requested path through the schema tree.
//! A path survives only if every segment along it is readable; a path that
//! stops at a nested object expands to that object's readable scalar fields.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use paws_server_config::FieldRuleConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, instrument};

use crate::authorization::AuthorizationService;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::flags::AuthorizationFlags;
use crate::types::{Permission, ResourceKind};

// =============================================================================
// Field paths
// =============================================================================

/// A dotted path into a resource, e.g. `animal.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<String>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field path '{0}'")]
pub struct InvalidFieldPath(pub String);

impl FieldPath {
	pub fn segments(&self) -> &[String] {
		&self.0
	}

	pub fn first(&self) -> &str {
		// Parsing guarantees at least one segment.
		self.0.first().map(String::as_str).unwrap_or_default()
	}

	pub fn child(&self, name: &str) -> Self {
		let mut segments = self.0.clone();
		segments.push(name.to_string());
		Self(segments)
	}

	/// The path with its first segment removed, if anything remains.
	pub fn tail(&self) -> Option<Self> {
		(self.0.len() > 1).then(|| Self(self.0[1..].to_vec()))
	}

	fn single(name: &str) -> Self {
		Self(vec![name.to_string()])
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.join("."))
	}
}

impl FromStr for FieldPath {
	type Err = InvalidFieldPath;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let segments: Vec<String> = s.trim().split('.').map(str::to_string).collect();
		if segments.iter().any(|seg| seg.is_empty()) {
			return Err(InvalidFieldPath(s.to_string()));
		}
		Ok(Self(segments))
	}
}

impl Serialize for FieldPath {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for FieldPath {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

// =============================================================================
// Schemas
// =============================================================================

/// A field as exposed by a resource DTO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredField {
	pub name: &'static str,
	pub nested: Option<ResourceKind>,
}

impl DeclaredField {
	pub const fn scalar(name: &'static str) -> Self {
		Self { name, nested: None }
	}

	pub const fn nested(name: &'static str, kind: ResourceKind) -> Self {
		Self {
			name,
			nested: Some(kind),
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceDeclaration {
	pub kind: ResourceKind,
	pub fields: &'static [DeclaredField],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
	pub permission: Permission,
	pub flags: AuthorizationFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
	/// `None` means the field is public.
	pub requirement: Option<Requirement>,
	pub nested: Option<ResourceKind>,
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
	kind: ResourceKind,
	fields: Vec<(String, FieldRule)>,
}

impl FieldSchema {
	pub fn kind(&self) -> ResourceKind {
		self.kind
	}

	pub fn field(&self, name: &str) -> Option<&FieldRule> {
		self.fields.iter().find(|(n, _)| n == name).map(|(_, rule)| rule)
	}

	pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
		self.fields.iter().map(|(n, rule)| (n.as_str(), rule))
	}
}

/// Validated field sensitivity for every declared resource.
#[derive(Debug, Clone, Default)]
pub struct FieldSchemas {
	schemas: HashMap<ResourceKind, FieldSchema>,
}

impl FieldSchemas {
	pub fn from_config(
		declarations: &[ResourceDeclaration],
		table: &BTreeMap<String, BTreeMap<String, FieldRuleConfig>>,
	) -> Result<Self, AuthError> {
		let declared: HashMap<ResourceKind, &ResourceDeclaration> =
			declarations.iter().map(|d| (d.kind, d)).collect();

		for name in table.keys() {
			let kind: ResourceKind = name.parse()?;
			if !declared.contains_key(&kind) {
				return Err(AuthError::Configuration(format!(
					"field rules given for undeclared resource '{kind}'"
				)));
			}
		}

		let mut schemas = HashMap::with_capacity(declarations.len());
		for declaration in declarations {
			let kind = declaration.kind;
			let rules = table.get(kind.as_str()).ok_or_else(|| {
				AuthError::Configuration(format!("no field rules for resource '{kind}'"))
			})?;
			let schema = build_schema(declaration, rules)?;
			schemas.insert(kind, schema);
		}

		for schema in schemas.values() {
			for (name, rule) in schema.fields() {
				if let Some(nested) = rule.nested {
					if !schemas.contains_key(&nested) {
						return Err(AuthError::Configuration(format!(
							"{}.{name} nests undeclared resource '{nested}'",
							schema.kind
						)));
					}
				}
			}
		}

		info!(resources = schemas.len(), "field schemas loaded");
		Ok(Self { schemas })
	}

	pub fn schema(&self, kind: ResourceKind) -> Option<&FieldSchema> {
		self.schemas.get(&kind)
	}

	fn require_schema(&self, kind: ResourceKind) -> Result<&FieldSchema, AuthError> {
		self
			.schema(kind)
			.ok_or_else(|| AuthError::Configuration(format!("no field schema for '{kind}'")))
	}

	/// Fail unless `path` names a declared field of `kind`.
	pub fn validate(&self, kind: ResourceKind, path: &FieldPath) -> Result<(), AuthError> {
		let mut schema = self.require_schema(kind)?;
		let segments = path.segments();
		for (i, segment) in segments.iter().enumerate() {
			let unknown = || AuthError::UnknownField {
				resource: kind,
				field: path.to_string(),
			};
			let rule = schema.field(segment).ok_or_else(unknown)?;
			let is_last = i + 1 == segments.len();
			if !is_last {
				let nested = rule.nested.ok_or_else(unknown)?;
				schema = self.require_schema(nested)?;
			}
		}
		Ok(())
	}

	/// Top-level fields of `kind` in declaration order.
	pub fn default_fields(&self, kind: ResourceKind) -> Vec<FieldPath> {
		self
			.schema(kind)
			.map(|schema| schema.fields().map(|(n, _)| FieldPath::single(n)).collect())
			.unwrap_or_default()
	}
}

fn build_schema(
	declaration: &ResourceDeclaration,
	rules: &BTreeMap<String, FieldRuleConfig>,
) -> Result<FieldSchema, AuthError> {
	let kind = declaration.kind;
	let declared_names: BTreeSet<&str> = declaration.fields.iter().map(|f| f.name).collect();
	let configured_names: BTreeSet<&str> = rules.keys().map(String::as_str).collect();

	if let Some(extra) = configured_names.difference(&declared_names).next() {
		return Err(AuthError::Configuration(format!(
			"field rule for undeclared field {kind}.{extra}"
		)));
	}
	if let Some(missing) = declared_names.difference(&configured_names).next() {
		return Err(AuthError::Configuration(format!(
			"declared field {kind}.{missing} has no field rule"
		)));
	}

	let mut fields = Vec::with_capacity(declaration.fields.len());
	for declared in declaration.fields {
		let config = rules.get(declared.name).cloned().unwrap_or_default();
		let requirement = match (config.permission, config.flags) {
			(None, None) => None,
			(None, Some(_)) => {
				return Err(AuthError::Configuration(format!(
					"{kind}.{} has flags but no permission",
					declared.name
				)))
			}
			(Some(permission), flags) => Some(Requirement {
				permission: permission.parse()?,
				flags: match flags {
					Some(names) => AuthorizationFlags::parse_names(&names)?,
					None => AuthorizationFlags::PERMISSION,
				},
			}),
		};

		if let Some(nested) = config.nested {
			let nested: ResourceKind = nested.parse()?;
			if declared.nested != Some(nested) {
				return Err(AuthError::Configuration(format!(
					"{kind}.{} is configured as nested '{nested}' but declared as {:?}",
					declared.name, declared.nested
				)));
			}
		}

		fields.push((
			declared.name.to_string(),
			FieldRule {
				requirement,
				nested: declared.nested,
			},
		));
	}

	Ok(FieldSchema { kind, fields })
}

// =============================================================================
// Censor
// =============================================================================

/// Censor for one resource kind.
#[derive(Debug, Clone)]
pub struct FieldCensor {
	kind: ResourceKind,
	schemas: Arc<FieldSchemas>,
	authz: AuthorizationService,
}

impl FieldCensor {
	pub fn new(
		kind: ResourceKind,
		schemas: Arc<FieldSchemas>,
		authz: AuthorizationService,
	) -> Self {
		Self {
			kind,
			schemas,
			authz,
		}
	}

	pub fn kind(&self) -> ResourceKind {
		self.kind
	}

	/// Ownership and affiliation describe the top-level target only, so
	/// fields of nested objects are readable through the permission path alone.
	fn readable(&self, kind: ResourceKind, rule: &FieldRule, ctx: &AuthContext) -> bool {
		let Some(req) = rule.requirement else {
			return true;
		};
		let flags = if kind == self.kind {
			req.flags
		} else {
			req.flags & AuthorizationFlags::PERMISSION
		};
		self.authz.authorize(ctx, req.permission, flags)
	}

	/// Readable scalar fields of a nested object, prefixed by `prefix`.
	fn expand(&self, prefix: &FieldPath, kind: ResourceKind, ctx: &AuthContext) -> Vec<FieldPath> {
		let Some(schema) = self.schemas.schema(kind) else {
			return Vec::new();
		};
		schema
			.fields()
			.filter(|(_, rule)| rule.nested.is_none() && self.readable(kind, rule, ctx))
			.map(|(name, _)| prefix.child(name))
			.collect()
	}

	/// Walk `path` from `kind`; `None` when any segment is unreadable.
	fn walk(
		&self,
		kind: ResourceKind,
		path: &FieldPath,
		ctx: &AuthContext,
	) -> Result<Option<Vec<FieldPath>>, AuthError> {
		let mut schema = self.schemas.require_schema(kind)?;
		let segments = path.segments();
		for (i, segment) in segments.iter().enumerate() {
			let rule = schema.field(segment).ok_or_else(|| AuthError::UnknownField {
				resource: self.kind,
				field: path.to_string(),
			})?;
			if !self.readable(schema.kind(), rule, ctx) {
				return Ok(None);
			}
			let is_last = i + 1 == segments.len();
			match (rule.nested, is_last) {
				(Some(nested), true) => return Ok(Some(self.expand(path, nested, ctx))),
				(Some(nested), false) => schema = self.schemas.require_schema(nested)?,
				(None, true) => return Ok(Some(vec![path.clone()])),
				(None, false) => {
					return Err(AuthError::UnknownField {
						resource: self.kind,
						field: path.to_string(),
					})
				}
			}
		}
		Ok(None)
	}

	/// Reduce `requested` to the paths the caller may read.
	///
	/// Unreadable paths are dropped silently. Request order is kept and
	/// duplicates are removed. Unknown paths fail with
	/// [`AuthError::UnknownField`].
	#[instrument(
		level = "debug",
		skip(self, requested, ctx),
		fields(resource = %self.kind, user_id = %ctx.user_id(), requested = requested.len())
	)]
	pub fn censor(
		&self,
		requested: &[FieldPath],
		ctx: &AuthContext,
	) -> Result<Vec<FieldPath>, AuthError> {
		let mut seen = HashSet::new();
		let mut allowed = Vec::new();
		for path in requested {
			if let Some(paths) = self.walk(self.kind, path, ctx)? {
				for p in paths {
					if seen.insert(p.clone()) {
						allowed.push(p);
					}
				}
			}
		}
		debug!(allowed = allowed.len(), "fields censored");
		Ok(allowed)
	}

	/// [`FieldCensor::censor`], expanding an empty request to the default
	/// fields and failing with [`AuthError::Forbidden`] when nothing is left.
	pub fn censor_or_forbid(
		&self,
		requested: &[FieldPath],
		ctx: &AuthContext,
	) -> Result<Vec<FieldPath>, AuthError> {
		let defaults;
		let requested = if requested.is_empty() {
			defaults = self.schemas.default_fields(self.kind);
			&defaults[..]
		} else {
			requested
		};

		let allowed = self.censor(requested, ctx)?;
		if !allowed.is_empty() {
			return Ok(allowed);
		}

		let permissions = self.required_permissions(requested);
		info!(
			user_id = %ctx.user_id(),
			resource = %self.kind,
			permissions = ?permissions,
			"every requested field was censored"
		);
		Err(AuthError::Forbidden {
			permissions,
			resource: self.kind,
		})
	}

	/// Permissions guarding any segment of `paths`, deduplicated.
	fn required_permissions(&self, paths: &[FieldPath]) -> Vec<Permission> {
		let mut permissions = BTreeSet::new();
		for path in paths {
			let mut schema = self.schemas.schema(self.kind);
			for segment in path.segments() {
				let Some(rule) = schema.and_then(|s| s.field(segment)) else {
					break;
				};
				if let Some(req) = rule.requirement {
					permissions.insert(req.permission);
				}
				schema = rule.nested.and_then(|kind| self.schemas.schema(kind));
			}
		}
		permissions.into_iter().collect()
	}
}
