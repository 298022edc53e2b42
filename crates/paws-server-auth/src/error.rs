// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::{Permission, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
	/// No verified principal, or its user id claim is missing or malformed.
	#[error("authentication required: {0}")]
	Authentication(String),

	#[error("forbidden: {resource} requires one of {}", join_permissions(.permissions))]
	Forbidden {
		permissions: Vec<Permission>,
		resource: ResourceKind,
	},

	#[error("authorization configuration error: {0}")]
	Configuration(String),

	#[error("unknown field '{field}' on {resource}")]
	UnknownField {
		resource: ResourceKind,
		field: String,
	},
}

impl AuthError {
	pub fn forbidden(permission: Permission, resource: ResourceKind) -> Self {
		Self::Forbidden {
			permissions: vec![permission],
			resource,
		}
	}
}

fn join_permissions(permissions: &[Permission]) -> String {
	permissions
		.iter()
		.map(Permission::as_str)
		.collect::<Vec<_>>()
		.join(", ")
}
