// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Principal plumbing for HTTP handlers.
//!
//! Authentication happens upstream; whatever verified the caller inserts a
//! [`Principal`] into the request extensions. In dev mode the
//! [`dev_principal_layer`] builds one from plain headers instead:
//!
//! - `x-dev-user-id`: the caller's UUID
//! - `x-dev-roles`: comma-separated role names
//! - `x-dev-scope`: comma- or space-separated permission names

use axum::{
	extract::{FromRequestParts, Request, State},
	http::{request::Parts, HeaderMap},
	middleware::Next,
	response::{IntoResponse, Response},
};
use paws_server_auth::{AuthError, Permission, Principal, UserId};
use tracing::instrument;

use crate::error::ServerError;
use crate::state::AppState;

pub const DEV_USER_HEADER: &str = "x-dev-user-id";
pub const DEV_ROLES_HEADER: &str = "x-dev-roles";
pub const DEV_SCOPE_HEADER: &str = "x-dev-scope";

/// The verified caller, if any. Never rejects; the service layer decides
/// what an anonymous caller may do.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Principal>);

impl Caller {
	pub fn principal(&self) -> Option<&Principal> {
		self.0.as_ref()
	}
}

impl<S> FromRequestParts<S> for Caller
where
	S: Send + Sync,
{
	type Rejection = std::convert::Infallible;

	#[instrument(name = "Caller::from_request_parts", skip_all)]
	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let principal = parts.extensions.get::<Principal>().cloned();
		if principal.is_none() {
			tracing::debug!("request carries no principal");
		}
		Ok(Caller(principal))
	}
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get(name)
		.and_then(|v| v.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
}

/// Principal described by the dev headers, or `None` without a user header.
pub fn principal_from_headers(headers: &HeaderMap) -> Result<Option<Principal>, AuthError> {
	let Some(raw_user) = header(headers, DEV_USER_HEADER) else {
		return Ok(None);
	};
	let user: UserId = raw_user
		.parse()
		.map_err(|_| AuthError::Authentication(format!("{DEV_USER_HEADER} is not a UUID")))?;

	let roles: Vec<String> = header(headers, DEV_ROLES_HEADER)
		.map(|raw| {
			raw.split(',')
				.map(str::trim)
				.filter(|r| !r.is_empty())
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default();

	let mut principal = Principal::for_user(user, roles);
	if let Some(raw) = header(headers, DEV_SCOPE_HEADER) {
		let mut scope = Vec::new();
		for name in raw.split([',', ' ']).map(str::trim).filter(|s| !s.is_empty()) {
			match name.parse::<Permission>() {
				Ok(permission) => scope.push(permission),
				Err(_) => {
					tracing::warn!(permission = name, "ignoring unknown permission in dev scope")
				}
			}
		}
		principal = principal.with_scope(scope);
	}
	Ok(Some(principal))
}

/// Inserts a header-described principal when dev mode is on and no upstream
/// layer supplied one.
pub async fn dev_principal_layer(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	if state.dev_mode && request.extensions().get::<Principal>().is_none() {
		match principal_from_headers(request.headers()) {
			Ok(Some(principal)) => {
				tracing::debug!("using dev principal from request headers");
				request.extensions_mut().insert(principal);
			}
			Ok(None) => {}
			Err(e) => return ServerError::Auth(e).into_response(),
		}
	}
	next.run(request).await
}
