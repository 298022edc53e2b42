// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error type and its HTTP mapping.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use paws_common_registry::RegistryError;
use paws_server_auth::AuthError;
use paws_server_db::DbError;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("internal error: {0}")]
	Internal(String),

	#[error(transparent)]
	Database(DbError),

	#[error(transparent)]
	Registry(#[from] RegistryError),
}

impl From<DbError> for ServerError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(msg) => ServerError::NotFound(msg),
			DbError::Conflict(msg) => ServerError::Conflict(msg),
			DbError::InvalidLookup(msg) => ServerError::BadRequest(msg),
			DbError::Auth(e) => ServerError::Auth(e),
			other => ServerError::Database(other),
		}
	}
}

impl From<serde_json::Error> for ServerError {
	fn from(e: serde_json::Error) -> Self {
		ServerError::Database(DbError::Serialization(e))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error: error.into(),
			message: message.into(),
		}
	}
}

impl ServerError {
	pub fn status(&self) -> StatusCode {
		match self {
			ServerError::Auth(AuthError::Authentication(_)) => StatusCode::UNAUTHORIZED,
			ServerError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
			ServerError::Auth(AuthError::UnknownField { .. }) | ServerError::BadRequest(_) => {
				StatusCode::BAD_REQUEST
			}
			ServerError::NotFound(_) => StatusCode::NOT_FOUND,
			ServerError::Conflict(_) => StatusCode::CONFLICT,
			ServerError::Auth(AuthError::Configuration(_))
			| ServerError::Internal(_)
			| ServerError::Database(_)
			| ServerError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = match &self {
			ServerError::Auth(AuthError::Authentication(_)) => {
				ErrorResponse::new("unauthorized", "Authentication required")
			}
			// The denial is logged with the permissions involved; the body stays generic.
			ServerError::Auth(AuthError::Forbidden { .. }) => {
				ErrorResponse::new("forbidden", "Insufficient permissions")
			}
			ServerError::Auth(e @ AuthError::UnknownField { .. }) => {
				ErrorResponse::new("bad_request", e.to_string())
			}
			ServerError::BadRequest(msg) => ErrorResponse::new("bad_request", msg.clone()),
			ServerError::NotFound(msg) => ErrorResponse::new("not_found", msg.clone()),
			ServerError::Conflict(msg) => ErrorResponse::new("conflict", msg.clone()),
			ServerError::Auth(AuthError::Configuration(_))
			| ServerError::Internal(_)
			| ServerError::Database(_)
			| ServerError::Registry(_) => {
				tracing::error!(error = %self, "request failed");
				ErrorResponse::new("internal_error", "Internal server error")
			}
		};
		(status, Json(body)).into_response()
	}
}
