// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub database: HealthStatus,
	pub version: String,
}

/// GET /health - Database round trip; 503 when it fails.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database = match state.store.ping().await {
		Ok(()) => HealthStatus::Healthy,
		Err(e) => {
			tracing::warn!(error = %e, "database health check failed");
			HealthStatus::Unhealthy
		}
	};
	let code = match database {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(
		code,
		Json(HealthResponse {
			status: database,
			database,
			version: env!("CARGO_PKG_VERSION").to_string(),
		}),
	)
}
