// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP routes.

pub mod animals;
pub mod applications;
pub mod health;
pub mod reports;

use axum::{
	extract::rejection::{JsonRejection, QueryRejection},
	middleware::from_fn_with_state,
	routing::get,
	Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::dev_auth::dev_principal_layer;
use crate::error::ServerError;
use crate::state::AppState;

/// `?fields=` on single-record reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsParams {
	pub fields: Option<String>,
}

pub(crate) fn bad_query(rejection: QueryRejection) -> ServerError {
	ServerError::BadRequest(rejection.body_text())
}

pub(crate) fn bad_json(rejection: JsonRejection) -> ServerError {
	ServerError::BadRequest(rejection.body_text())
}

pub fn create_router(state: AppState) -> Router {
	let api = Router::new()
		.route("/reports", get(reports::list_reports))
		.route(
			"/reports/{id}",
			get(reports::get_report).patch(reports::update_report),
		)
		.route("/animals", get(animals::list_animals))
		.route("/applications", get(applications::list_applications));

	Router::new()
		.route("/health", get(health::health_check))
		.nest("/api/v1", api)
		.layer(from_fn_with_state(state.clone(), dev_principal_layer))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
