// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report HTTP handlers.

use axum::{
	extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
	Json,
};

use super::{bad_json, bad_query, FieldsParams};
use crate::dev_auth::Caller;
use crate::error::ServerError;
use crate::params::{parse_fields, LookupParams, ReportFilters};
use crate::resources::ReportDto;
use crate::services::reports::{self as service, UpdateReport};
use crate::services::Page;
use crate::state::AppState;

/// GET /api/v1/reports
#[tracing::instrument(skip_all)]
pub async fn list_reports(
	State(state): State<AppState>,
	caller: Caller,
	lookup: Result<Query<LookupParams>, QueryRejection>,
	filters: Result<Query<ReportFilters>, QueryRejection>,
) -> Result<Json<Page<ReportDto>>, ServerError> {
	let Query(lookup) = lookup.map_err(bad_query)?;
	let Query(filters) = filters.map_err(bad_query)?;
	let lookup = lookup.into_lookup(filters.into_criteria()?)?;
	let page = service::list_reports(&state, caller.principal(), lookup).await?;
	Ok(Json(page))
}

/// GET /api/v1/reports/{id}
#[tracing::instrument(skip(state, caller, params), fields(%id))]
pub async fn get_report(
	State(state): State<AppState>,
	caller: Caller,
	Path(id): Path<String>,
	params: Result<Query<FieldsParams>, QueryRejection>,
) -> Result<Json<ReportDto>, ServerError> {
	let Query(params) = params.map_err(bad_query)?;
	let fields = parse_fields(params.fields.as_deref())?;
	let report = service::get_report(&state, caller.principal(), &id, &fields).await?;
	Ok(Json(report))
}

/// PATCH /api/v1/reports/{id}
#[tracing::instrument(skip(state, caller, body), fields(%id))]
pub async fn update_report(
	State(state): State<AppState>,
	caller: Caller,
	Path(id): Path<String>,
	body: Result<Json<UpdateReport>, JsonRejection>,
) -> Result<Json<ReportDto>, ServerError> {
	let Json(update) = body.map_err(bad_json)?;
	let report = service::update_report(&state, caller.principal(), &id, update).await?;
	Ok(Json(report))
}
