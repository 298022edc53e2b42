// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{
	extract::{rejection::QueryRejection, Query, State},
	Json,
};

use super::bad_query;
use crate::dev_auth::Caller;
use crate::error::ServerError;
use crate::params::{AnimalFilters, LookupParams};
use crate::resources::AnimalDto;
use crate::services::{animals as service, Page};
use crate::state::AppState;

/// GET /api/v1/animals
#[tracing::instrument(skip_all)]
pub async fn list_animals(
	State(state): State<AppState>,
	caller: Caller,
	lookup: Result<Query<LookupParams>, QueryRejection>,
	filters: Result<Query<AnimalFilters>, QueryRejection>,
) -> Result<Json<Page<AnimalDto>>, ServerError> {
	let Query(lookup) = lookup.map_err(bad_query)?;
	let Query(filters) = filters.map_err(bad_query)?;
	let lookup = lookup.into_lookup(filters.into_criteria())?;
	Ok(Json(service::list_animals(&state, caller.principal(), lookup).await?))
}
