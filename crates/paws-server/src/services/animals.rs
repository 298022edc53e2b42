// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Animal listings.

use paws_server_auth::{Permission, Principal};
use paws_server_db::Lookup;
use tracing::instrument;

use super::{Listing, Page};
use crate::error::ServerError;
use crate::resources::{Animal, AnimalBuilder, AnimalCriteria, AnimalDto};
use crate::state::AppState;

#[instrument(skip(state, principal, lookup), fields(offset = lookup.offset))]
pub async fn list_animals(
	state: &AppState,
	principal: Option<&Principal>,
	lookup: Lookup<AnimalCriteria>,
) -> Result<Page<AnimalDto>, ServerError> {
	Listing::<Animal, _> {
		state,
		principal,
		permission: Permission::ViewAnimals,
		builder: &AnimalBuilder,
		lookup,
	}
	.run()
	.await
}
