// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Adoption application listings.

use paws_server_auth::{Permission, Principal};
use paws_server_db::Lookup;
use tracing::instrument;

use super::{Listing, Page};
use crate::error::ServerError;
use crate::resources::{Application, ApplicationBuilder, ApplicationCriteria, ApplicationDto};
use crate::state::AppState;

#[instrument(skip(state, principal, lookup), fields(offset = lookup.offset))]
pub async fn list_applications(
	state: &AppState,
	principal: Option<&Principal>,
	lookup: Lookup<ApplicationCriteria>,
) -> Result<Page<ApplicationDto>, ServerError> {
	Listing::<Application, _> {
		state,
		principal,
		permission: Permission::ViewApplications,
		builder: &ApplicationBuilder,
		lookup,
	}
	.run()
	.await
}
