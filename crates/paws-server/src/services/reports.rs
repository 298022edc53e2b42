// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report moderation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use paws_server_auth::{
	extract_user_id, AuthorizationFlags, FieldPath, Permission, Principal, ResourceKind, UserId,
};
use paws_server_db::{FieldSelection, Lookup, Queryable, ResultBuilder, Session};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use super::{record_context, Listing, Page, READ_FLAGS};
use crate::error::ServerError;
use crate::notifications::{Notification, NotificationSender};
use crate::resources::report::{COLLECTION, NOTES_COLLECTION};
use crate::resources::{owner_ids, Report, ReportBuilder, ReportCriteria, ReportDto, ReportStatus};
use crate::state::AppState;

/// Paths accepted for editing a report. Status changes need the permission
/// itself.
pub const EDIT_FLAGS: AuthorizationFlags = AuthorizationFlags::OWNER_OR_PERMISSION_OR_AFFILIATION;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateReport {
	pub status: Option<ReportStatus>,
	pub details: Option<String>,
	/// Moderation note appended to the report's history.
	pub note: Option<String>,
}

impl UpdateReport {
	fn changes(&self) -> Map<String, Value> {
		let mut changes = Map::new();
		if let Some(status) = self.status {
			changes.insert("status".to_string(), Value::String(status.as_str().to_string()));
		}
		if let Some(details) = &self.details {
			changes.insert("details".to_string(), Value::String(details.clone()));
		}
		changes
	}

	fn is_empty(&self) -> bool {
		self.status.is_none() && self.details.is_none() && self.note.is_none()
	}
}

/// History entry written alongside every report update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportNote {
	pub id: String,
	pub report_id: String,
	pub author_id: UserId,
	pub status: Option<ReportStatus>,
	pub note: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[instrument(skip(state, principal, lookup), fields(offset = lookup.offset))]
pub async fn list_reports(
	state: &AppState,
	principal: Option<&Principal>,
	lookup: Lookup<ReportCriteria>,
) -> Result<Page<ReportDto>, ServerError> {
	Listing::<Report, _> {
		state,
		principal,
		permission: Permission::ViewReports,
		builder: &ReportBuilder,
		lookup,
	}
	.run()
	.await
}

#[instrument(skip(state, principal, fields))]
pub async fn get_report(
	state: &AppState,
	principal: Option<&Principal>,
	id: &str,
	fields: &[FieldPath],
) -> Result<ReportDto, ServerError> {
	extract_user_id(principal)?;
	let mut session = state.store.connect().await?;
	let record = load(&mut session, id).await?;

	let ctx = record_context::<Report>(&state.authz, principal, Permission::ViewReports, &record)?;
	state
		.authz
		.require(&ctx, Permission::ViewReports, READ_FLAGS, ResourceKind::Report)?;

	let censor = state.censor(ResourceKind::Report)?;
	let allowed = censor.censor_or_forbid(fields, &ctx)?;
	build_one(&mut session, record, &allowed).await
}

/// Apply `update`, append a history note and notify the reporter, all in
/// one transaction. The returned view is censored after commit.
#[instrument(skip(state, principal, update))]
pub async fn update_report(
	state: &AppState,
	principal: Option<&Principal>,
	id: &str,
	update: UpdateReport,
) -> Result<ReportDto, ServerError> {
	let caller = extract_user_id(principal)?;
	if update.is_empty() {
		return Err(ServerError::BadRequest("nothing to update".to_string()));
	}
	let censor = state.censor(ResourceKind::Report)?;
	let senders = state.senders()?;

	let mut session = state.store.begin().await?;
	let scope = UpdateScope {
		principal,
		caller,
		senders: &senders,
	};
	let outcome = apply_update(state, &mut session, scope, id, &update).await;
	let updated = session.finish(outcome).await?;

	let ctx = record_context::<Report>(&state.authz, principal, Permission::ViewReports, &updated)?;
	let allowed = censor.censor_or_forbid(&[], &ctx)?;
	let mut session = state.store.connect().await?;
	build_one(&mut session, updated, &allowed).await
}

struct UpdateScope<'a> {
	principal: Option<&'a Principal>,
	caller: UserId,
	senders: &'a [Arc<dyn NotificationSender>],
}

/// Returns the stored record after the patch.
async fn apply_update(
	state: &AppState,
	session: &mut Session,
	scope: UpdateScope<'_>,
	id: &str,
	update: &UpdateReport,
) -> Result<Value, ServerError> {
	let record = load(session, id).await?;
	let ctx =
		record_context::<Report>(&state.authz, scope.principal, Permission::EditReports, &record)?;
	state
		.authz
		.require(&ctx, Permission::EditReports, EDIT_FLAGS, ResourceKind::Report)?;
	if update.status.is_some() {
		state.authz.require(
			&ctx,
			Permission::EditReports,
			AuthorizationFlags::PERMISSION,
			ResourceKind::Report,
		)?;
	}

	let changes = update.changes();
	let updated = if changes.is_empty() {
		record
	} else {
		session.patch(COLLECTION, id, &changes).await?
	};

	let note = ReportNote {
		id: uuid::Uuid::new_v4().to_string(),
		report_id: id.to_string(),
		author_id: scope.caller,
		status: update.status,
		note: update.note.clone(),
		created_at: Utc::now(),
	};
	session
		.insert(NOTES_COLLECTION, &note.id, &serde_json::to_value(&note)?)
		.await?;

	for reporter in owner_ids(&updated, Report::OWNER_FIELDS) {
		if reporter == scope.caller {
			continue;
		}
		let message = match update.status {
			Some(status) => format!("Your report is now {status}"),
			None => "Your report was updated".to_string(),
		};
		let notification = Notification::new(reporter, ResourceKind::Report, id, message);
		for sender in scope.senders {
			sender.send(session, &notification).await?;
		}
	}

	tracing::info!(
		report_id = %id,
		user_id = %scope.caller,
		status = ?update.status,
		"report updated"
	);
	Ok(updated)
}

async fn load(session: &mut Session, id: &str) -> Result<Value, ServerError> {
	session
		.get(COLLECTION, id)
		.await?
		.ok_or_else(|| ServerError::NotFound(format!("report {id}")))
}

async fn build_one(
	session: &mut Session,
	record: Value,
	allowed: &[FieldPath],
) -> Result<ReportDto, ServerError> {
	let selection = FieldSelection::from_paths(allowed);
	ReportBuilder
		.build(session, vec![record], &selection)
		.await?
		.pop()
		.ok_or_else(|| ServerError::Internal("report builder returned no record".to_string()))
}
