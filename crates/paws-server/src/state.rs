// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared application state, built once at startup.

use std::sync::Arc;

use paws_common_registry::Registry;
use paws_server_auth::{AuthorizationService, FieldCensor, FieldSchemas, PolicyTable, ResourceKind};
use paws_server_config::PolicyTablesConfig;
use paws_server_db::DocumentStore;

use crate::error::ServerError;
use crate::notifications::{LogSender, NotificationChannel, NotificationSender, StoreSender};
use crate::resources::DECLARATIONS;

/// What registry factories construct their instances from.
#[derive(Debug, Clone)]
pub struct Dependencies {
	pub authz: AuthorizationService,
	pub schemas: Arc<FieldSchemas>,
}

pub type CensorRegistry = Registry<ResourceKind, FieldCensor, Dependencies>;
pub type SenderRegistry = Registry<NotificationChannel, dyn NotificationSender, Dependencies>;

#[derive(Clone)]
pub struct AppState {
	pub store: DocumentStore,
	pub authz: AuthorizationService,
	pub deps: Arc<Dependencies>,
	pub censors: Arc<CensorRegistry>,
	pub senders: Arc<SenderRegistry>,
	/// Channels every notification goes out on.
	pub channels: Arc<[NotificationChannel]>,
	pub dev_mode: bool,
}

/// Policy table and field schemas, validated against the declared resources.
pub fn build_policy(tables: &PolicyTablesConfig) -> Result<Dependencies, ServerError> {
	let policy = PolicyTable::from_config(&tables.permissions)?;
	let authz = AuthorizationService::new(Arc::new(policy));
	let schemas = FieldSchemas::from_config(DECLARATIONS, &tables.fields)?;
	Ok(Dependencies {
		authz,
		schemas: Arc::new(schemas),
	})
}

pub fn default_censors() -> CensorRegistry {
	let mut censors = Registry::new("field censors");
	for declaration in DECLARATIONS {
		let kind = declaration.kind;
		censors.register(kind, move |deps: &Dependencies| {
			Arc::new(FieldCensor::new(kind, deps.schemas.clone(), deps.authz.clone()))
		});
	}
	censors
}

pub fn default_senders() -> SenderRegistry {
	Registry::new("notification senders")
		.with(NotificationChannel::Log, |_: &Dependencies| {
			Arc::new(LogSender) as Arc<dyn NotificationSender>
		})
		.with(NotificationChannel::Store, |_: &Dependencies| {
			Arc::new(StoreSender) as Arc<dyn NotificationSender>
		})
}

impl AppState {
	/// Validate the tables and registries and assemble the state. Any
	/// misconfiguration fails here rather than on a request.
	pub fn bootstrap(
		store: DocumentStore,
		tables: &PolicyTablesConfig,
		dev_mode: bool,
	) -> Result<Self, ServerError> {
		Self::assemble(store, build_policy(tables)?, default_censors(), default_senders(), dev_mode)
	}

	pub fn assemble(
		store: DocumentStore,
		deps: Dependencies,
		censors: CensorRegistry,
		senders: SenderRegistry,
		dev_mode: bool,
	) -> Result<Self, ServerError> {
		censors.ensure_registered(DECLARATIONS.iter().map(|d| d.kind))?;
		senders.ensure_registered(NotificationChannel::all().iter().copied())?;
		tracing::info!(
			censors = censors.len(),
			senders = senders.len(),
			dev_mode,
			"application state ready"
		);
		Ok(Self {
			store,
			authz: deps.authz.clone(),
			deps: Arc::new(deps),
			censors: Arc::new(censors),
			senders: Arc::new(senders),
			channels: NotificationChannel::all().into(),
			dev_mode,
		})
	}

	pub fn censor(&self, kind: ResourceKind) -> Result<Arc<FieldCensor>, ServerError> {
		Ok(self.censors.resolve(kind, &self.deps)?)
	}

	pub fn senders(&self) -> Result<Vec<Arc<dyn NotificationSender>>, ServerError> {
		self
			.channels
			.iter()
			.map(|channel| Ok(self.senders.resolve(*channel, &self.deps)?))
			.collect()
	}
}
