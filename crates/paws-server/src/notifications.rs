// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notification senders, resolved per channel through a [`Registry`].
//!
//! Delivery (email, SMS, push) lives outside this server. The built-in
//! senders either log the notification or record it as a document inside
//! the caller's session, so it commits or rolls back with the request.
//!
//! [`Registry`]: paws_common_registry::Registry

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paws_server_auth::{ResourceKind, UserId};
use paws_server_db::{Result, Session};
use serde::{Deserialize, Serialize};

pub const COLLECTION: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
	Log,
	Store,
}

impl NotificationChannel {
	pub fn all() -> &'static [NotificationChannel] {
		&[NotificationChannel::Log, NotificationChannel::Store]
	}
}

impl fmt::Display for NotificationChannel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NotificationChannel::Log => f.write_str("log"),
			NotificationChannel::Store => f.write_str("store"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub id: String,
	pub recipient_id: UserId,
	pub resource: ResourceKind,
	pub resource_id: String,
	pub message: String,
	pub created_at: DateTime<Utc>,
}

impl Notification {
	pub fn new(
		recipient_id: UserId,
		resource: ResourceKind,
		resource_id: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			recipient_id,
			resource,
			resource_id: resource_id.into(),
			message: message.into(),
			created_at: Utc::now(),
		}
	}
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
	async fn send(&self, session: &mut Session, notification: &Notification) -> Result<()>;
}

pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
	async fn send(&self, _session: &mut Session, notification: &Notification) -> Result<()> {
		tracing::info!(
			notification_id = %notification.id,
			recipient_id = %notification.recipient_id,
			resource = %notification.resource,
			resource_id = %notification.resource_id,
			"notification queued"
		);
		Ok(())
	}
}

pub struct StoreSender;

#[async_trait]
impl NotificationSender for StoreSender {
	#[tracing::instrument(
		skip(self, session, notification),
		fields(notification_id = %notification.id)
	)]
	async fn send(&self, session: &mut Session, notification: &Notification) -> Result<()> {
		let body = serde_json::to_value(notification)?;
		session.insert(COLLECTION, &notification.id, &body).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use paws_server_db::testing::create_test_store;

	#[tokio::test]
	async fn store_sender_writes_inside_the_session() {
		let store = create_test_store().await;
		let notification =
			Notification::new(UserId::generate(), ResourceKind::Report, "r1", "updated");

		let mut session = store.begin().await.unwrap();
		StoreSender.send(&mut session, &notification).await.unwrap();
		session.abort().await.unwrap();

		let mut session = store.connect().await.unwrap();
		assert!(session.get(COLLECTION, &notification.id).await.unwrap().is_none());

		StoreSender.send(&mut session, &notification).await.unwrap();
		let stored = session.get(COLLECTION, &notification.id).await.unwrap().unwrap();
		let stored: Notification = serde_json::from_value(stored).unwrap();
		assert_eq!(stored, notification);
	}
}
