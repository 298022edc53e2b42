// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for authorization.
//!
//! - [`UserId`]: type-safe wrapper around the verified `sub` claim
//! - [`Role`]: configuration-defined role name
//! - [`Permission`]: closed set of capabilities, one per resource and action
//! - [`ResourceKind`]: the resource families the policy tables describe

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
	pub fn new(id: Uuid) -> Self {
		Self(id)
	}

	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn into_inner(self) -> Uuid {
		self.0
	}

	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<Uuid> for UserId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

impl FromStr for UserId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}

/// A role name. Roles are defined by the policy tables, not by code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Role {
	fn from(name: &str) -> Self {
		Self(name.to_string())
	}
}

// =============================================================================
// Permissions
// =============================================================================

/// A named capability gating one action on one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
	ViewUsers,
	EditUsers,
	ViewShelters,
	EditShelters,
	ViewAnimals,
	EditAnimals,
	ViewApplications,
	EditApplications,
	ViewReports,
	EditReports,
	/// Who filed a report.
	ViewReporterIdentity,
	/// Email and phone on an adoption application.
	ViewApplicantContact,
	ViewMessages,
	SendMessages,
	ViewNotifications,
}

impl Permission {
	pub fn all() -> &'static [Permission] {
		&[
			Permission::ViewUsers,
			Permission::EditUsers,
			Permission::ViewShelters,
			Permission::EditShelters,
			Permission::ViewAnimals,
			Permission::EditAnimals,
			Permission::ViewApplications,
			Permission::EditApplications,
			Permission::ViewReports,
			Permission::EditReports,
			Permission::ViewReporterIdentity,
			Permission::ViewApplicantContact,
			Permission::ViewMessages,
			Permission::SendMessages,
			Permission::ViewNotifications,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Permission::ViewUsers => "view_users",
			Permission::EditUsers => "edit_users",
			Permission::ViewShelters => "view_shelters",
			Permission::EditShelters => "edit_shelters",
			Permission::ViewAnimals => "view_animals",
			Permission::EditAnimals => "edit_animals",
			Permission::ViewApplications => "view_applications",
			Permission::EditApplications => "edit_applications",
			Permission::ViewReports => "view_reports",
			Permission::EditReports => "edit_reports",
			Permission::ViewReporterIdentity => "view_reporter_identity",
			Permission::ViewApplicantContact => "view_applicant_contact",
			Permission::ViewMessages => "view_messages",
			Permission::SendMessages => "send_messages",
			Permission::ViewNotifications => "view_notifications",
		}
	}
}

impl fmt::Display for Permission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Permission {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Permission::all()
			.iter()
			.copied()
			.find(|p| p.as_str() == s)
			.ok_or_else(|| AuthError::Configuration(format!("unknown permission '{s}'")))
	}
}

// =============================================================================
// Resource kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
	User,
	Shelter,
	Animal,
	Application,
	Report,
	Message,
	Notification,
}

impl ResourceKind {
	pub fn all() -> &'static [ResourceKind] {
		&[
			ResourceKind::User,
			ResourceKind::Shelter,
			ResourceKind::Animal,
			ResourceKind::Application,
			ResourceKind::Report,
			ResourceKind::Message,
			ResourceKind::Notification,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ResourceKind::User => "user",
			ResourceKind::Shelter => "shelter",
			ResourceKind::Animal => "animal",
			ResourceKind::Application => "application",
			ResourceKind::Report => "report",
			ResourceKind::Message => "message",
			ResourceKind::Notification => "notification",
		}
	}
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ResourceKind {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ResourceKind::all()
			.iter()
			.copied()
			.find(|k| k.as_str() == s)
			.ok_or_else(|| AuthError::Configuration(format!("unknown resource kind '{s}'")))
	}
}
