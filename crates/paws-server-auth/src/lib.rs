// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization for the Paws server.
//!
//! A caller may act on a resource when they hold the permission through one
//! of their roles, OR own the resource, OR are affiliated with it through a
//! role relationship. The pieces, leaves first:
//!
//! - [`claims`]: user id, roles and scope from the verified [`Principal`]
//! - [`policy`]: static permission -> roles / affiliated roles table
//! - [`resource`]: owned and affiliated descriptors for a request's target
//! - [`context`]: the per-request [`AuthContext`] and its builder
//! - [`authorization`]: the decision engine
//! - [`censor`]: per-resource field censoring driven by the same engine

pub mod authorization;
pub mod censor;
pub mod claims;
pub mod context;
pub mod error;
pub mod flags;
pub mod policy;
pub mod resource;
pub mod types;

pub use authorization::AuthorizationService;
pub use censor::{
	DeclaredField, FieldCensor, FieldPath, FieldRule, FieldSchema, FieldSchemas, InvalidFieldPath,
	Requirement, ResourceDeclaration,
};
pub use claims::{extract_claims, extract_user_id, Claims, Principal};
pub use context::{AuthContext, AuthContextBuilder};
pub use error::AuthError;
pub use flags::AuthorizationFlags;
pub use policy::{Policy, PolicyTable};
pub use resource::{AffiliatedResource, OwnedResource, ResourceResolver, ResourceTarget};
pub use types::{Permission, ResourceKind, Role, UserId};
