// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Paws adoption platform server.
//!
//! Reads and updates of reports, animals and adoption applications, each
//! passing through the same authorization pipeline:
//!
//! 1. claims are extracted from the verified principal
//! 2. requested fields are censored against the field sensitivity table
//! 3. the store query is restricted to records the caller may read
//! 4. DTOs are built from the allowed fields only

pub mod dev_auth;
pub mod error;
pub mod notifications;
pub mod params;
pub mod resources;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{ErrorResponse, ServerError};
pub use routes::create_router;
pub use state::AppState;
