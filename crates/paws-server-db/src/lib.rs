// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document storage for the Paws server.
//!
//! - [`store`]: SQLite-backed JSON document store and [`Session`]s
//! - [`filter`]: filter expressions compiled to SQL
//! - [`lookup`]: typed, paginated lookups
//! - [`query`]: lookups bound to a resource and restricted by authorization
//! - [`builder`]: hydrating DTOs from raw records

pub mod builder;
pub mod error;
pub mod filter;
pub mod lookup;
pub mod pool;
pub mod query;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{take_selected, FieldSelection, ResultBuilder};
pub use error::{DbError, Result};
pub use filter::Filter;
pub use lookup::{ids_filter, Criteria, DateRange, Lookup, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use pool::{create_pool, migrate};
pub use query::{authorise_clause, Query, Queryable};
pub use store::{with_session, with_transaction, DocumentStore, FindOptions, Session, SortDirection};
