// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::pool::migrate;
use crate::store::DocumentStore;

/// In-memory pool. One connection, since every SQLite memory connection is
/// its own database.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap()
}

pub async fn create_test_store() -> DocumentStore {
	let pool = create_test_pool().await;
	migrate(&pool).await.unwrap();
	DocumentStore::new(pool)
}
