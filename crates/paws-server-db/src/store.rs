// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON document store on SQLite, and the session every repository call
//! runs against.
//!
//! A [`Session`] is either direct (a pooled connection in autocommit mode)
//! or transactional. Repository functions take `&mut Session`, so one
//! request's calls are applied in program order and cannot run in parallel
//! on the same transaction.
//!
//! A transactional session that is dropped without [`Session::commit`] rolls
//! back, so a cancelled request leaves nothing behind.

use std::future::Future;

use chrono::{SecondsFormat, Utc};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};
use sqlx::Transaction;

use crate::error::{DbError, Result};
use crate::filter::{json_path, Filter, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
	#[default]
	Asc,
	Desc,
}

impl SortDirection {
	fn as_sql(self) -> &'static str {
		match self {
			SortDirection::Asc => "ASC",
			SortDirection::Desc => "DESC",
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
	/// Body fields to sort by, applied before the id tie-breaker.
	pub sort: Vec<String>,
	pub direction: SortDirection,
	pub offset: u64,
	pub limit: Option<u32>,
	/// Top-level keys to keep in each returned document. `id` is always kept.
	pub projection: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct DocumentStore {
	pool: SqlitePool,
}

impl DocumentStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Round-trip a trivial query; used by health checks.
	pub async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}

	/// A session in autocommit mode.
	pub async fn connect(&self) -> Result<Session> {
		let conn = self.pool.acquire().await?;
		Ok(Session {
			conn: SessionConn::Direct(conn),
		})
	}

	/// A session wrapping one transaction.
	pub async fn begin(&self) -> Result<Session> {
		let tx = self.pool.begin().await?;
		tracing::debug!("transaction started");
		Ok(Session {
			conn: SessionConn::Transaction(tx),
		})
	}
}

enum SessionConn {
	Direct(PoolConnection<Sqlite>),
	Transaction(Transaction<'static, Sqlite>),
}

pub struct Session {
	conn: SessionConn,
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("transactional", &self.is_transactional())
			.finish()
	}
}

fn now() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn map_write_error(e: sqlx::Error, collection: &str, id: &str) -> DbError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() => {
			DbError::Conflict(format!("{collection}/{id} already exists"))
		}
		_ => DbError::Sqlx(e),
	}
}

fn project(mut doc: Value, keep: Option<&[String]>) -> Value {
	if let (Some(keep), Value::Object(map)) = (keep, &mut doc) {
		map.retain(|key, _| key == "id" || keep.iter().any(|k| k == key));
	}
	doc
}

type ScalarQuery<'q, O> =
	sqlx::query::QueryScalar<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_all<'q, O>(mut query: ScalarQuery<'q, O>, params: Vec<SqlValue>) -> ScalarQuery<'q, O> {
	for param in params {
		query = match param {
			SqlValue::Null => query.bind(None::<String>),
			SqlValue::Integer(i) => query.bind(i),
			SqlValue::Real(r) => query.bind(r),
			SqlValue::Text(s) => query.bind(s),
		};
	}
	query
}

impl Session {
	pub fn is_transactional(&self) -> bool {
		matches!(self.conn, SessionConn::Transaction(_))
	}

	fn conn(&mut self) -> &mut SqliteConnection {
		match &mut self.conn {
			SessionConn::Direct(conn) => &mut **conn,
			SessionConn::Transaction(tx) => &mut **tx,
		}
	}

	#[tracing::instrument(skip(self, body), fields(transactional = self.is_transactional()))]
	pub async fn insert(&mut self, collection: &str, id: &str, body: &Value) -> Result<()> {
		let now = now();
		sqlx::query(
			r#"
			INSERT INTO documents (collection, id, body, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(collection)
		.bind(id)
		.bind(serde_json::to_string(body)?)
		.bind(&now)
		.bind(&now)
		.execute(self.conn())
		.await
		.map_err(|e| map_write_error(e, collection, id))?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>> {
		let body: Option<String> =
			sqlx::query_scalar("SELECT body FROM documents WHERE collection = ? AND id = ?")
				.bind(collection)
				.bind(id)
				.fetch_optional(self.conn())
				.await?;
		body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
	}

	/// Replace the whole body. Fails with `NotFound` when the document is absent.
	#[tracing::instrument(skip(self, body))]
	pub async fn replace(&mut self, collection: &str, id: &str, body: &Value) -> Result<()> {
		let result = sqlx::query(
			"UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
		)
		.bind(serde_json::to_string(body)?)
		.bind(now())
		.bind(collection)
		.bind(id)
		.execute(self.conn())
		.await?;
		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("{collection}/{id}")));
		}
		Ok(())
	}

	/// Merge `changes` into the stored body (JSON merge patch) and return the
	/// updated document.
	#[tracing::instrument(skip(self, changes))]
	pub async fn patch(
		&mut self,
		collection: &str,
		id: &str,
		changes: &Map<String, Value>,
	) -> Result<Value> {
		if changes.contains_key("id") {
			return Err(DbError::Conflict("document id cannot be changed".to_string()));
		}
		let body: Option<String> = sqlx::query_scalar(
			r#"
			UPDATE documents SET body = json_patch(body, ?), updated_at = ?
			WHERE collection = ? AND id = ?
			RETURNING body
			"#,
		)
		.bind(serde_json::to_string(changes)?)
		.bind(now())
		.bind(collection)
		.bind(id)
		.fetch_optional(self.conn())
		.await?;
		let body = body.ok_or_else(|| DbError::NotFound(format!("{collection}/{id}")))?;
		Ok(serde_json::from_str(&body)?)
	}

	/// Returns whether a document was removed.
	#[tracing::instrument(skip(self))]
	pub async fn delete(&mut self, collection: &str, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
			.bind(collection)
			.bind(id)
			.execute(self.conn())
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(
		skip(self, filter, options),
		fields(offset = options.offset, limit = ?options.limit)
	)]
	pub async fn find(
		&mut self,
		collection: &str,
		filter: &Filter,
		options: &FindOptions,
	) -> Result<Vec<Value>> {
		let compiled = filter.compile()?;
		let mut params = vec![SqlValue::Text(collection.to_string())];
		params.extend(compiled.params);

		let mut order = Vec::with_capacity(options.sort.len() + 1);
		for key in &options.sort {
			params.push(SqlValue::Text(json_path(key)?));
			order.push(format!("json_extract(documents.body, ?) {}", options.direction.as_sql()));
		}
		order.push("documents.id ASC".to_string());

		params.push(SqlValue::Integer(options.limit.map(i64::from).unwrap_or(-1)));
		params.push(SqlValue::Integer(i64::try_from(options.offset).unwrap_or(i64::MAX)));

		let sql = format!(
			"SELECT body FROM documents WHERE collection = ? AND {} ORDER BY {} LIMIT ? OFFSET ?",
			compiled.sql,
			order.join(", ")
		);
		let rows: Vec<String> = bind_all(sqlx::query_scalar(&sql), params)
			.fetch_all(self.conn())
			.await?;

		tracing::debug!(rows = rows.len(), "find complete");
		rows
			.iter()
			.map(|body| {
				let doc: Value = serde_json::from_str(body)?;
				Ok(project(doc, options.projection.as_deref()))
			})
			.collect()
	}

	#[tracing::instrument(skip(self, filter))]
	pub async fn count(&mut self, collection: &str, filter: &Filter) -> Result<u64> {
		let compiled = filter.compile()?;
		let sql = format!(
			"SELECT COUNT(*) FROM documents WHERE collection = ? AND {}",
			compiled.sql
		);
		let mut params = vec![SqlValue::Text(collection.to_string())];
		params.extend(compiled.params);
		let count: i64 = bind_all(sqlx::query_scalar(&sql), params)
			.fetch_one(self.conn())
			.await?;
		Ok(u64::try_from(count).unwrap_or_default())
	}

	/// Commit a transactional session. A direct session has nothing to commit.
	pub async fn commit(self) -> Result<()> {
		match self.conn {
			SessionConn::Transaction(tx) => {
				tx.commit().await?;
				tracing::debug!("transaction committed");
				Ok(())
			}
			SessionConn::Direct(_) => Ok(()),
		}
	}

	/// Roll back a transactional session.
	pub async fn abort(self) -> Result<()> {
		match self.conn {
			SessionConn::Transaction(tx) => {
				tx.rollback().await?;
				tracing::debug!("transaction aborted");
				Ok(())
			}
			SessionConn::Direct(_) => Ok(()),
		}
	}

	/// Commit on `Ok`, abort on `Err`, and hand back `outcome`.
	///
	/// A failed abort is logged and the original error is returned. A failed
	/// commit turns an `Ok` into that commit error.
	pub async fn finish<T, E>(self, outcome: std::result::Result<T, E>) -> std::result::Result<T, E>
	where
		E: From<DbError> + std::fmt::Display,
	{
		match outcome {
			Ok(value) => {
				self.commit().await.map_err(E::from)?;
				Ok(value)
			}
			Err(err) => {
				if let Err(abort_err) = self.abort().await {
					tracing::warn!(error = %abort_err, original = %err, "transaction abort failed");
				}
				Err(err)
			}
		}
	}
}

/// Run `f` inside one transaction: commit on `Ok`, abort on `Err`.
///
/// ```ignore
/// with_transaction(&store, |session| Box::pin(async move {
///     session.insert("reports", &id, &body).await?;
///     session.insert("report_notes", &note_id, &note).await
/// })).await?;
/// ```
pub async fn with_transaction<T, E, F>(store: &DocumentStore, f: F) -> std::result::Result<T, E>
where
	F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, std::result::Result<T, E>>,
	E: From<DbError> + std::fmt::Display,
{
	let mut session = store.begin().await.map_err(E::from)?;
	let outcome = f(&mut session).await;
	session.finish(outcome).await
}

/// Run `f` on a direct session.
pub async fn with_session<T, F, Fut>(store: &DocumentStore, f: F) -> Result<T>
where
	F: FnOnce(Session) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let session = store.connect().await?;
	f(session).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_store;
	use serde_json::json;

	#[tokio::test]
	async fn insert_get_patch_delete() {
		let store = create_test_store().await;
		let mut session = store.connect().await.unwrap();

		session
			.insert("animals", "a1", &json!({ "id": "a1", "name": "Rex", "tags": ["dog"] }))
			.await
			.unwrap();
		let doc = session.get("animals", "a1").await.unwrap().unwrap();
		assert_eq!(doc["name"], "Rex");

		let mut changes = Map::new();
		changes.insert("name".to_string(), json!("Max"));
		let patched = session.patch("animals", "a1", &changes).await.unwrap();
		assert_eq!(patched["name"], "Max");
		assert_eq!(patched["tags"], json!(["dog"]));

		assert!(session.delete("animals", "a1").await.unwrap());
		assert!(session.get("animals", "a1").await.unwrap().is_none());
		assert!(!session.delete("animals", "a1").await.unwrap());
	}

	#[tokio::test]
	async fn duplicate_insert_is_conflict() {
		let store = create_test_store().await;
		let mut session = store.connect().await.unwrap();
		let body = json!({ "id": "r1" });
		session.insert("reports", "r1", &body).await.unwrap();
		let err = session.insert("reports", "r1", &body).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
		// Same id in another collection is fine.
		session.insert("animals", "r1", &body).await.unwrap();
	}

	#[tokio::test]
	async fn missing_documents_are_not_found() {
		let store = create_test_store().await;
		let mut session = store.connect().await.unwrap();
		let err = session
			.replace("reports", "nope", &json!({ "id": "nope" }))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
		let err = session.patch("reports", "nope", &Map::new()).await.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn find_filters_sorts_and_pages() {
		let store = create_test_store().await;
		let mut session = store.connect().await.unwrap();
		for (id, name, age, tags) in [
			("a1", "Rex", 30, json!(["dog", "large"])),
			("a2", "Tom", 12, json!(["cat"])),
			("a3", "Bella", 8, json!(["dog"])),
			("a4", "Rexy", 50, json!(["dog"])),
		] {
			session
				.insert(
					"animals",
					id,
					&json!({ "id": id, "name": name, "age_months": age, "tags": tags }),
				)
				.await
				.unwrap();
		}

		let dogs = Filter::eq("tags", "dog");
		let options = FindOptions {
			sort: vec!["age_months".to_string()],
			direction: SortDirection::Desc,
			..Default::default()
		};
		let found = session.find("animals", &dogs, &options).await.unwrap();
		let ids: Vec<_> = found.iter().map(|d| d["id"].as_str().unwrap()).collect();
		assert_eq!(ids, vec!["a4", "a1", "a3"]);
		assert_eq!(session.count("animals", &dogs).await.unwrap(), 3);

		let paged = FindOptions {
			offset: 1,
			limit: Some(1),
			projection: Some(vec!["name".to_string()]),
			..options
		};
		let page = session.find("animals", &dogs, &paged).await.unwrap();
		assert_eq!(page, vec![json!({ "id": "a1", "name": "Rex" })]);

		let text = Filter::Text {
			fields: vec!["name".to_string()],
			query: "REX".to_string(),
		};
		assert_eq!(session.count("animals", &text).await.unwrap(), 2);

		let young = Filter::Range {
			field: "age_months".to_string(),
			gte: None,
			lte: Some(json!(12)),
		};
		assert_eq!(session.count("animals", &young).await.unwrap(), 2);
		assert_eq!(session.count("animals", &Filter::Nothing).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn date_range_bounds_are_inclusive() {
		use crate::lookup::DateRange;
		use chrono::{DateTime, Utc};

		let store = create_test_store().await;
		let mut session = store.connect().await.unwrap();
		let at: DateTime<Utc> = "2025-06-01T08:30:00Z".parse().unwrap();
		let later: DateTime<Utc> = "2025-06-01T08:30:00.250Z".parse().unwrap();
		for (id, created_at) in [("r1", at), ("r2", later)] {
			session
				.insert("reports", id, &json!({ "id": id, "created_at": created_at }))
				.await
				.unwrap();
		}

		let range = |from, to| DateRange { from, to }.to_filter("created_at");
		assert_eq!(session.count("reports", &range(None, Some(at))).await.unwrap(), 1);
		assert_eq!(session.count("reports", &range(Some(at), None)).await.unwrap(), 2);
		assert_eq!(session.count("reports", &range(Some(at), Some(at))).await.unwrap(), 1);
		assert_eq!(
			session.count("reports", &range(Some(later), Some(later))).await.unwrap(),
			1
		);
	}

	#[tokio::test]
	async fn aborted_transaction_leaves_nothing() {
		let store = create_test_store().await;

		let mut session = store.begin().await.unwrap();
		session.insert("reports", "r1", &json!({ "id": "r1" })).await.unwrap();
		session.abort().await.unwrap();

		let mut session = store.connect().await.unwrap();
		assert!(session.get("reports", "r1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn dropped_transaction_rolls_back() {
		let store = create_test_store().await;
		{
			let mut session = store.begin().await.unwrap();
			session.insert("reports", "r1", &json!({ "id": "r1" })).await.unwrap();
		}
		let mut session = store.connect().await.unwrap();
		assert!(session.get("reports", "r1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn failed_write_aborts_all_writes() {
		let store = create_test_store().await;
		store
			.connect()
			.await
			.unwrap()
			.insert("notes", "existing", &json!({ "id": "existing" }))
			.await
			.unwrap();

		let outcome: Result<()> = with_transaction(&store, |session| {
			Box::pin(async move {
				session.insert("reports", "r1", &json!({ "id": "r1" })).await?;
				session.insert("notes", "existing", &json!({ "id": "existing" })).await?;
				session.insert("notifications", "n1", &json!({ "id": "n1" })).await?;
				Ok(())
			})
		})
		.await;
		assert!(matches!(outcome, Err(DbError::Conflict(_))));

		let mut session = store.connect().await.unwrap();
		assert!(session.get("reports", "r1").await.unwrap().is_none());
		assert!(session.get("notifications", "n1").await.unwrap().is_none());
		assert!(session.get("notes", "existing").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn finish_commits_on_ok() {
		let store = create_test_store().await;
		let mut session = store.begin().await.unwrap();
		let outcome = session.insert("reports", "r1", &json!({ "id": "r1" })).await;
		session.finish(outcome).await.unwrap();

		let value = with_session(&store, |mut session| async move {
			session.get("reports", "r1").await
		})
		.await
		.unwrap();
		assert!(value.is_some());
	}
}
