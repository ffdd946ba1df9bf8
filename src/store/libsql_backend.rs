//! libSQL backend: async `UserStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::UserStore;
use crate::users::model::{Principal, StoredUpdate};

const USER_COLUMNS: &str =
    "id, email, hashed_password, full_name, is_active, created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_one(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams,
        op: &str,
    ) -> Result<Option<Principal>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, args)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_principal(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_principal(row: &libsql::Row) -> Result<Principal, libsql::Error> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    let is_active: i64 = row.get(4)?;

    Ok(Principal {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        email: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get::<Option<String>>(3)?,
        is_active: is_active != 0,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

/// Map a write failure, surfacing UNIQUE violations as constraint errors.
fn map_write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {message}"))
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

#[async_trait]
impl UserStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn create_user(&self, principal: &Principal) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, hashed_password, full_name, is_active, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    principal.id.to_string(),
                    principal.email.clone(),
                    principal.password_hash.clone(),
                    principal.full_name.clone(),
                    principal.is_active as i64,
                    principal.created_at.to_rfc3339(),
                    principal.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| map_write_error("create_user", e))?;

        debug!(user_id = %principal.id, "User inserted");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<Principal>, DatabaseError> {
        self.query_one(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            "get_user",
        )
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<Principal>, DatabaseError> {
        self.query_one(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            "get_user_by_email",
        )
        .await
    }

    async fn list_users(&self, skip: usize, limit: usize) -> Result<Vec<Principal>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2"
                ),
                params![limit as i64, skip as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users: {e}")))?;

        let mut users = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users: {e}")))?
        {
            users.push(
                row_to_principal(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_users row parse: {e}")))?,
            );
        }
        Ok(users)
    }

    async fn update_user(
        &self,
        id: Uuid,
        update: &StoredUpdate,
    ) -> Result<Option<Principal>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET \
                    email = COALESCE(?1, email), \
                    full_name = COALESCE(?2, full_name), \
                    hashed_password = COALESCE(?3, hashed_password), \
                    is_active = COALESCE(?4, is_active), \
                    updated_at = ?5 \
                 WHERE id = ?6",
                params![
                    update.email.clone(),
                    update.full_name.clone(),
                    update.password_hash.clone(),
                    update.is_active.map(|a| a as i64),
                    now,
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| map_write_error("update_user", e))?;

        if changed == 0 {
            return Ok(None);
        }
        debug!(user_id = %id, "User updated");
        self.get_user(id).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_user: {e}")))?;
        debug!(user_id = %id, removed = changed > 0, "User delete");
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn principal(email: &str) -> Principal {
        Principal::new(email, "$argon2id$v=19$stub".to_string(), Some("Test".to_string()))
    }

    #[tokio::test]
    async fn create_and_fetch_by_id_and_email() {
        let db = backend().await;
        let p = principal("alice@example.com");
        db.create_user(&p).await.unwrap();

        let by_id = db.get_user(p.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");
        assert_eq!(by_id.full_name.as_deref(), Some("Test"));
        assert!(by_id.is_active);

        let by_email = db.get_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, p.id);
        assert_eq!(by_email.password_hash, p.password_hash);
    }

    #[tokio::test]
    async fn duplicate_email_is_constraint_error() {
        let db = backend().await;
        db.create_user(&principal("bob@example.com")).await.unwrap();
        let err = db
            .create_user(&principal("bob@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let db = backend().await;
        assert!(db.get_user(Uuid::new_v4()).await.unwrap().is_none());
        assert!(db.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let db = backend().await;
        let p = principal("carol@example.com");
        db.create_user(&p).await.unwrap();

        let update = StoredUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        let updated = db.update_user(p.id, &update).await.unwrap().unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.email, "carol@example.com");
        assert_eq!(updated.full_name.as_deref(), Some("Test"));
        assert_eq!(updated.password_hash, p.password_hash);
    }

    #[tokio::test]
    async fn update_missing_user_returns_none() {
        let db = backend().await;
        let update = StoredUpdate {
            full_name: Some("Ghost".to_string()),
            ..Default::default()
        };
        assert!(db.update_user(Uuid::new_v4(), &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_paginates_in_creation_order() {
        let db = backend().await;
        for i in 0..5 {
            db.create_user(&principal(&format!("user{i}@example.com")))
                .await
                .unwrap();
        }
        let all = db.list_users(0, 100).await.unwrap();
        assert_eq!(all.len(), 5);

        let page = db.list_users(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[1].id);
        assert_eq!(page[1].id, all[2].id);
    }

    #[tokio::test]
    async fn local_file_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("users.db");
        let p = principal("erin@example.com");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.create_user(&p).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let found = db.get_user_by_email("erin@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, p.id);
        assert_eq!(found.created_at.timestamp(), p.created_at.timestamp());
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let db = backend().await;
        db.create_user(&principal("fay@example.com")).await.unwrap();
        assert!(db.get_user_by_email("FAY@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let db = backend().await;
        let p = principal("dave@example.com");
        db.create_user(&p).await.unwrap();

        assert!(db.delete_user(p.id).await.unwrap());
        assert!(!db.delete_user(p.id).await.unwrap());
        assert!(db.get_user(p.id).await.unwrap().is_none());
    }
}
