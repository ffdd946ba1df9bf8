//! `UserStore` trait: single async interface for principal persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::users::model::{Principal, StoredUpdate};

/// Backend-agnostic keyed record store for principals.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert a new principal. Fails with `DatabaseError::Constraint` when
    /// the email is already taken.
    async fn create_user(&self, principal: &Principal) -> Result<(), DatabaseError>;

    /// Get a principal by ID.
    async fn get_user(&self, id: Uuid) -> Result<Option<Principal>, DatabaseError>;

    /// Get a principal by its unique email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<Principal>, DatabaseError>;

    /// List principals ordered by creation time.
    async fn list_users(&self, skip: usize, limit: usize) -> Result<Vec<Principal>, DatabaseError>;

    /// Apply a partial update. Returns the updated record, or `None` if the
    /// principal does not exist.
    async fn update_user(
        &self,
        id: Uuid,
        update: &StoredUpdate,
    ) -> Result<Option<Principal>, DatabaseError>;

    /// Delete a principal. Returns whether a record was removed.
    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError>;
}
