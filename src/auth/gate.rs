//! AuthGate: account creation and bearer-token authorization.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, DatabaseError};
use crate::store::UserStore;
use crate::users::model::{Principal, PrincipalUpdate, StoredUpdate};

use super::password::CredentialVerifier;
use super::token::{IssuedToken, TokenCodec};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Trim and lowercase an email, rejecting anything not shaped like one.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(AuthError::InvalidEmail(raw.trim().to_string()));
    }
    Ok(email)
}

/// Orchestrates credential checks against the record store and token
/// issuance. Token checks are stateless; the only writes are account
/// management calls.
pub struct AuthGate {
    store: Arc<dyn UserStore>,
    codec: TokenCodec,
    verifier: CredentialVerifier,
}

impl AuthGate {
    pub fn new(store: Arc<dyn UserStore>, codec: TokenCodec, verifier: CredentialVerifier) -> Self {
        Self {
            store,
            codec,
            verifier,
        }
    }

    /// The backing record store.
    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Create an active principal.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<Principal, AuthError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::WeakPassword);
        }
        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self.hash_blocking(password.to_string()).await?;
        let full_name = full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let principal = Principal::new(&email, password_hash, full_name);

        match self.store.create_user(&principal).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration of the same email.
            Err(DatabaseError::Constraint(_)) => return Err(AuthError::EmailAlreadyExists),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %principal.id, "Principal registered");
        Ok(principal)
    }

    /// Verify credentials and issue a token whose subject is the email.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let email = email.trim().to_lowercase();
        let principal = self.store.get_user_by_email(&email).await?;

        let stored_hash = principal.as_ref().map(|p| p.password_hash.clone());
        let verified = self
            .verify_blocking(password.to_string(), stored_hash)
            .await?;

        let Some(principal) = principal.filter(|_| verified) else {
            warn!("Login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        let issued = self.codec.issue(&principal.email)?;
        info!(user_id = %principal.id, expires_at = %issued.expires_at, "Token issued");
        Ok(issued)
    }

    /// Resolve a bearer token to a live, active principal.
    pub async fn authorize(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.codec.decode(token).inspect_err(|e| {
            warn!(error = %e, "Token rejected");
        })?;

        let principal = self
            .store
            .get_user_by_email(&claims.sub)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;
        debug!(user_id = %principal.id, "Token resolved");

        if !principal.is_active {
            return Err(AuthError::PrincipalInactive);
        }
        Ok(principal)
    }

    /// Apply an administrative update. Returns `None` when the principal
    /// does not exist.
    pub async fn update_principal(
        &self,
        id: Uuid,
        update: PrincipalUpdate,
    ) -> Result<Option<Principal>, AuthError> {
        let email = update.email.as_deref().map(normalize_email).transpose()?;
        let password_hash = match update.password {
            Some(ref p) if p.is_empty() => return Err(AuthError::WeakPassword),
            Some(p) => Some(self.hash_blocking(p).await?),
            None => None,
        };

        let stored = StoredUpdate {
            email,
            full_name: update.full_name,
            password_hash,
            is_active: update.is_active,
        };

        match self.store.update_user(id, &stored).await {
            Ok(updated) => {
                if let Some(ref p) = updated {
                    info!(user_id = %p.id, is_active = p.is_active, "Principal updated");
                }
                Ok(updated)
            }
            Err(DatabaseError::Constraint(_)) => Err(AuthError::EmailAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn hash_blocking(&self, password: String) -> Result<String, AuthError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    async fn verify_blocking(
        &self,
        password: String,
        stored_hash: Option<String>,
    ) -> Result<bool, AuthError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verifier.verify(&password, &hash),
            None => verifier.verify_dummy(&password),
        })
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))
    }
}
