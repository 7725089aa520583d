//! # Librarian Repository
//!
//! Staff accounts. Passwords are stored as Argon2 PHC strings and never
//! leave this module in clear.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use library_core::validation::{validate_password, validate_username};
use library_core::Librarian;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Repository for librarian accounts.
#[derive(Debug, Clone)]
pub struct LibrarianRepository {
    pool: SqlitePool,
}

impl LibrarianRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LibrarianRepository { pool }
    }

    /// Creates an account.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username taken (case-insensitive)
    pub async fn create(&self, username: &str, password: &str) -> DbResult<Librarian> {
        let username = username.trim();
        validate_username(username)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO librarians (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(username))?;

        let id = result.last_insert_rowid();
        info!(librarian_id = id, username, "Librarian account created");

        Ok(Librarian {
            id,
            username: username.to_string(),
            password_hash,
            created_at,
        })
    }

    /// Looks up an account by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<Librarian>> {
        let librarian = sqlx::query_as::<_, Librarian>(
            "SELECT id, username, password_hash, created_at FROM librarians WHERE username = ?1",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(librarian)
    }

    /// Checks a username/password pair.
    ///
    /// ## Returns
    /// * `Ok(Some(Librarian))` - credentials are valid
    /// * `Ok(None)` - unknown user or wrong password (indistinguishable)
    pub async fn authenticate(&self, username: &str, password: &str) -> DbResult<Option<Librarian>> {
        let Some(librarian) = self.get_by_username(username).await? else {
            debug!(username, "Login for unknown librarian");
            return Ok(None);
        };

        if verify_password(password, &librarian.password_hash) {
            debug!(librarian_id = librarian.id, "Librarian authenticated");
            Ok(Some(librarian))
        } else {
            warn!(librarian_id = librarian.id, "Wrong password");
            Ok(None)
        }
    }
}

/// Hashes a password with Argon2id and a random salt.
fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC string.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::test_db;

    #[test]
    fn test_hash_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong horse battery", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let db = test_db().await;
        let repo = db.librarians();

        let created = repo.create("m.jones", "s3cret-pass").await.unwrap();
        assert_ne!(created.password_hash, "s3cret-pass");

        let ok = repo.authenticate("m.jones", "s3cret-pass").await.unwrap();
        assert_eq!(ok.map(|l| l.id), Some(created.id));

        // Usernames are case-insensitive
        assert!(repo
            .authenticate("M.Jones", "s3cret-pass")
            .await
            .unwrap()
            .is_some());

        assert!(repo.authenticate("m.jones", "wrong-pass").await.unwrap().is_none());
        assert!(repo.authenticate("nobody", "s3cret-pass").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let db = test_db().await;
        let repo = db.librarians();
        repo.create("m.jones", "s3cret-pass").await.unwrap();

        let err = repo.create("M.JONES", "other-pass").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let db = test_db().await;
        let repo = db.librarians();

        assert!(matches!(
            repo.create("ab", "s3cret-pass").await,
            Err(DbError::Rule(library_core::CoreError::Validation(_)))
        ));
        assert!(matches!(
            repo.create("m.jones", "short").await,
            Err(DbError::Rule(library_core::CoreError::Validation(_)))
        ));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let librarian = Librarian {
            id: 1,
            username: "m.jones".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&librarian).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
