//! Record store — persistence of user records.
//!
//! [`UserRepository`] is the seam the rest of the crate programs against;
//! [`UserRepo`] is the SQLite implementation backed by a shared [`Database`].

use std::sync::Arc;

use rusqlite::{ErrorCode, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::Database;
use crate::http::StatusCode;

/// Minimum age admitted by [`UserRepository::create_user`].
pub const MIN_AGE: i64 = 18;

/// A stored user. `email` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub password: String,
    pub name: String,
    pub age: i64,
}

/// Errors produced by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule rejected the record.
    #[error("{0}")]
    Validation(String),

    #[error("user with the {email} email already exists")]
    DuplicateKey { email: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl StoreError {
    /// HTTP status a handler should answer with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateKey { .. } => StatusCode::BadRequest,
            Self::Storage(_) => StatusCode::InternalServerError,
        }
    }
}

/// Storage operations on user records.
///
/// Implementations must be safe to share across threads; the service and the
/// read-through cache both hold the same `Arc<dyn UserRepository>`.
pub trait UserRepository: Send + Sync {
    /// Persists `user`.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the email is taken and with
    /// [`StoreError::Validation`] if the user is younger than [`MIN_AGE`].
    /// The duplicate check runs first.
    fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Returns every stored user in scan order.
    fn get_all_users(&self) -> Result<Vec<User>, StoreError>;
}

/// SQLite-backed [`UserRepository`].
pub struct UserRepo {
    db: Arc<Database>,
}

impl UserRepo {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl UserRepository for UserRepo {
    fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.db.conn();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![user.email],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Err(StoreError::DuplicateKey {
                email: user.email.clone(),
            });
        }

        if user.age < MIN_AGE {
            return Err(StoreError::Validation(format!(
                "user must be at least {MIN_AGE} years old"
            )));
        }

        let inserted = conn.execute(
            "INSERT INTO users (email, password, name, age) VALUES (?1, ?2, ?3, ?4)",
            params![user.email, user.password, user.name, user.age],
        );

        match inserted {
            Ok(_) => {
                debug!(email = %user.email, "user created");
                Ok(())
            }
            // Lost a race with another writer between the count and the insert.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                warn!(email = %user.email, "primary key conflict on insert");
                Err(StoreError::DuplicateKey {
                    email: user.email.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_all_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare("SELECT email, password, name, age FROM users ORDER BY rowid")?;

        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    email: row.get(0)?,
                    password: row.get(1)?,
                    name: row.get(2)?,
                    age: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = users.len(), "users loaded from storage");
        Ok(users)
    }
}
