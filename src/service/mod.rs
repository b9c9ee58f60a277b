//! Record service — the boundary between request handlers and storage.
//!
//! [`UserService`] adds nothing on top of the repository it wraps: both
//! operations are forwarded unchanged, errors included. It exists so handlers
//! depend on a service rather than on a storage implementation.

use std::sync::Arc;

use crate::store::{StoreError, User, UserRepository};

/// Write-and-read facade over a [`UserRepository`].
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Creates a user. Does not touch any cache.
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.repo.create_user(user)
    }

    /// Reads every user straight from storage.
    pub fn get_all_users(&self) -> Result<Vec<User>, StoreError> {
        self.repo.get_all_users()
    }
}
