// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Handlers talk to the [`UserRepository`] trait; [`InMemoryStore`] is the
//! process-local implementation. Emails are unique and matched after
//! normalization.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::models::{normalize_email, User};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("a user with this email already exists")]
    EmailTaken,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::user_not_found(),
            StoreError::EmailTaken => ApiError::user_already_exists(),
        }
    }
}

pub trait UserRepository: Send + Sync {
    fn create(&mut self, user: User) -> Result<User, StoreError>;
    fn get_by_id(&self, id: &str) -> Result<User, StoreError>;
    fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    /// Replace the stored record with the same id.
    fn update(&mut self, user: User) -> Result<User, StoreError>;
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;
    /// All users, oldest first.
    fn list(&self) -> Vec<User>;
}

/// Repository handle shared across handlers.
pub type SharedStore = Arc<RwLock<dyn UserRepository>>;

pub fn shared(store: impl UserRepository + 'static) -> SharedStore {
    Arc::new(RwLock::new(store))
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: HashMap<String, User>,
    /// normalized email -> user id
    emails: HashMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for InMemoryStore {
    fn create(&mut self, mut user: User) -> Result<User, StoreError> {
        user.email = normalize_email(&user.email);
        if self.emails.contains_key(&user.email) {
            return Err(StoreError::EmailTaken);
        }
        self.emails.insert(user.email.clone(), user.id.clone());
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn get_by_id(&self, id: &str) -> Result<User, StoreError> {
        self.users.get(id).cloned().ok_or(StoreError::NotFound)
    }

    fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.emails
            .get(&normalize_email(email))
            .and_then(|id| self.users.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn update(&mut self, mut user: User) -> Result<User, StoreError> {
        user.email = normalize_email(&user.email);
        let previous_email = self
            .users
            .get(&user.id)
            .map(|existing| existing.email.clone())
            .ok_or(StoreError::NotFound)?;

        if previous_email != user.email {
            if self.emails.contains_key(&user.email) {
                return Err(StoreError::EmailTaken);
            }
            self.emails.remove(&previous_email);
            self.emails.insert(user.email.clone(), user.id.clone());
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let user = self.users.remove(id).ok_or(StoreError::NotFound)?;
        self.emails.remove(&user.email);
        Ok(())
    }

    fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        users
    }
}
