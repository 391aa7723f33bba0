use std::sync::Arc;

use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::*;
use crate::store::{StoreError, UserStore};

use super::required_field;

pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Register a user. The password is kept exactly as given after trimming.
    pub async fn register(&self, new: NewUser) -> Result<User, EngineError> {
        let name = required_field(&new.name, "name is required", MAX_NAME_LEN, "name too long")?;
        let email = required_field(&new.email, "email is required", MAX_EMAIL_LEN, "email too long")?;
        let password = required_field(&new.password, "password is required", MAX_NAME_LEN, "password too long")?;
        let role_text = required_field(&new.role, "role is required", MAX_STATUS_LEN, "role too long")?;
        let role = Role::parse(&role_text).ok_or(EngineError::InvalidInput("role must be admin or user"))?;

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(EngineError::Conflict(format!("email {email} already registered")));
        }

        let now = now_ms();
        let user = User {
            id: Ulid::new(),
            name,
            email,
            password,
            role,
            created_at: now,
            updated_at: now,
        };
        // The store re-checks uniqueness; a racing register lands here.
        self.store.create(&user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => {
                EngineError::Conflict(format!("email {} already registered", user.email))
            }
            other => other.into(),
        })?;
        tracing::info!("user {} registered as {}", user.id, user.role.as_str());
        Ok(user)
    }

    pub async fn get_user(&self, id: Ulid) -> Result<User, EngineError> {
        if id.is_nil() {
            return Err(EngineError::InvalidInput("user id is required"));
        }
        self.store.get_by_id(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::UserNotFound(id),
            other => other.into(),
        })
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> Result<User, EngineError> {
        if email.trim().is_empty() {
            return Err(EngineError::InvalidInput("email is required"));
        }
        self.store
            .find_by_email(email)
            .await?
            .ok_or(EngineError::NoneFound("user with that email"))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, EngineError> {
        let users = self.store.get_all().await?;
        if users.is_empty() {
            return Err(EngineError::NoneFound("users"));
        }
        Ok(users)
    }

    /// Bookings owned by the user are kept; attribution falls back to blanks.
    pub async fn delete_user(&self, id: Ulid) -> Result<(), EngineError> {
        self.get_user(id).await?;
        self.store.delete(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::UserNotFound(id),
            other => other.into(),
        })?;
        tracing::info!("user {id} deleted");
        Ok(())
    }
}
