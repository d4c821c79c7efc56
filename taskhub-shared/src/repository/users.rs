/// User repository
///
/// Login, account administration and the bootstrap administrator.
///
/// # Credential changes
///
/// An administrator's edit is committed first and the affected user is told
/// afterwards. If that message cannot be delivered the edit still stands and
/// the caller gets `CoreError::Notification`, so the administrator knows the
/// user was not informed.

use std::sync::Arc;

use crate::auth::password::{hash_password, validate_password_strength, verify_dummy, verify_password};
use crate::error::{CoreError, CoreResult, ValidationErrors};
use crate::models::user::{CreateUser, Role, UpdateUser, User};
use crate::notify::{Notification, Notifier};
use crate::store::{Store, StoreError};

/// Longest accepted username, in characters
pub const MAX_USERNAME_LENGTH: usize = 50;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Input for an administrator's edit of an account
#[derive(Debug, Clone)]
pub struct EditUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    /// New password; `None` or blank keeps the current one
    pub password: Option<String>,
}

fn validate_identity(errors: &mut ValidationErrors, username: &str, email: &str) {
    let username_length = username.chars().count();
    if username.trim().is_empty() {
        errors.add("username", "Username is required");
    } else if username_length > MAX_USERNAME_LENGTH {
        errors.add(
            "username",
            format!("Username must be at most {} characters", MAX_USERNAME_LENGTH),
        );
    }

    let valid_email = email
        .split_once('@')
        .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        errors.add("email", "A valid email address is required");
    }
}

fn duplicate_to_conflict(err: StoreError) -> CoreError {
    match err {
        StoreError::Duplicate { field } if field == "email" => {
            CoreError::Conflict("Email already exists".to_string())
        }
        StoreError::Duplicate { .. } => CoreError::Conflict("Username already exists".to_string()),
        other => CoreError::Storage(other),
    }
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Checks a login.
    ///
    /// `identifier` is matched exactly against usernames and emails. Unknown
    /// accounts and wrong passwords fail identically.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> CoreResult<User> {
        if identifier.trim().is_empty() || password.is_empty() {
            return Err(CoreError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let Some(user) = self.store.find_user_by_login(identifier).await? else {
            verify_dummy(password);
            return Err(CoreError::Authentication(INVALID_CREDENTIALS.to_string()));
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => Ok(user),
            Ok(false) => Err(CoreError::Authentication(INVALID_CREDENTIALS.to_string())),
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "Stored password hash is unusable");
                Err(CoreError::Authentication(INVALID_CREDENTIALS.to_string()))
            }
        }
    }

    pub async fn list(&self) -> CoreResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    pub async fn get(&self, id: i64) -> CoreResult<User> {
        self.store.find_user(id).await?.ok_or(CoreError::NotFound("User"))
    }

    /// Creates an account and sends the welcome message.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` for a bad username, email or weak password
    /// - `CoreError::Conflict` if the username or email is taken
    pub async fn create(&self, input: NewUser) -> CoreResult<User> {
        let mut errors = ValidationErrors::new();
        validate_identity(&mut errors, &input.username, &input.email);
        if let Err(message) = validate_password_strength(&input.password) {
            errors.add("password", message);
        }
        errors.into_result()?;

        let password_hash = hash_password(&input.password)?;
        let user = self
            .store
            .insert_user(CreateUser {
                username: input.username.trim().to_string(),
                email: input.email.trim().to_string(),
                password_hash,
                role: input.role,
            })
            .await
            .map_err(duplicate_to_conflict)?;

        tracing::info!(user_id = user.id, role = %user.role, "User created");

        let welcome = Notification::AccountCreated {
            email: user.email.clone(),
            username: user.username.clone(),
        };
        if let Err(e) = self.notifier.notify(welcome).await {
            tracing::warn!(user_id = user.id, error = %e, "Welcome message not delivered");
        }

        Ok(user)
    }

    /// Applies an administrator's edit and tells the user.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation`, `CoreError::Conflict`, `CoreError::NotFound`
    ///   before anything is written
    /// - `CoreError::Notification` after the edit was committed but the
    ///   user could not be told
    pub async fn update(&self, id: i64, input: EditUser) -> CoreResult<User> {
        let new_password = input.password.filter(|p| !p.is_empty());

        let mut errors = ValidationErrors::new();
        validate_identity(&mut errors, &input.username, &input.email);
        if let Some(password) = &new_password {
            if let Err(message) = validate_password_strength(password) {
                errors.add("password", message);
            }
        }
        errors.into_result()?;

        let password_hash = match &new_password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };
        let user = self
            .store
            .update_user(
                id,
                UpdateUser {
                    username: input.username.trim().to_string(),
                    email: input.email.trim().to_string(),
                    role: input.role,
                    password_hash,
                },
            )
            .await
            .map_err(duplicate_to_conflict)?
            .ok_or(CoreError::NotFound("User"))?;

        tracing::info!(
            user_id = user.id,
            role = %user.role,
            password_changed = new_password.is_some(),
            "User updated"
        );

        self.notifier
            .notify(Notification::CredentialsChanged {
                email: user.email.clone(),
                username: user.username.clone(),
                password_changed: new_password.is_some(),
            })
            .await?;

        Ok(user)
    }

    /// Deletes an account.
    ///
    /// # Errors
    ///
    /// - `CoreError::Authorization` when an administrator targets themselves
    /// - `CoreError::Conflict` while tasks or comments reference the user
    /// - `CoreError::NotFound` if there is no such user
    pub async fn delete(&self, id: i64, acting_user_id: i64) -> CoreResult<()> {
        if id == acting_user_id {
            return Err(CoreError::Authorization(
                "You cannot delete your own account".to_string(),
            ));
        }

        let deleted = self.store.delete_user(id).await.map_err(|e| match e {
            StoreError::ForeignKey { .. } => CoreError::Conflict(
                "User still has tasks or comments; delete or reassign them first".to_string(),
            ),
            other => CoreError::Storage(other),
        })?;

        if !deleted {
            return Err(CoreError::NotFound("User"));
        }

        tracing::info!(user_id = id, deleted_by = acting_user_id, "User deleted");
        Ok(())
    }

    /// Creates an administrator unless the username is already taken.
    ///
    /// Returns true if an account was created.
    pub async fn ensure_admin(&self, username: &str, email: &str, password: &str) -> CoreResult<bool> {
        if self.store.find_user_by_login(username).await?.is_some() {
            return Ok(false);
        }

        let mut errors = ValidationErrors::new();
        validate_identity(&mut errors, username, email);
        if let Err(message) = validate_password_strength(password) {
            errors.add("password", message);
        }
        errors.into_result()?;

        let user = self
            .store
            .insert_user(CreateUser {
                username: username.trim().to_string(),
                email: email.trim().to_string(),
                password_hash: hash_password(password)?,
                role: Role::Admin,
            })
            .await
            .map_err(duplicate_to_conflict)?;

        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap administrator created");
        Ok(true)
    }
}
