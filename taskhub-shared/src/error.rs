/// Domain error taxonomy
///
/// Repositories and the guard return [`CoreError`]. The HTTP layer maps each
/// kind to exactly one status code:
///
/// | Kind | Status |
/// |------|--------|
/// | `Authentication` | 401 |
/// | `Authorization` | 403 |
/// | `Validation` | 422 |
/// | `NotFound` | 404 |
/// | `Conflict` | 409 |
/// | `Storage` | 503 |
/// | `Notification` | 502 |

use serde::Serialize;

use crate::auth::guard::Denial;
use crate::auth::password::PasswordError;
use crate::notify::NotifyError;
use crate::store::StoreError;

/// One invalid input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collects field-level validation failures
///
/// # Example
///
/// ```
/// use taskhub_shared::error::ValidationErrors;
///
/// let mut errors = ValidationErrors::new();
/// errors.add("title", "Title is required");
/// assert!(errors.into_result().is_err());
///
/// assert!(ValidationErrors::new().into_result().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<FieldError> {
        self.fields
    }

    /// `Ok(())` when nothing was added, otherwise a `CoreError::Validation`.
    pub fn into_result(self) -> Result<(), CoreError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.fields.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Notification(#[from] NotifyError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl CoreError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CoreError::Validation(ValidationErrors::single(field, message))
    }
}

impl From<Denial> for CoreError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => CoreError::Authentication(denial.to_string()),
            Denial::Forbidden => CoreError::Authorization(denial.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collect_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "Title is required");
        errors.add("assigned_to", "Assigned user does not exist");

        assert_eq!(errors.fields().len(), 2);
        assert_eq!(
            errors.to_string(),
            "Title is required; Assigned user does not exist"
        );

        match errors.into_result() {
            Err(CoreError::Validation(e)) => assert_eq!(e.fields()[1].field, "assigned_to"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_denial_maps_to_distinct_kinds() {
        assert!(matches!(
            CoreError::from(Denial::Unauthenticated),
            CoreError::Authentication(_)
        ));
        assert!(matches!(
            CoreError::from(Denial::Forbidden),
            CoreError::Authorization(_)
        ));
    }
}
