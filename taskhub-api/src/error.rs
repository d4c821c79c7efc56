/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts to an HTTP
/// response with a JSON body:
///
/// ```json
/// { "error": "validation_error", "message": "Request validation failed",
///   "details": [{ "field": "title", "message": "Title is required" }] }
/// ```
///
/// Domain errors ([`CoreError`]) and guard denials convert with `?`. Storage
/// and notification failures are logged here, once, with full detail.
///
/// # Example
///
/// ```
/// use taskhub_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(id: i64) -> ApiResult<Json<serde_json::Value>> {
///     if id <= 0 {
///         return Err(ApiError::NotFound("Task not found".to_string()));
///     }
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::guard::Denial;
use taskhub_shared::error::CoreError;

static EXPOSE_INTERNAL: AtomicBool = AtomicBool::new(false);

/// Lets storage error responses carry internal detail (`APP_DEBUG`).
pub fn set_expose_internal(enabled: bool) {
    EXPOSE_INTERNAL.store(enabled, Ordering::Relaxed);
}

fn expose_internal() -> bool {
    EXPOSE_INTERNAL.load(Ordering::Relaxed)
}

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401): no valid session
    Unauthorized(String),

    /// Forbidden (403): valid session, action not allowed
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or a user still referenced
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        message: String,
    },

    /// Internal server error (500)
    InternalError(String),

    /// Bad gateway (502): committed, but the mail relay failed
    BadGateway(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Handle rate limit separately to add Retry-After header
        if let ApiError::RateLimitExceeded { retry_after, message } = self {
            let body = Json(ErrorResponse {
                error: "rate_limit_exceeded".to_string(),
                message,
                details: None,
            });

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            return response;
        }

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", message, None)
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "notification_failed", msg, None),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication(msg) => ApiError::Unauthorized(msg),
            CoreError::Authorization(msg) => ApiError::Forbidden(msg),
            CoreError::Validation(errors) => ApiError::ValidationError(
                errors
                    .into_fields()
                    .into_iter()
                    .map(|e| ValidationErrorDetail {
                        field: e.field,
                        message: e.message,
                    })
                    .collect(),
            ),
            CoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::Storage(e) => {
                tracing::error!(error = %e, "Storage operation failed");
                let message = if expose_internal() {
                    e.to_string()
                } else {
                    "The service is temporarily unavailable, please try again".to_string()
                };
                ApiError::ServiceUnavailable(message)
            }
            CoreError::Notification(e) => {
                tracing::warn!(error = %e, "Change saved but notification failed");
                ApiError::BadGateway(
                    "The change was saved, but the notification email could not be sent".to_string(),
                )
            }
            CoreError::Password(e) => ApiError::InternalError(format!("Password operation failed: {}", e)),
        }
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => ApiError::Unauthorized(denial.to_string()),
            Denial::Forbidden => ApiError::Forbidden(denial.to_string()),
        }
    }
}

/// Convert request-body validation failures to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    }
}
