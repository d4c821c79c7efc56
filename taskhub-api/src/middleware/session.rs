/// Session middleware
///
/// Resolves the `TASK_SESSION` cookie to a [`Session`] and hands it to
/// handlers as a [`CurrentSession`] request extension. Handlers never read
/// cookies themselves.
///
/// On each request the session is touched:
///
/// - idle too long: removed, the request continues without a session and the
///   cookie is cleared
/// - due for rotation: the id changes and the response carries a
///   replacement cookie
///
/// Mutating requests (anything but GET, HEAD and OPTIONS) made with a session
/// must carry the session's CSRF token in `X-CSRF-Token`; a missing or wrong
/// token is refused with 403. Login and session checks are exempt.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use taskhub_shared::auth::session::{Session, SessionError};
use taskhub_shared::auth::token::log_prefix;

use crate::app::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "TASK_SESSION";

pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_EXEMPT: [&str; 2] = ["/api/auth/login", "/api/auth/check"];

/// The caller's session, if any
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<Session>);

impl CurrentSession {
    pub fn get(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}

/// Reads the session id from the `Cookie` headers.
pub fn session_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a session id
pub fn session_cookie(id: &str, secure: bool) -> HeaderValue {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", SESSION_COOKIE, id);
    if secure {
        cookie.push_str("; Secure");
    }
    // Session ids are hex, so the value is always a valid header
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| clear_cookie(secure))
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("TASK_SESSION=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("TASK_SESSION=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
    }
}

fn requires_csrf(method: &Method, path: &str) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) && !CSRF_EXEMPT.contains(&path)
}

pub async fn session_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let secure = state.config.api.production;
    let mut session = None;
    let mut replacement = None;

    if let Some(id) = session_id_from(request.headers()) {
        match state.sessions.touch(&id).await {
            Ok(touched) => {
                if touched.rotated {
                    replacement = Some(session_cookie(&touched.session.id, secure));
                }
                session = Some(touched.session);
            }
            Err(SessionError::Expired) => {
                tracing::debug!(session = log_prefix(&id), "Session expired");
                replacement = Some(clear_cookie(secure));
            }
            Err(SessionError::Unknown) => {
                replacement = Some(clear_cookie(secure));
            }
        }
    }

    let csrf_failure = match &session {
        Some(s) if requires_csrf(request.method(), request.uri().path()) => {
            let supplied = request
                .headers()
                .get(CSRF_HEADER)
                .and_then(|value| value.to_str().ok());
            let valid = supplied.map_or(false, |token| s.verify_csrf(token));
            if !valid {
                tracing::warn!(
                    user_id = s.user_id,
                    path = %request.uri().path(),
                    "CSRF token missing or invalid"
                );
            }
            !valid
        }
        _ => false,
    };

    let mut response = if csrf_failure {
        ApiError::Forbidden("Invalid or missing CSRF token".to_string()).into_response()
    } else {
        request.extensions_mut().insert(CurrentSession(session));
        next.run(request).await
    };

    // Login and logout set their own cookie
    if let Some(cookie) = replacement {
        if !response.headers().contains_key(header::SET_COOKIE) {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
    }

    response
}
