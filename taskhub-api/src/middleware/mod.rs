/// Middleware modules for the API server
///
/// - `rate_limit`: per-address fixed-window limiter
/// - `security`: security response headers
/// - `session`: session cookie resolution, rotation and CSRF checks

pub mod rate_limit;
pub mod security;
pub mod session;
