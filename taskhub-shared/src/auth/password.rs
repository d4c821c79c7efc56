/// Argon2id password hashing
///
/// Stored hashes are PHC strings, so the parameters travel with the hash and
/// verification keeps working if the defaults below are ever raised.
///
/// # Parameters
///
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Shortest password an administrator may set for an account.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted password, bounding hashing work per request.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn argon2id() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with Argon2id and a fresh 16-byte salt.
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2id()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; errors are reserved for hashes that
/// cannot be parsed or verified at all.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    if parsed_hash.salt.is_none() || parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash("Hash has no salt or output".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Burns the same amount of work as a real verification.
///
/// Called when a login names an account that does not exist, so the response
/// time does not reveal which identifiers are registered.
pub fn verify_dummy(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();

    let hash = DUMMY.get_or_init(|| hash_password("taskhub-dummy-password").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

/// Validates a password chosen by an administrator.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("longenough").is_ok());
/// assert!(validate_password_strength("short").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }

    if password.trim().is_empty() {
        return Err("Password must not be blank".to_string());
    }

    Ok(())
}
