/// Random tokens for session identifiers and CSRF protection
///
/// Both kinds of token are 32 bytes from the thread-local CSPRNG, hex
/// encoded (64 characters). Tokens are compared in constant time and only a
/// short prefix is ever written to logs.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::token::{constant_time_compare, generate_token, TOKEN_LENGTH};
///
/// let token = generate_token();
/// assert_eq!(token.len(), TOKEN_LENGTH);
/// assert!(constant_time_compare(&token, &token.clone()));
/// ```

use rand::RngCore;

/// Number of random bytes in a token
const TOKEN_BYTES: usize = 32;

/// Length of a hex-encoded token
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Characters of a token that may appear in log output
const LOG_PREFIX_LENGTH: usize = 8;

/// Generates a new hex-encoded random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Checks that a client-supplied value has the shape of a token.
///
/// Lets callers reject junk cookies before taking any lock.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Constant-time string comparison
///
/// Accumulates the XOR of every byte pair so the loop never exits early on
/// the first difference.
///
/// # Example
///
/// ```
/// use taskhub_shared::auth::token::constant_time_compare;
///
/// assert!(constant_time_compare("hello", "hello"));
/// assert!(!constant_time_compare("hello", "world"));
/// ```
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Prefix of a token that is safe to put in a log line.
pub fn log_prefix(token: &str) -> &str {
    match token.char_indices().nth(LOG_PREFIX_LENGTH) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();

        assert_eq!(token.len(), 64);
        assert!(is_well_formed(&token));
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let tokens: std::collections::HashSet<_> = (0..100).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_is_well_formed() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed(&"g".repeat(64)));
        assert!(is_well_formed(&"a1".repeat(32)));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("", ""));
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_log_prefix() {
        assert_eq!(log_prefix("0123456789abcdef"), "01234567");
        assert_eq!(log_prefix("abc"), "abc");
    }
}
