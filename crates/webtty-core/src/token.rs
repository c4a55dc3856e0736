//! Per-run access tokens.
//!
//! A single token is generated at startup and must be presented as the
//! `token` query parameter on every guarded request.

use crate::error::{WebttyError, WebttyResult};
use rand::rngs::OsRng;
use rand::RngCore;

/// Alphabet tokens are drawn from.
pub const TOKEN_ALPHABET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the token generated at server startup.
pub const TOKEN_LENGTH: i64 = 16;

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above it are rejected so every character is equally likely.
const REJECTION_BOUND: u8 = (256 / TOKEN_ALPHABET.len() * TOKEN_ALPHABET.len()) as u8;

/// Generate a random alphanumeric token of exactly `length` characters.
pub fn generate_token(length: i64) -> WebttyResult<String> {
    let length = usize::try_from(length).map_err(|_| WebttyError::InvalidLength(length))?;
    fill_token(&mut OsRng, length)
}

fn fill_token<R: RngCore>(rng: &mut R, length: usize) -> WebttyResult<String> {
    let mut token = String::with_capacity(length);
    let mut buf = [0u8; 64];
    while token.len() < length {
        rng.try_fill_bytes(&mut buf)?;
        for &b in buf.iter().filter(|&&b| b < REJECTION_BOUND) {
            if token.len() == length {
                break;
            }
            token.push(TOKEN_ALPHABET[b as usize % TOKEN_ALPHABET.len()] as char);
        }
    }
    Ok(token)
}

/// The process-wide access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: Option<String>,
}

impl AccessToken {
    /// Generate the startup token. No token exists when auth is disabled.
    pub fn generate(auth_disabled: bool) -> WebttyResult<Self> {
        if auth_disabled {
            return Ok(Self::disabled());
        }
        Ok(Self {
            secret: Some(generate_token(TOKEN_LENGTH)?),
        })
    }

    /// A guard that lets every request through.
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    /// A guard with a fixed secret.
    pub fn fixed(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }

    /// The secret, if auth is enabled.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// Whether a request presenting `candidate` may proceed.
    pub fn permits(&self, candidate: Option<&str>) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => candidate == Some(secret.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An RNG whose source always fails.
    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no entropy",
            )))
        }
    }

    #[test]
    fn token_has_requested_length() {
        for n in [1, 10, 16, 1000] {
            let token = generate_token(n).unwrap();
            assert_eq!(token.len(), n as usize);
            assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(generate_token(0).unwrap(), "");
    }

    #[test]
    fn negative_length_fails() {
        assert!(matches!(
            generate_token(-3),
            Err(WebttyError::InvalidLength(-3))
        ));
    }

    #[test]
    fn successive_tokens_differ() {
        let a = generate_token(16).unwrap();
        let b = generate_token(16).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn broken_entropy_source() {
        assert!(matches!(
            fill_token(&mut BrokenRng, 8),
            Err(WebttyError::InsufficientEntropy(_))
        ));
        // Nothing to draw, nothing to fail.
        assert_eq!(fill_token(&mut BrokenRng, 0).unwrap(), "");
    }

    #[test]
    fn rejection_bound_is_multiple_of_alphabet() {
        assert_eq!(REJECTION_BOUND, 248);
        assert_eq!(REJECTION_BOUND as usize % TOKEN_ALPHABET.len(), 0);
    }

    #[test]
    fn guard_checks_exact_match() {
        let token = AccessToken::fixed("abc123");
        assert!(token.permits(Some("abc123")));
        assert!(!token.permits(Some("abc1234")));
        assert!(!token.permits(Some("")));
        assert!(!token.permits(None));
    }

    #[test]
    fn disabled_guard_permits_everything() {
        let token = AccessToken::generate(true).unwrap();
        assert!(token.secret().is_none());
        assert!(token.permits(None));
        assert!(token.permits(Some("anything")));
    }

    #[test]
    fn generated_guard_has_secret() {
        let token = AccessToken::generate(false).unwrap();
        let secret = token.secret().unwrap().to_string();
        assert_eq!(secret.len(), TOKEN_LENGTH as usize);
        assert!(token.permits(Some(&secret)));
    }
}
