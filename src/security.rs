//! Password hashing and password-strength policy.
//!
//! Hashes are Argon2 PHC strings (`$argon2id$v=19$...`) so the salt and
//! parameters travel with the digest. Verification recomputes with the embedded
//! salt; the digest comparison inside `password-hash` is constant time.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::error::{AuthError, AuthResult};

/// Opaque stored password hash (PHC string including its salt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedValue(String);

impl HashedValue {
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

/// Hash a raw password with a fresh 16-byte salt from the OS RNG.
pub fn hash_password(password: &str) -> AuthResult<HashedValue> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::Internal(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Internal(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .to_string();
    Ok(HashedValue(phc))
}

/// True iff `password` matches `stored`. Malformed or legacy hashes yield false.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(stored) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Burn roughly the same time as a real verification. Used on the unknown-user
/// login path so response timing does not reveal which usernames exist.
pub fn dummy_verify(password: &str) {
    static DUMMY: std::sync::OnceLock<Option<String>> = std::sync::OnceLock::new();
    let phc = DUMMY.get_or_init(|| hash_password("intelhub-dummy-password").ok().map(HashedValue::into_string));
    if let Some(phc) = phc {
        let _ = verify_password(password, phc);
    }
}

/// Password-strength rules applied at registration and rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// Require at least one uppercase letter, one lowercase letter and one digit.
    pub require_mixed: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self { Self { min_length: 8, require_mixed: false } }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> AuthResult<()> {
        if password.is_empty() {
            return Err(AuthError::WeakPassword("password cannot be empty".into()));
        }
        if password.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword(format!("password must be at least {} characters long", self.min_length)));
        }
        if self.require_mixed {
            let upper = password.chars().any(|c| c.is_uppercase());
            let lower = password.chars().any(|c| c.is_lowercase());
            let digit = password.chars().any(|c| c.is_ascii_digit());
            if !(upper && lower && digit) {
                return Err(AuthError::WeakPassword("password must mix upper case, lower case and digits".into()));
            }
        }
        Ok(())
    }
}
