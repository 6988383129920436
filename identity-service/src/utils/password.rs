use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt;

/// Newtype for a plaintext password. Never printed.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for a PHC-formatted password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for PasswordHashString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHashString(***)")
    }
}

/// Hash a password using Argon2id with a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash.
///
/// Returns Ok(()) if the password matches, Err otherwise. A malformed stored
/// hash is reported the same way as a mismatch.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_phc_argon2() {
        let hash = hash_password(&Password::new("pw1")).expect("Failed to hash password");
        assert!(hash.as_str().starts_with("$argon2"));
        assert!(!hash.as_str().contains("pw1"));
    }

    #[test]
    fn verify_accepts_original_and_rejects_others() {
        let password = Password::new("correct horse");
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(verify_password(&password, &hash).is_ok());
        assert!(verify_password(&Password::new("correct horse "), &hash).is_err());
        assert!(verify_password(&Password::new(""), &hash).is_err());
    }

    #[test]
    fn same_password_hashes_differently() {
        let password = Password::new("pw1");
        let hash1 = hash_password(&password).expect("Failed to hash password");
        let hash2 = hash_password(&password).expect("Failed to hash password");

        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(verify_password(&password, &hash1).is_ok());
        assert!(verify_password(&password, &hash2).is_ok());
    }

    #[test]
    fn malformed_hash_fails_verification() {
        let hash = PasswordHashString::new("not-a-phc-string".to_string());
        assert!(verify_password(&Password::new("pw1"), &hash).is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let password = Password::new("hunter2");
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
