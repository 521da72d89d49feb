use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Maximum allowed plain-text password length in characters
///
/// Argon2 is intentionally slow, so unbounded input is a cheap way to burn CPU.
pub const MAX_PASSWORD_LENGTH: usize = 64;

/// Hash a password using Argon2id
///
/// The output is a PHC string carrying algorithm, parameters, salt and hash:
/// ```text
/// $argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>
/// ```
/// With the default parameters this is 97 characters, within the 100
/// character `users.password` column.
///
/// Each call draws a fresh salt from the OS CSPRNG, so hashing the same
/// password twice yields different strings. Verification is unaffected.
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();

    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Verify a password against a stored PHC hash
///
/// Salt and parameters are read back from the stored string; the comparison
/// runs in constant time.
///
/// # Returns
/// - `Ok(true)`: Password matches
/// - `Ok(false)`: Password doesn't match
/// - `Err(ErrorMessage)`: Input rejected or the stored hash is malformed
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    let password_matched = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();

    Ok(password_matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_compare() {
        let hashed = hash("correct horse").unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(compare("correct horse", &hashed).unwrap());
        assert!(!compare("battery staple", &hashed).unwrap());
    }

    #[test]
    fn hash_fits_password_column() {
        let hashed = hash("x".repeat(MAX_PASSWORD_LENGTH)).unwrap();
        assert!(hashed.chars().count() <= 100);
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash("same").unwrap(), hash("same").unwrap());
    }

    #[test]
    fn rejects_empty_and_long() {
        assert_eq!(hash(""), Err(ErrorMessage::EmptyPassword));
        assert_eq!(
            hash("x".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH))
        );
        assert_eq!(compare("", "whatever"), Err(ErrorMessage::EmptyPassword));
    }

    #[test]
    fn malformed_hash() {
        assert_eq!(
            compare("password", "not-a-phc-string"),
            Err(ErrorMessage::InvalidHashFormat)
        );
    }
}
