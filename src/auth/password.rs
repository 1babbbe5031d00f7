use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Storage(format!("failed to hash password: {e}")))
}

/// Mismatch and an unreadable stored hash both read as bad credentials.
pub fn verify_password(password: &str, hashed: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(hashed).map_err(|e| {
        tracing::error!(error = %e, "Stored password hash is unreadable");
        AppError::Unauthorized("Invalid credentials".into())
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(verify_password("battery staple", &hash).is_err());
    }

    #[test]
    fn garbage_hash_is_rejected() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
