use std::fmt;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Argon2id hash of a password in PHC string form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordCredential(String);

impl PasswordCredential {
    pub fn hash(password: &str) -> AppResult<Self> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| AppError::Credential(err.to_string()))?;
        Ok(Self(hash.to_string()))
    }

    /// Wraps a stored PHC string. The string is parsed lazily by [`Self::verify`].
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// False for a wrong password and for a credential that cannot be parsed.
    pub fn verify(&self, password: &str) -> bool {
        match PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                tracing::warn!(target: "identity.store", "stored credential is malformed: {err}");
                false
            }
        }
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordCredential(<redacted>)")
    }
}
