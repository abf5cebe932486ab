//! Password hashing (argon2, PHC string format)

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use resonate_common::{Error, Result};

/// Argon2 hasher with configurable cost parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordHasher {
    /// Build a hasher with explicit memory (KiB) and iteration costs
    pub fn with_costs(m_cost: u32, t_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, 1, None)
            .map_err(|e| Error::Config(format!("Invalid argon2 parameters: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| Error::Internal(format!("Failed to encode salt: {}", e)))?;

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Verify a password against a stored PHC string
    ///
    /// Unparsable hashes never verify.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Spend one hash worth of work and fail
    ///
    /// Stands in for `verify` when no account matches, so an unknown
    /// username costs the same time as a wrong password.
    pub fn verify_absent(&self, password: &str) -> bool {
        let _ = self.hash(password);
        false
    }
}
