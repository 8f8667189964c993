//! Argon2id password hashing for the local identity provider.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use log::warn;

/// Hashes and verifies passwords with fixed Argon2id parameters.
#[derive(Debug, Clone)]
pub struct PasswordHashing {
    params: Params,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl PasswordHashing {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn hasher(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Produces a PHC-format hash string with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| err.to_string())
    }

    /// Checks `password` against a stored PHC hash string.
    ///
    /// Unparseable hashes never verify.
    pub fn verify(&self, stored_hash: &str, password: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("event=password_verify module=auth status=error error_code=bad_hash error={err}");
                return false;
            }
        };
        self.hasher()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::PasswordHashing;
    use argon2::Params;

    fn cheap() -> PasswordHashing {
        PasswordHashing::new(Params::new(256, 1, 1, None).unwrap())
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hashing = cheap();
        let hash = hashing.hash("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hashing.verify(&hash, "s3cret!"));
        assert!(!hashing.verify(&hash, "s3cret?"));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!cheap().verify("not-a-phc-string", "anything"));
    }
}
