//! Salted SHA-256 password hashing for seeded lab accounts
//!
//! Authentication itself is handled outside this service; these hashes only
//! exist so seeded accounts carry a credential that an external login layer
//! can verify.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random 16-byte salt as 32 hex characters
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hash `password` with `salt` (salt prepended), 64 hex characters
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check `password` against a stored hash and salt
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_are_random_hex() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_depends_on_salt() {
        let h1 = hash_password("secret", "aa");
        let h2 = hash_password("secret", "bb");
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, h2);
        assert!(verify_password("secret", "aa", &h1));
        assert!(!verify_password("Secret", "aa", &h1));
    }
}
