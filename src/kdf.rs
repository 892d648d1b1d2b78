//! Password-based key derivation
//!
//! PBKDF2-HMAC-SHA256 with a fixed iteration count. The resulting key is
//! tagged with the algorithm it was derived for, and the cipher engine
//! refuses to use it for anything else.

use crate::format::{Algorithm, SALT_LEN};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count. Not configurable.
pub const PBKDF2_ITERATIONS: u32 = 200_000;

/// A 256-bit key bound to a single algorithm. Wiped on drop.
pub struct DerivedKey {
    algorithm: Algorithm,
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKey {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Derive a 32-byte key from a password and salt for use with `algorithm`
///
/// Deterministic: the decrypt side recomputes the same key from the salt
/// stored in the header.
pub fn derive(password: &[u8], salt: &[u8; SALT_LEN], algorithm: Algorithm) -> DerivedKey {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, bytes.as_mut());
    tracing::trace!(%algorithm, iterations = PBKDF2_ITERATIONS, "derived key");
    DerivedKey { algorithm, bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive(b"password", &salt, Algorithm::Authenticated);
        let b = derive(b"password", &salt, Algorithm::Authenticated);
        assert_eq!(a.bytes(), b.bytes());
    }

    #[test]
    fn test_salt_and_password_matter() {
        let salt = [7u8; SALT_LEN];
        let mut other_salt = salt;
        other_salt[0] ^= 1;

        let base = derive(b"password", &salt, Algorithm::Authenticated);
        let salted = derive(b"password", &other_salt, Algorithm::Authenticated);
        let other_pw = derive(b"passwore", &salt, Algorithm::Authenticated);

        assert_ne!(base.bytes(), salted.bytes());
        assert_ne!(base.bytes(), other_pw.bytes());
    }

    #[test]
    fn test_key_carries_algorithm() {
        let salt = [0u8; SALT_LEN];
        assert_eq!(
            derive(b"pw", &salt, Algorithm::Unauthenticated).algorithm(),
            Algorithm::Unauthenticated
        );
        assert_eq!(
            derive(b"pw", &salt, Algorithm::Authenticated).algorithm(),
            Algorithm::Authenticated
        );
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = derive(b"pw", &[1u8; SALT_LEN], Algorithm::Authenticated);
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("Authenticated"));
        assert!(!rendered.contains("bytes"));
    }

    #[test]
    fn test_known_answer() {
        // Pins the hash choice; the widely published single-iteration vector.
        let mut out = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(b"password", b"salt", 1, &mut out);
        assert_eq!(
            hex::encode(out),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }
}
