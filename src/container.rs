//! Whole-file encrypt and decrypt pipelines
//!
//! Both operations are single-shot and stateless: every call draws its own
//! salt and IV, derives its own key, and owns all intermediate buffers.
//! Concurrent calls share nothing.
//!
//! Plaintext buffers handled here are wiped when they go out of scope, on
//! success and on every error path alike. This is hygiene only: the
//! allocator, the OS, or the caller may still hold other copies.

use crate::cipher::{self, Iv};
use crate::error::{ErrorCategory, ErrorKind, Result, SfeError};
use crate::format::{Algorithm, ENCRYPTED_SUFFIX, FormatVersion, MIN_HEADER_LEN, SALT_LEN};
use crate::header::{self, Header};
use crate::kdf;
use crate::random::{OsRandom, SecureRandomSource};
use zeroize::Zeroizing;

/// Name used when a container does not record one.
const FALLBACK_NAME: &str = "decrypted";

/// Result of [`encrypt_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFile {
    /// The full container: header followed by ciphertext.
    pub output_bytes: Vec<u8>,
    /// Original name plus `.sfe`.
    pub suggested_name: String,
}

/// Result of [`decrypt_file`].
#[derive(Debug)]
pub struct DecryptedFile {
    /// Recovered plaintext; wiped when dropped.
    pub output_bytes: Zeroizing<Vec<u8>>,
    /// Filename recorded at encryption time.
    pub suggested_name: String,
    pub mime_type: String,
}

/// Encrypt a file's contents with a password using a fresh random salt and IV
///
/// `contents` is taken by value so it can be wiped once it has been
/// encrypted. The container always uses the current header version.
pub fn encrypt_file(
    contents: Vec<u8>,
    name: &str,
    mime: &str,
    password: &[u8],
    algorithm: Algorithm,
) -> Result<EncryptedFile> {
    encrypt_file_with_rng(contents, name, mime, password, algorithm, &mut OsRandom)
}

/// Same as [`encrypt_file`], drawing salt and IV from `rng`.
///
/// Pass anything other than [`OsRandom`] ONLY in tests.
pub fn encrypt_file_with_rng(
    contents: Vec<u8>,
    name: &str,
    mime: &str,
    password: &[u8],
    algorithm: Algorithm,
    rng: &mut dyn SecureRandomSource,
) -> Result<EncryptedFile> {
    let plaintext = Zeroizing::new(contents);

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;
    let iv = Iv::generate(algorithm, rng)?;

    let header = Header {
        version: FormatVersion::Current,
        salt,
        iv,
        name: name.to_string(),
        mime: mime.to_string(),
    };
    // Encode before the expensive derivation so oversized names fail fast.
    let mut output = header.encode()?;

    let key = kdf::derive(password, &salt, algorithm);
    let ciphertext = cipher::seal(&key, &iv, &plaintext)?;
    drop(key);
    drop(plaintext);

    output.extend_from_slice(&ciphertext);
    tracing::debug!(
        %algorithm,
        container_len = output.len(),
        "encrypted file"
    );

    Ok(EncryptedFile {
        output_bytes: output,
        suggested_name: suggested_encrypted_name(name),
    })
}

/// Decrypt a container produced by [`encrypt_file`] (or a legacy `SFE1` container)
///
/// Any failure to open the ciphertext is reported as
/// [`ErrorKind::DecryptionFailed`], whatever the cause. A wrong password
/// and a modified container are deliberately indistinguishable.
///
/// Containers using [`Algorithm::Unauthenticated`] carry no integrity
/// protection: success does not prove the data was left untouched.
pub fn decrypt_file(container: &[u8], password: &[u8]) -> Result<DecryptedFile> {
    if container.len() < MIN_HEADER_LEN {
        return Err(SfeError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidFormat,
            format!(
                "input is {} bytes, smaller than the smallest possible header ({} bytes); likely truncated",
                container.len(),
                MIN_HEADER_LEN
            ),
        ));
    }

    let (header, offset) = header::decode(container)?;
    let key = kdf::derive(password, &header.salt, header.algorithm());
    let plaintext = cipher::open(&key, &header.iv, &container[offset..])?;
    drop(key);

    tracing::debug!(
        version = %header.version,
        algorithm = %header.algorithm(),
        plaintext_len = plaintext.len(),
        "decrypted file"
    );

    let suggested_name = if header.name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        header.name
    };

    Ok(DecryptedFile {
        output_bytes: plaintext,
        suggested_name,
        mime_type: header.mime,
    })
}

fn suggested_encrypted_name(name: &str) -> String {
    let stem = if name.is_empty() { FALLBACK_NAME } else { name };
    format!("{}{}", stem, ENCRYPTED_SUFFIX)
}
