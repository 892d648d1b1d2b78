//! Raw seal/open for the two supported algorithms
//!
//! - AES-256-GCM: ciphertext is the encrypted data followed by the 16-byte
//!   tag. `open` either verifies the whole thing or returns nothing.
//! - AES-256-CBC with PKCS#7 padding: ciphertext is a whole number of
//!   16-byte blocks, at least one. There is NO integrity check. A successful
//!   `open` only means the padding looked right; it does not mean the data
//!   was not modified.
//!
//! Every failure of `open` is reported as the same `DecryptionFailed`
//! error, whether the tag was wrong, the padding was wrong, or the length
//! was not a multiple of the block size.

use crate::error::{ErrorCategory, ErrorKind, Result, SfeError};
use crate::format::{Algorithm, CBC_IV_LEN, GCM_IV_LEN};
use crate::kdf::DerivedKey;
use crate::random::SecureRandomSource;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256Dec, Aes256Enc, Block};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

const BLOCK_LEN: usize = 16;

/// Per-encryption initialization vector. The variant fixes both the length
/// and the algorithm it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iv {
    Authenticated([u8; GCM_IV_LEN]),
    Unauthenticated([u8; CBC_IV_LEN]),
}

impl Iv {
    /// Draw a fresh IV of the right length for `algorithm`.
    pub fn generate(algorithm: Algorithm, rng: &mut dyn SecureRandomSource) -> Result<Self> {
        Ok(match algorithm {
            Algorithm::Authenticated => {
                let mut iv = [0u8; GCM_IV_LEN];
                rng.fill(&mut iv)?;
                Iv::Authenticated(iv)
            }
            Algorithm::Unauthenticated => {
                let mut iv = [0u8; CBC_IV_LEN];
                rng.fill(&mut iv)?;
                Iv::Unauthenticated(iv)
            }
        })
    }

    /// Build an IV from raw bytes. `None` if the length does not match the algorithm.
    pub fn from_slice(algorithm: Algorithm, bytes: &[u8]) -> Option<Self> {
        match algorithm {
            Algorithm::Authenticated => bytes.try_into().ok().map(Iv::Authenticated),
            Algorithm::Unauthenticated => bytes.try_into().ok().map(Iv::Unauthenticated),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Iv::Authenticated(_) => Algorithm::Authenticated,
            Iv::Unauthenticated(_) => Algorithm::Unauthenticated,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Iv::Authenticated(iv) => iv,
            Iv::Unauthenticated(iv) => iv,
        }
    }
}

/// Encrypt `plaintext` under `key` and `iv`.
pub fn seal(key: &DerivedKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    check_key_matches(key, iv)?;
    match iv {
        Iv::Authenticated(nonce) => {
            let cipher = Aes256Gcm::new(key.bytes().into());
            cipher
                .encrypt(Nonce::from_slice(nonce), plaintext)
                .map_err(|e| {
                    SfeError::with_kind(
                        ErrorCategory::Internal,
                        ErrorKind::InternalInvariant,
                        format!("encryption failed: {}", e),
                    )
                })
        }
        Iv::Unauthenticated(iv) => Ok(cbc_seal(key, iv, plaintext)),
    }
}

/// Decrypt `ciphertext` under `key` and `iv`.
///
/// The returned buffer is wiped when dropped.
pub fn open(key: &DerivedKey, iv: &Iv, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    check_key_matches(key, iv)?;
    match iv {
        Iv::Authenticated(nonce) => {
            let cipher = Aes256Gcm::new(key.bytes().into());
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map(Zeroizing::new)
                .map_err(|_| SfeError::decryption_failed())
        }
        Iv::Unauthenticated(iv) => cbc_open(key, iv, ciphertext),
    }
}

fn check_key_matches(key: &DerivedKey, iv: &Iv) -> Result<()> {
    if key.algorithm() != iv.algorithm() {
        return Err(SfeError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!(
                "key derived for {} cannot be used with {}",
                key.algorithm(),
                iv.algorithm()
            ),
        ));
    }
    Ok(())
}

fn xor_in_place(block: &mut [u8], other: &[u8; BLOCK_LEN]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

fn cbc_seal(key: &DerivedKey, iv: &[u8; CBC_IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Enc::new(key.bytes().into());

    // PKCS#7: always 1..=16 bytes of padding, each equal to the pad length.
    let pad = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
    let mut buf = Zeroizing::new(Vec::with_capacity(plaintext.len() + pad));
    buf.extend_from_slice(plaintext);
    buf.resize(plaintext.len() + pad, pad as u8);

    // Encrypted in place, so the padded plaintext copy never outlives this loop.
    let mut prev = *iv;
    for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
        xor_in_place(chunk, &prev);
        cipher.encrypt_block(Block::from_mut_slice(chunk));
        prev.copy_from_slice(chunk);
    }

    std::mem::take(&mut *buf)
}

fn cbc_open(
    key: &DerivedKey,
    iv: &[u8; CBC_IV_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(SfeError::decryption_failed());
    }

    let cipher = Aes256Dec::new(key.bytes().into());
    let mut buf = Zeroizing::new(ciphertext.to_vec());
    let mut prev = *iv;
    for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
        let mut current = [0u8; BLOCK_LEN];
        current.copy_from_slice(chunk);
        cipher.decrypt_block(Block::from_mut_slice(chunk));
        xor_in_place(chunk, &prev);
        prev = current;
    }

    let pad = usize::from(buf[buf.len() - 1]);
    let valid = (1..=BLOCK_LEN).contains(&pad)
        && buf[buf.len() - pad..].iter().all(|&b| usize::from(b) == pad);
    if !valid {
        return Err(SfeError::decryption_failed());
    }

    let len = buf.len() - pad;
    buf.truncate(len);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SALT_LEN;
    use crate::kdf;
    use crate::random::SeededRandom;

    fn key_for(algorithm: Algorithm) -> DerivedKey {
        kdf::derive(b"cipher test", &[9u8; SALT_LEN], algorithm)
    }

    #[test]
    fn test_gcm_roundtrip() {
        let key = key_for(Algorithm::Authenticated);
        let iv = Iv::Authenticated([3u8; GCM_IV_LEN]);
        let sealed = seal(&key, &iv, b"hello").unwrap();
        assert_eq!(sealed.len(), 5 + 16);
        assert_eq!(&*open(&key, &iv, &sealed).unwrap(), b"hello");
    }

    #[test]
    fn test_gcm_empty_plaintext_is_just_a_tag() {
        let key = key_for(Algorithm::Authenticated);
        let iv = Iv::Authenticated([3u8; GCM_IV_LEN]);
        let sealed = seal(&key, &iv, b"").unwrap();
        assert_eq!(sealed.len(), 16);
        assert!(open(&key, &iv, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_gcm_every_bit_flip_rejected() {
        let key = key_for(Algorithm::Authenticated);
        let iv = Iv::Authenticated([5u8; GCM_IV_LEN]);
        let sealed = seal(&key, &iv, b"attack at dawn").unwrap();

        for bit in 0..sealed.len() * 8 {
            let mut tampered = sealed.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            let err = open(&key, &iv, &tampered).expect_err("tampering must be detected");
            assert_eq!(err.kind, Some(ErrorKind::DecryptionFailed), "bit {}", bit);
        }
    }

    #[test]
    fn test_cbc_padding_lengths() {
        let key = key_for(Algorithm::Unauthenticated);
        let iv = Iv::Unauthenticated([1u8; CBC_IV_LEN]);
        for len in [0usize, 1, 15, 16, 17, 31, 32, 100] {
            let plaintext = vec![0xA5u8; len];
            let sealed = seal(&key, &iv, &plaintext).unwrap();
            assert_eq!(sealed.len(), (len / BLOCK_LEN + 1) * BLOCK_LEN, "len {}", len);
            assert_eq!(&*open(&key, &iv, &sealed).unwrap(), &plaintext[..]);
        }
    }

    #[test]
    fn test_cbc_chaining_depends_on_iv() {
        let key = key_for(Algorithm::Unauthenticated);
        let plaintext = [0u8; 32];
        let a = seal(&key, &Iv::Unauthenticated([1u8; CBC_IV_LEN]), &plaintext).unwrap();
        let b = seal(&key, &Iv::Unauthenticated([2u8; CBC_IV_LEN]), &plaintext).unwrap();
        assert_ne!(a, b);
        // Identical plaintext blocks must not produce identical ciphertext blocks.
        assert_ne!(a[..16], a[16..32]);
    }

    #[test]
    fn test_cbc_rejects_partial_blocks() {
        let key = key_for(Algorithm::Unauthenticated);
        let iv = Iv::Unauthenticated([1u8; CBC_IV_LEN]);
        for len in [0usize, 1, 15, 17, 33] {
            let err = open(&key, &iv, &vec![0u8; len]).expect_err("must reject");
            assert_eq!(err.kind, Some(ErrorKind::DecryptionFailed), "len {}", len);
        }
    }

    #[test]
    fn test_cbc_bad_padding_is_merged_failure() {
        let key = key_for(Algorithm::Unauthenticated);
        let iv = Iv::Unauthenticated([1u8; CBC_IV_LEN]);

        // Sealing a full block appends a whole padding block. Keeping only the
        // first ciphertext block yields input whose last decrypted block is
        // exactly `block`, so its padding is whatever `tail` says.
        let tails: [&[u8]; 5] = [
            &[0x00],
            &[0x11],
            &[0xFF],
            &[0x09, 0x04, 0x04, 0x04],
            &[0x05, 0x02],
        ];
        for tail in tails {
            let mut block = [0x41u8; BLOCK_LEN];
            block[BLOCK_LEN - tail.len()..].copy_from_slice(tail);
            let sealed = seal(&key, &iv, &block).unwrap();
            assert_eq!(sealed.len(), 2 * BLOCK_LEN);

            let err = open(&key, &iv, &sealed[..BLOCK_LEN]).expect_err("bad padding accepted");
            assert_eq!(err.kind, Some(ErrorKind::DecryptionFailed), "tail {:?}", tail);
        }

        let mut block = [0x41u8; BLOCK_LEN];
        block[BLOCK_LEN - 2..].copy_from_slice(&[0x02, 0x02]);
        let sealed = seal(&key, &iv, &block).unwrap();
        assert_eq!(&*open(&key, &iv, &sealed[..BLOCK_LEN]).unwrap(), &[0x41u8; 14][..]);
    }

    #[test]
    fn test_key_algorithm_mismatch_refused() {
        let key = key_for(Algorithm::Authenticated);
        let iv = Iv::Unauthenticated([0u8; CBC_IV_LEN]);
        let err = seal(&key, &iv, b"data").expect_err("mismatch must be refused");
        assert_eq!(err.kind, Some(ErrorKind::InternalInvariant));

        let key = key_for(Algorithm::Unauthenticated);
        let iv = Iv::Authenticated([0u8; GCM_IV_LEN]);
        let err = open(&key, &iv, &[0u8; 32]).expect_err("mismatch must be refused");
        assert_eq!(err.kind, Some(ErrorKind::InternalInvariant));
    }

    #[test]
    fn test_iv_generate_and_from_slice() {
        let mut rng = SeededRandom::new(42);
        let gcm = Iv::generate(Algorithm::Authenticated, &mut rng).unwrap();
        let cbc = Iv::generate(Algorithm::Unauthenticated, &mut rng).unwrap();
        assert_eq!(gcm.as_bytes().len(), GCM_IV_LEN);
        assert_eq!(cbc.as_bytes().len(), CBC_IV_LEN);
        assert_eq!(gcm.algorithm(), Algorithm::Authenticated);
        assert_eq!(cbc.algorithm(), Algorithm::Unauthenticated);

        assert_eq!(Iv::from_slice(Algorithm::Authenticated, gcm.as_bytes()), Some(gcm));
        assert_eq!(Iv::from_slice(Algorithm::Unauthenticated, cbc.as_bytes()), Some(cbc));
        assert_eq!(Iv::from_slice(Algorithm::Unauthenticated, gcm.as_bytes()), None);
        assert_eq!(Iv::from_slice(Algorithm::Authenticated, &[0u8; 11]), None);
    }
}
