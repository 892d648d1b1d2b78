//! sfe - Password-based file encryption into a self-describing container
//!
//! A container records the original filename and MIME type next to the
//! ciphertext, so decrypting needs nothing but the container and the
//! password. Keys come from PBKDF2-HMAC-SHA256; data is sealed with
//! AES-256-GCM by default, or AES-256-CBC on request.

#![forbid(unsafe_code)]

pub mod batch;
pub mod cipher;
pub mod container;
pub mod error;
pub mod file_ops;
pub mod format;
pub mod header;
pub mod kdf;
pub mod mime;
pub mod passphrase;
pub mod random;

pub use container::{
    DecryptedFile, EncryptedFile, decrypt_file, encrypt_file, encrypt_file_with_rng,
};
pub use error::{ErrorCategory, ErrorKind, Field, Result, SfeError};
pub use format::{Algorithm, FormatVersion};
