//! Parallel processing of independent files
//!
//! Each item is encrypted or decrypted on the rayon pool with its own salt,
//! IV and key. One item failing has no effect on the others; results come
//! back in input order.

use crate::container::{self, DecryptedFile, EncryptedFile};
use crate::error::Result;
use crate::format::Algorithm;
use rayon::prelude::*;

/// A plaintext file awaiting encryption.
#[derive(Debug, Clone)]
pub struct PlainFile {
    pub contents: Vec<u8>,
    pub name: String,
    pub mime: String,
}

/// Apply `op` to every item in parallel, collecting one result per item.
pub fn run_batch<T, R, F>(items: Vec<T>, op: F) -> Vec<Result<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R> + Sync + Send,
{
    items.into_par_iter().map(op).collect()
}

pub fn encrypt_batch(
    files: Vec<PlainFile>,
    password: &[u8],
    algorithm: Algorithm,
) -> Vec<Result<EncryptedFile>> {
    tracing::debug!(count = files.len(), %algorithm, "encrypting batch");
    run_batch(files, |file| {
        container::encrypt_file(file.contents, &file.name, &file.mime, password, algorithm)
    })
}

pub fn decrypt_batch(containers: &[Vec<u8>], password: &[u8]) -> Vec<Result<DecryptedFile>> {
    tracing::debug!(count = containers.len(), "decrypting batch");
    run_batch(
        containers.iter().map(Vec::as_slice).collect(),
        |bytes: &[u8]| container::decrypt_file(bytes, password),
    )
}
