//! File encryption/decryption operations
//!
//! This module is the glue between the filesystem and the in-memory
//! container pipelines: it reads inputs, picks output names, and writes
//! results atomically.

use crate::batch;
use crate::container;
use crate::error::{ErrorCategory, ErrorKind, Result, SfeError};
use crate::format::{Algorithm, FormatVersion};
use crate::header;
use crate::mime;
use crate::passphrase::PassphraseReader;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Where the output for one input should go, and with what options.
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    pub algorithm: Algorithm,
    /// Record this MIME type instead of guessing from the extension.
    pub mime_override: Option<String>,
    /// Write outputs here instead of next to each input.
    pub output_dir: Option<PathBuf>,
}

/// Header fields of a container, as shown by `sfe inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub version: FormatVersion,
    pub algorithm: Algorithm,
    pub name: String,
    pub mime: String,
    pub header_len: usize,
    pub ciphertext_len: usize,
}

/// Encrypt a single file with a password
///
/// Writes `<name>.sfe` and returns its path. The output file is created
/// with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_path(
    input_path: &Path,
    options: &EncryptOptions,
    passphrase: &[u8],
) -> Result<PathBuf> {
    let contents = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let name = file_name_of(input_path)?;
    let mime = match &options.mime_override {
        Some(m) => m.clone(),
        None => mime::guess_from_name(&name).to_string(),
    };

    let sealed = container::encrypt_file(contents, &name, &mime, passphrase, options.algorithm)
        .map_err(|e| e.with_context(format!("failed to encrypt {}", input_path.display())))?;

    let output_path =
        output_dir_for(input_path, options.output_dir.as_deref()).join(&sealed.suggested_name);
    write_file_atomic(&output_path, &sealed.output_bytes, Existing::Replace)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    tracing::info!(input = %input_path.display(), output = %output_path.display(), "encrypted");
    Ok(output_path)
}

/// Decrypt a single container with a password
///
/// Writes the plaintext under the filename recorded in the container,
/// reduced to its final path component, and returns that path. The name
/// comes from untrusted input, so an existing file is never replaced: the
/// call fails with a user error instead.
pub fn decrypt_path(
    input_path: &Path,
    output_dir: Option<&Path>,
    passphrase: &[u8],
) -> Result<PathBuf> {
    let bytes = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let opened = container::decrypt_file(&bytes, passphrase)
        .map_err(|e| e.with_context(format!("failed to decrypt {}", input_path.display())))?;

    let output_path =
        output_dir_for(input_path, output_dir).join(safe_output_name(&opened.suggested_name));
    write_file_atomic(&output_path, &opened.output_bytes, Existing::Keep)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    tracing::info!(
        input = %input_path.display(),
        output = %output_path.display(),
        mime = %opened.mime_type,
        "decrypted"
    );
    Ok(output_path)
}

/// Encrypt several files in parallel, asking for the password once
///
/// The outer error means no file was attempted; inner results are per file.
pub fn encrypt_files(
    inputs: &[PathBuf],
    options: &EncryptOptions,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<Vec<Result<PathBuf>>> {
    let passphrase = passphrase_reader.read_passphrase()?;
    Ok(batch::run_batch(
        inputs.iter().map(PathBuf::as_path).collect(),
        |input: &Path| encrypt_path(input, options, &passphrase),
    ))
}

/// Decrypt several containers in parallel, asking for the password once
pub fn decrypt_files(
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<Vec<Result<PathBuf>>> {
    let passphrase = passphrase_reader.read_passphrase()?;
    Ok(batch::run_batch(
        inputs.iter().map(PathBuf::as_path).collect(),
        |input: &Path| decrypt_path(input, output_dir, &passphrase),
    ))
}

/// Read a container's header without a password.
pub fn inspect_path(input_path: &Path) -> Result<Inspection> {
    let bytes = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let (header, offset) = header::decode(&bytes).map_err(|e| {
        e.with_context(format!("failed to read header of {}", input_path.display()))
    })?;
    Ok(Inspection {
        version: header.version,
        algorithm: header.algorithm(),
        name: header.name,
        mime: header.mime,
        header_len: offset,
        ciphertext_len: bytes.len() - offset,
    })
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            SfeError::with_kind(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("{} does not name a file", path.display()),
            )
        })
}

fn output_dir_for(input_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => match input_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// The recorded name comes from untrusted input; never let it escape the output directory.
fn safe_output_name(recorded: &str) -> PathBuf {
    match Path::new(recorded).file_name() {
        Some(name) => PathBuf::from(name),
        None => PathBuf::from("decrypted"),
    }
}

/// What to do when the output path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existing {
    Replace,
    Keep,
}

/// Write `contents` to `path` via a tempfile in the same directory
///
/// Flushed, fsynced and renamed into place, so `path` either keeps its old
/// contents or gets the complete new ones. Mode 0o600 on Unix. With
/// `Existing::Keep` the final link is exclusive, so of several writers
/// racing for one path exactly one succeeds.
fn write_file_atomic(path: &Path, contents: &[u8], existing: Existing) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        SfeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        SfeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        SfeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        SfeError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                SfeError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    let persisted = match existing {
        Existing::Replace => temp_file.persist(path),
        Existing::Keep => temp_file.persist_noclobber(path),
    };
    persisted.map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            SfeError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("refusing to overwrite existing file {}", path.display()),
                e.error,
            )
        } else {
            SfeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to rename to target file {}", path.display()),
                e.error,
            )
        }
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> SfeError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    SfeError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
