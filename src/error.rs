use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Length-prefixed header fields, used to say which one was corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Mime,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Name => f.write_str("name"),
            Field::Mime => f.write_str("mime type"),
        }
    }
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input is too short to hold a header, carries an unknown magic marker,
    /// or ends inside a fixed-size header field.
    InvalidFormat,
    /// The algorithm identifier byte is not one we know.
    UnsupportedAlgorithm,
    /// A length-prefixed field is truncated, overruns the buffer, or is not UTF-8.
    CorruptField(Field),
    /// A field is too long to be encoded behind a 16-bit length prefix.
    FieldTooLong(Field),
    /// Fewer bytes follow the header than one authentication tag.
    CiphertextTooSmall,
    /// Wrong password, tampered or corrupt ciphertext, or bad padding.
    /// Deliberately never says which.
    DecryptionFailed,
    /// The secure random source could not produce bytes.
    RandomSource,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Unexpected state reached within sfe logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct SfeError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl SfeError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The merged failure reported for every unsuccessful cipher open.
    pub(crate) fn decryption_failed() -> Self {
        Self::with_kind(
            ErrorCategory::User,
            ErrorKind::DecryptionFailed,
            "corrupt input, tampered-with data, or bad password",
        )
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SfeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind_and_category() {
        let err = SfeError::with_kind(
            ErrorCategory::User,
            ErrorKind::CorruptField(Field::Mime),
            "mime length exceeds input",
        )
        .with_context("failed to decode header");

        assert_eq!(err.kind, Some(ErrorKind::CorruptField(Field::Mime)));
        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.message(), "failed to decode header");
        let source = StdError::source(&err).expect("context keeps the original error");
        assert_eq!(source.to_string(), "mime length exceeds input");
    }

    #[test]
    fn test_decryption_failed_message_is_undistinguished() {
        let err = SfeError::decryption_failed();
        assert_eq!(err.kind, Some(ErrorKind::DecryptionFailed));
        assert!(err.to_string().contains("bad password"));
        assert!(err.to_string().contains("tampered"));
    }

    #[test]
    fn test_field_display() {
        assert_eq!(Field::Name.to_string(), "name");
        assert_eq!(Field::Mime.to_string(), "mime type");
    }
}
