//! Container header encoding and decoding
//!
//! Decoding walks a fixed sequence of stages and never goes back. Each stage
//! checks that enough input remains before it slices anything, and a failed
//! check ends decoding with the error that belongs to that stage.

use crate::cipher::Iv;
use crate::error::{ErrorCategory, ErrorKind, Field, Result, SfeError};
use crate::format::{
    Algorithm, DEFAULT_MIME, FormatVersion, LENGTH_PREFIX_LEN, MAGIC_LEN, MIN_CIPHERTEXT_LEN,
    SALT_LEN,
};

/// Container metadata, everything in front of the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: FormatVersion,
    pub salt: [u8; SALT_LEN],
    /// Carries the algorithm; see [`Header::algorithm`].
    pub iv: Iv,
    pub name: String,
    pub mime: String,
}

impl Header {
    pub fn algorithm(&self) -> Algorithm {
        self.iv.algorithm()
    }

    /// Serialize the header. The ciphertext is appended by the caller.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(
            self.version,
            self.algorithm(),
            &self.salt,
            &self.iv,
            &self.name,
            &self.mime,
        )
    }
}

/// Stages of header decoding, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeStage {
    Magic,
    Algorithm,
    Salt,
    Iv,
    NameLength,
    Name,
    MimeLength,
    Mime,
    Ciphertext,
}

impl DecodeStage {
    /// The error reported when input runs out during this stage.
    fn truncated(self, needed: usize, available: usize) -> SfeError {
        let kind = match self {
            DecodeStage::Magic | DecodeStage::Algorithm | DecodeStage::Salt | DecodeStage::Iv => {
                ErrorKind::InvalidFormat
            }
            DecodeStage::NameLength | DecodeStage::Name => ErrorKind::CorruptField(Field::Name),
            DecodeStage::MimeLength | DecodeStage::Mime => ErrorKind::CorruptField(Field::Mime),
            DecodeStage::Ciphertext => ErrorKind::CiphertextTooSmall,
        };
        SfeError::with_kind(
            ErrorCategory::User,
            kind,
            format!(
                "input likely truncated while reading {}: need {} bytes, {} available",
                self.describe(),
                needed,
                available
            ),
        )
    }

    fn describe(self) -> &'static str {
        match self {
            DecodeStage::Magic => "magic marker",
            DecodeStage::Algorithm => "algorithm identifier",
            DecodeStage::Salt => "salt",
            DecodeStage::Iv => "iv",
            DecodeStage::NameLength => "name length",
            DecodeStage::Name => "name",
            DecodeStage::MimeLength => "mime type length",
            DecodeStage::Mime => "mime type",
            DecodeStage::Ciphertext => "ciphertext",
        }
    }
}

/// Forward-only view over untrusted input.
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume exactly `len` bytes, or fail with the error for `stage`
    /// without consuming anything.
    fn take(&mut self, stage: DecodeStage, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(stage.truncated(len, self.remaining()));
        }
        let field = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(field)
    }

    fn take_u16(&mut self, stage: DecodeStage) -> Result<usize> {
        let bytes = self.take(stage, LENGTH_PREFIX_LEN)?;
        Ok(usize::from(u16::from_be_bytes([bytes[0], bytes[1]])))
    }

    /// Length-prefixed UTF-8 string.
    fn take_text(
        &mut self,
        length_stage: DecodeStage,
        body_stage: DecodeStage,
        field: Field,
    ) -> Result<String> {
        let len = self.take_u16(length_stage)?;
        let bytes = self.take(body_stage, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            SfeError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::CorruptField(field),
                format!("{} is not valid UTF-8", field),
                e,
            )
        })
    }
}

/// Decode the header at the start of `input`
///
/// Returns the header and the offset at which the ciphertext starts. At
/// least `MIN_CIPHERTEXT_LEN` bytes are guaranteed to follow the header.
pub fn decode(input: &[u8]) -> Result<(Header, usize)> {
    let mut reader = FieldReader::new(input);

    let magic = reader.take(DecodeStage::Magic, MAGIC_LEN)?;
    let version = FormatVersion::from_magic(magic).ok_or_else(|| {
        SfeError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidFormat,
            "input unrecognized as sfe data",
        )
    })?;

    let algorithm = if version.has_algorithm_byte() {
        let id = reader.take(DecodeStage::Algorithm, 1)?[0];
        Algorithm::from_id(id).ok_or_else(|| {
            SfeError::with_kind(
                ErrorCategory::User,
                ErrorKind::UnsupportedAlgorithm,
                format!("unsupported algorithm identifier 0x{:02x}", id),
            )
        })?
    } else {
        // Legacy containers predate the algorithm byte and were always GCM.
        Algorithm::Authenticated
    };

    let salt: [u8; SALT_LEN] = reader
        .take(DecodeStage::Salt, SALT_LEN)?
        .try_into()
        .map_err(|_| internal("salt slice has wrong length"))?;

    let iv_bytes = reader.take(DecodeStage::Iv, algorithm.iv_len())?;
    let iv = Iv::from_slice(algorithm, iv_bytes)
        .ok_or_else(|| internal("iv slice has wrong length"))?;

    let name = reader.take_text(DecodeStage::NameLength, DecodeStage::Name, Field::Name)?;
    let mut mime = reader.take_text(DecodeStage::MimeLength, DecodeStage::Mime, Field::Mime)?;
    if mime.is_empty() {
        mime = DEFAULT_MIME.to_string();
    }

    let offset = reader.pos;
    if reader.remaining() < MIN_CIPHERTEXT_LEN {
        return Err(DecodeStage::Ciphertext.truncated(MIN_CIPHERTEXT_LEN, reader.remaining()));
    }

    tracing::debug!(
        %version,
        %algorithm,
        header_len = offset,
        ciphertext_len = reader.remaining(),
        "decoded header"
    );

    Ok((
        Header {
            version,
            salt,
            iv,
            name,
            mime,
        },
        offset,
    ))
}

/// Encode a header for `version`
///
/// An empty `mime` is recorded as `application/octet-stream`. Legacy
/// headers can only describe AES-256-GCM.
pub fn encode(
    version: FormatVersion,
    algorithm: Algorithm,
    salt: &[u8; SALT_LEN],
    iv: &Iv,
    name: &str,
    mime: &str,
) -> Result<Vec<u8>> {
    if iv.algorithm() != algorithm {
        return Err(internal("iv does not belong to the requested algorithm"));
    }
    if !version.has_algorithm_byte() && algorithm != Algorithm::Authenticated {
        return Err(SfeError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnsupportedAlgorithm,
            format!("{} containers can only hold {}", version, Algorithm::Authenticated),
        ));
    }

    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };
    let name_len = length_prefix(name, Field::Name)?;
    let mime_len = length_prefix(mime, Field::Mime)?;

    let fixed_len = MAGIC_LEN + 1 + SALT_LEN + iv.as_bytes().len() + 2 * LENGTH_PREFIX_LEN;
    let mut out = Vec::with_capacity(fixed_len + name.len() + mime.len());
    out.extend_from_slice(version.magic());
    if version.has_algorithm_byte() {
        out.push(algorithm.id());
    }
    out.extend_from_slice(salt);
    out.extend_from_slice(iv.as_bytes());
    out.extend_from_slice(&name_len.to_be_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&mime_len.to_be_bytes());
    out.extend_from_slice(mime.as_bytes());
    Ok(out)
}

fn length_prefix(value: &str, field: Field) -> Result<u16> {
    u16::try_from(value.len()).map_err(|e| {
        SfeError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::FieldTooLong(field),
            format!("{} is {} bytes; at most {} fit", field, value.len(), u16::MAX),
            e,
        )
    })
}

fn internal(msg: &str) -> SfeError {
    SfeError::with_kind(ErrorCategory::Internal, ErrorKind::InternalInvariant, msg)
}
