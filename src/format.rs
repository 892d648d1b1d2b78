//! Container format constants and the closed sets of versions and algorithms.
//!
//! Legacy layout:
//! - magic "SFE1": 4 bytes
//! - salt: 16 bytes
//! - iv: 12 bytes (always AES-256-GCM)
//! - name length: 2 bytes (big-endian u16), name: UTF-8
//! - mime length: 2 bytes (big-endian u16), mime: UTF-8
//! - ciphertext: rest of input
//!
//! Current layout inserts a one byte algorithm identifier after the magic
//! "SFE2", and the IV length follows the algorithm.

use std::fmt;
use std::str::FromStr;

/// Length of the magic marker that opens every container.
pub const MAGIC_LEN: usize = 4;

/// Length of the PBKDF2 salt.
pub const SALT_LEN: usize = 16;

/// Length of the big-endian u16 prefix in front of name and MIME.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// AES-GCM nonce length.
pub const GCM_IV_LEN: usize = 12;

/// AES-CBC IV length, one block.
pub const CBC_IV_LEN: usize = 16;

/// Minimum ciphertext length: one GCM tag, or one CBC block.
pub const MIN_CIPHERTEXT_LEN: usize = 16;

/// MIME type recorded when the caller supplies none.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Suffix appended to the original name to suggest an output filename.
pub const ENCRYPTED_SUFFIX: &str = ".sfe";

/// Smallest well-formed header of any version: legacy, empty name and MIME.
pub const MIN_HEADER_LEN: usize =
    MAGIC_LEN + SALT_LEN + Algorithm::Authenticated.iv_len() + 2 * LENGTH_PREFIX_LEN;

/// On-disk header layout, selected by the magic marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// `SFE1`: no algorithm byte, implicitly AES-256-GCM with a 12-byte IV.
    Legacy,
    /// `SFE2`: explicit algorithm byte after the magic.
    Current,
}

impl FormatVersion {
    pub const fn magic(self) -> &'static [u8; MAGIC_LEN] {
        match self {
            FormatVersion::Legacy => b"SFE1",
            FormatVersion::Current => b"SFE2",
        }
    }

    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        [FormatVersion::Legacy, FormatVersion::Current]
            .into_iter()
            .find(|v| v.magic().as_slice() == magic)
    }

    /// Whether the layout carries an explicit algorithm identifier.
    pub const fn has_algorithm_byte(self) -> bool {
        matches!(self, FormatVersion::Current)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::Legacy => f.write_str("SFE1 (legacy)"),
            FormatVersion::Current => f.write_str("SFE2"),
        }
    }
}

/// Symmetric cipher used for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// AES-256-GCM. Confidentiality and integrity in one step.
    #[default]
    Authenticated,
    /// AES-256-CBC with PKCS#7 padding. Confidentiality only: a successful
    /// decryption does not prove the ciphertext was left untouched.
    Unauthenticated,
}

impl Algorithm {
    pub const fn id(self) -> u8 {
        match self {
            Algorithm::Authenticated => 0x01,
            Algorithm::Unauthenticated => 0x02,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Algorithm::Authenticated),
            0x02 => Some(Algorithm::Unauthenticated),
            _ => None,
        }
    }

    pub const fn iv_len(self) -> usize {
        match self {
            Algorithm::Authenticated => GCM_IV_LEN,
            Algorithm::Unauthenticated => CBC_IV_LEN,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Algorithm::Authenticated => "AES-256-GCM",
            Algorithm::Unauthenticated => "AES-256-CBC",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "authenticated" | "aes-256-gcm" | "gcm" => Ok(Algorithm::Authenticated),
            "unauthenticated" | "aes-256-cbc" | "cbc" => Ok(Algorithm::Unauthenticated),
            other => Err(format!(
                "unknown algorithm '{other}' (expected 'authenticated' or 'unauthenticated')"
            )),
        }
    }
}
