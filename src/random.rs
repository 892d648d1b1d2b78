//! Sources of salt and IV bytes

use crate::error::{ErrorCategory, ErrorKind, Result, SfeError};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Trait for filling buffers with random bytes
///
/// The encrypt pipeline takes one of these rather than reaching for a
/// global generator, so tests can pin salt and IV.
pub trait SecureRandomSource {
    fn fill(&mut self, buffer: &mut [u8]) -> Result<()>;
}

/// The operating system's CSPRNG. Use this for everything real.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandomSource for OsRandom {
    fn fill(&mut self, buffer: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buffer).map_err(|e| {
            SfeError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::RandomSource,
                format!("failed to obtain random bytes: {}", e),
                e,
            )
        })
    }
}

/// Deterministic generator seeded from a fixed value
///
/// This is ONLY for testing purposes to produce reproducible containers.
/// NEVER use this in production - always use `OsRandom`.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SecureRandomSource for SeededRandom {
    fn fill(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.rng.fill_bytes(buffer);
        Ok(())
    }
}
