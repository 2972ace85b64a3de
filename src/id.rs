//! Wallet identifiers drawn from the operating system CSPRNG.

use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::model::WalletId;

/// Symbols a generated id is made of.
pub const ALPHABET: &[u8; 63] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are discarded so every symbol is equally likely.
const ACCEPT_BELOW: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// The secure random source could not be read.
#[derive(Debug, Error)]
#[error("secure random source unavailable: {0}")]
pub struct EntropyError(String);

impl From<rand::Error> for EntropyError {
    fn from(e: rand::Error) -> Self {
        EntropyError(e.to_string())
    }
}

/// Fails when the OS random source cannot produce a single byte.
pub fn ensure_entropy() -> Result<(), EntropyError> {
    let mut probe = [0u8; 1];
    OsRng.try_fill_bytes(&mut probe)?;
    Ok(())
}

/// Source of fresh wallet ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> Result<WalletId, EntropyError>;
}

/// Uniformly random ids of a fixed length over [`ALPHABET`].
#[derive(Debug, Clone)]
pub struct RandomIds {
    length: usize,
}

impl RandomIds {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl IdSource for RandomIds {
    fn next_id(&self) -> Result<WalletId, EntropyError> {
        let mut id = String::with_capacity(self.length);
        let mut buf = [0u8; 32];

        while id.len() < self.length {
            OsRng.try_fill_bytes(&mut buf)?;
            for byte in buf.iter().copied().filter(|b| *b < ACCEPT_BELOW) {
                if id.len() == self.length {
                    break;
                }
                id.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
            }
        }

        Ok(WalletId::from(id))
    }
}
