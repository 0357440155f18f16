//! Provides traits to define the algorithms used by the transport layer.

use std::fmt;

pub use compression::CompressionAlgorithm;
pub use encryption::{CipherContext, EncryptionAlgorithm};
pub use host_key::HostKeyAlgorithm;
pub use key_exchange::{
    KeyExchangeAlgorithm, KeyExchangeAlgorithmError, KeyExchangeData, KeyExchangeHashFunction,
    KeyExchangeResponse,
};
pub use mac::MacAlgorithm;

mod compression;
mod encryption;
mod host_key;
mod key_exchange;
mod mac;

/// Internal implementation details that are likely of little importance to library users.
///
/// They are made public, because they're used across crate borders.
pub mod internal {
    pub use super::compression::{CompressionAlgorithmEntry, DynCompressionAlgorithm};
    pub use super::encryption::{DynEncryptionAlgorithm, EncryptionAlgorithmEntry};
    pub use super::host_key::{DynHostKeyAlgorithm, HostKeyAlgorithmEntry};
    pub use super::key_exchange::{DynKeyExchangeAlgorithm, KeyExchangeAlgorithmEntry};
    pub use super::mac::{DynMacAlgorithm, MacAlgorithmEntry};

    pub use crate::CryptoRngCore;
}

/// Describes the possible categories for algorithms.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AlgorithmCategory {
    /// A key exchange algorithm.
    KeyExchange,
    /// A host key algorithm.
    HostKey,
    /// An encryption algorithm.
    Encryption,
    /// A MAC algorithm.
    Mac,
    /// A compression algorithm.
    Compression,
}

/// Describes the direction of an algorithm.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AlgorithmDirection {
    /// The algorithm is used for client to server communication.
    ClientToServer,
    /// The algorithm is used for server to client communication.
    ServerToClient,
}

/// Describes an algorithm role in a connection.
///
/// This is the combination of an algorithm category with its direction, if it has one.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct AlgorithmRole(pub AlgorithmCategory, pub Option<AlgorithmDirection>);

impl fmt::Display for AlgorithmRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.1 {
            Some(direction) => write!(f, "{:?} {:?}", self.0, direction),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// An error for situations where packet integrity could not be verified.
///
/// This covers both standalone MACs and the authentication tags of AEAD ciphers.
/// It is always fatal to the connection, because the cipher state cannot be
/// resynchronized after a corrupted or forged block.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum IntegrityError {
    /// The computed MAC or tag does not match the received one.
    #[error("computed MAC does not match the received MAC")]
    MacMismatch,
}
