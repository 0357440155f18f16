//! Defines the `EncryptionAlgorithm` trait.

use super::IntegrityError;
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

mod context;

// TODO: Remove this allow once this issue is fixed: https://github.com/rust-lang/rust/issues/64762
#[allow(unreachable_pub)]
pub use context::CipherContext;

/// Describes an encryption algorithm.
///
/// Implementations fall into two families:
///
/// - plain ciphers (`TAG_SIZE` is `None`), which only transform the packet data and rely
///   on a separate MAC algorithm for integrity
/// - AEAD ciphers (`TAG_SIZE` is `Some(_)`), which leave the packet length field
///   unencrypted, authenticate it as associated data and append their own tag, making
///   the MAC slot implicit
pub trait EncryptionAlgorithm {
    /// The name of the encryption algorithm.
    const NAME: &'static str;

    /// The size of the smallest amount of data that can be encrypted.
    const CIPHER_BLOCK_SIZE: usize;

    /// The size, in bytes, of the key used by this algorithm.
    const KEY_SIZE: usize;

    /// The size, in bytes, of the iv used by this algorithm.
    const IV_SIZE: usize;

    /// The size, in bytes, of the authentication tag, if the cipher computes one itself.
    const TAG_SIZE: Option<usize> = None;

    /// Loads a new key to use for the algorithm.
    ///
    /// After the first call to `load_key`, the transport layer implementation guarantees
    /// that `unload_key` is called, before `load_key` is called again.
    ///
    /// # Panics
    /// The function may panic if
    /// - `key.len() != Self::KEY_SIZE`
    /// - `iv.len() != Self::IV_SIZE`
    /// - there was a previous call to `self.load_key`, but no call to `self.unload_key`
    ///   after it
    fn load_key(&mut self, iv: &[u8], key: &[u8]);

    /// Unloads the key that was previously loaded.
    ///
    /// This should overwrite the memory where the key was stored with a predictable value
    /// (such as zero) to avoid the key being readable for longer than necessary.
    ///
    /// # Panics
    /// The function may panic if `load_key` has not been called since the last call to
    /// `unload_key`.
    fn unload_key(&mut self);

    /// Encrypts a packet in one pass.
    ///
    /// The context contains the whole packet. For AEAD ciphers it additionally contains
    /// `Self::TAG_SIZE` zeroed bytes at the end, which the implementation must replace
    /// with the authentication tag.
    ///
    /// # Panics
    /// The function may panic if `load_key` has not been called previously.
    fn encrypt_packet(&mut self, context: CipherContext);

    /// Decrypts a packet as far as possible.
    ///
    /// The returned `usize` is the number of additional bytes that have been decrypted.
    /// A correct implementation must make as much progress in one call as possible, so
    /// that the re-entrant decoding of partially received packets can advance.
    ///
    /// AEAD ciphers must count the unencrypted length field as "decrypted" once at least
    /// four bytes are available, must only decrypt the remainder once the whole packet
    /// including its tag is present and must verify the tag in that same step.
    ///
    /// # Panics
    /// The function may panic if `load_key` has not been called previously.
    fn decrypt_packet(&mut self, context: CipherContext) -> Result<usize, IntegrityError>;
}

/// A runtime description of an encryption algorithm.
///
/// This allows representing different encryption algorithms with the same type.
///
/// It is mostly intended for internal use.
pub struct EncryptionAlgorithmEntry {
    /// The name of the encryption algorithm.
    pub name: &'static str,
    /// The size of the smallest amount of data that can be encrypted.
    pub cipher_block_size: usize,
    /// The size, in bytes, of the key used by this algorithm.
    pub key_size: usize,
    /// The size, in bytes, of the iv used by this algorithm.
    pub iv_size: usize,
    /// The size of the authentication tag, in bytes, if the cipher computes one itself.
    pub tag_size: Option<usize>,
    /// The algorithm itself.
    #[doc(hidden)]
    algorithm: Box<dyn DynEncryptionAlgorithm>,
}

impl fmt::Debug for EncryptionAlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EncryptionAlgorithmEntry")
            .field("name", &self.name)
            .field("cipher_block_size", &self.cipher_block_size)
            .field("key_size", &self.key_size)
            .field("iv_size", &self.iv_size)
            .field("tag_size", &self.tag_size)
            .finish_non_exhaustive()
    }
}

impl EncryptionAlgorithmEntry {
    /// Returns `true` if the encryption algorithm authenticates packets as part of the
    /// encryption, making a separate MAC algorithm unnecessary.
    pub fn computes_tag(&self) -> bool {
        self.tag_size.is_some()
    }
}

impl<T> From<T> for EncryptionAlgorithmEntry
where
    T: EncryptionAlgorithm + 'static,
{
    fn from(alg: T) -> Self {
        EncryptionAlgorithmEntry {
            name: <T as EncryptionAlgorithm>::NAME,
            cipher_block_size: <T as EncryptionAlgorithm>::CIPHER_BLOCK_SIZE,
            key_size: <T as EncryptionAlgorithm>::KEY_SIZE,
            iv_size: <T as EncryptionAlgorithm>::IV_SIZE,
            tag_size: <T as EncryptionAlgorithm>::TAG_SIZE,
            algorithm: Box::new(alg),
        }
    }
}

impl Deref for EncryptionAlgorithmEntry {
    type Target = dyn DynEncryptionAlgorithm;

    fn deref(&self) -> &Self::Target {
        &*self.algorithm
    }
}

impl DerefMut for EncryptionAlgorithmEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.algorithm
    }
}

/// A trait object friendly version of the [`EncryptionAlgorithm`] trait.
///
/// **DO NOT IMPLEMENT THIS TRAIT MANUALLY.**
/// Implement the [`EncryptionAlgorithm`] trait instead.
///
/// This trait is mainly intended for internal use and automatically implemented for all
/// types implementing the [`EncryptionAlgorithm`] trait.
pub trait DynEncryptionAlgorithm {
    /// See [`EncryptionAlgorithm::load_key`].
    fn load_key(&mut self, iv: &[u8], key: &[u8]);

    /// See [`EncryptionAlgorithm::unload_key`].
    fn unload_key(&mut self);

    /// See [`EncryptionAlgorithm::encrypt_packet`].
    fn encrypt_packet(&mut self, context: CipherContext);

    /// See [`EncryptionAlgorithm::decrypt_packet`].
    fn decrypt_packet(&mut self, context: CipherContext) -> Result<usize, IntegrityError>;
}

impl<T: EncryptionAlgorithm> DynEncryptionAlgorithm for T {
    fn load_key(&mut self, iv: &[u8], key: &[u8]) {
        <Self as EncryptionAlgorithm>::load_key(self, iv, key)
    }

    fn unload_key(&mut self) {
        <Self as EncryptionAlgorithm>::unload_key(self)
    }

    fn encrypt_packet(&mut self, context: CipherContext) {
        <Self as EncryptionAlgorithm>::encrypt_packet(self, context)
    }

    fn decrypt_packet(&mut self, context: CipherContext) -> Result<usize, IntegrityError> {
        <Self as EncryptionAlgorithm>::decrypt_packet(self, context)
    }
}
