//! Provides an implementation of the "chacha20poly1305@openssh.com" encryption
//! algorithm.
//!
//! The algorithm uses 64 bytes of key material for two independently keyed ChaCha20
//! instances: the first 32 bytes key the payload instance, the second 32 bytes key the
//! instance that encrypts only the 4 byte packet length field. Both use the big endian
//! packet sequence number as their nonce.
//!
//! The payload instance additionally produces a one time Poly1305 key from its keystream
//! at block zero, the payload itself is encrypted starting at block one. The tag is
//! computed over the packet as it appears on the wire (encrypted length followed by
//! encrypted payload), so the MAC slot of the transport stays implicit.

use chacha20::{
    cipher::{KeyIvInit as _, StreamCipher as _},
    ChaCha20Legacy,
};
use definitions::algorithms::{CipherContext, EncryptionAlgorithm, IntegrityError};
use poly1305::{universal_hash::KeyInit as _, Poly1305};
use std::fmt;
use zeroize::Zeroizing;

static_assertions::const_assert_eq!(ChaCha20Poly1305::KEY_SIZE, 64);

/// The size of the authentication tag appended to each packet.
const TAG_SIZE: usize = 16;

/// Implements the `chacha20poly1305@openssh.com` encryption algorithm.
///
/// The existence of this struct is controlled by the `chacha20poly1305_at_openssh_com`
/// feature.
#[derive(Default)]
pub struct ChaCha20Poly1305 {
    /// The 64 bytes of key material.
    ///
    /// This will be `None` as long as the keys aren't loaded.
    key: Option<Zeroizing<[u8; 64]>>,
    /// The length field bytes as they appeared on the wire.
    ///
    /// The length is decrypted as soon as it arrives, but the tag is computed over the
    /// encrypted bytes, so they are stashed until the rest of the packet is available.
    encrypted_length: Option<[u8; 4]>,
}

impl ChaCha20Poly1305 {
    /// Creates a new `chacha20poly1305@openssh.com` encryption algorithm.
    pub fn new() -> ChaCha20Poly1305 {
        ChaCha20Poly1305 {
            key: None,
            encrypted_length: None,
        }
    }

    /// Returns the cipher instance used for the packet length field.
    fn length_cipher(&self, sequence_number: u32) -> ChaCha20Legacy {
        let key = self.key.as_ref().expect("algorithm was previously loaded");
        let length_key: [u8; 32] = key[32..].try_into().expect("key material is 64 bytes");
        let nonce: [u8; 8] = (sequence_number as u64).to_be_bytes();

        ChaCha20Legacy::new(&length_key.into(), &nonce.into())
    }

    /// Returns the cipher instance used for the packet payload.
    ///
    /// The returned instance is positioned at keystream block one; block zero has
    /// already been consumed for the returned one time Poly1305 key.
    fn payload_cipher(&self, sequence_number: u32) -> (ChaCha20Legacy, Zeroizing<[u8; 32]>) {
        let key = self.key.as_ref().expect("algorithm was previously loaded");
        let payload_key: [u8; 32] = key[..32].try_into().expect("key material is 64 bytes");
        let nonce: [u8; 8] = (sequence_number as u64).to_be_bytes();

        let mut cipher = ChaCha20Legacy::new(&payload_key.into(), &nonce.into());

        let mut block = Zeroizing::new([0u8; 64]);
        cipher.apply_keystream(&mut block[..]);

        let mut poly_key = Zeroizing::new([0u8; 32]);
        poly_key.copy_from_slice(&block[..32]);

        (cipher, poly_key)
    }
}

impl fmt::Debug for ChaCha20Poly1305 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Hide implementation details and keys
        f.debug_struct("ChaCha20Poly1305").finish_non_exhaustive()
    }
}

impl EncryptionAlgorithm for ChaCha20Poly1305 {
    const NAME: &'static str = "chacha20poly1305@openssh.com";
    const CIPHER_BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 64;
    const IV_SIZE: usize = 0;
    const TAG_SIZE: Option<usize> = Some(TAG_SIZE);

    fn load_key(&mut self, _iv: &[u8], key: &[u8]) {
        debug_assert_eq!(_iv.len(), Self::IV_SIZE);

        let mut key_material = Zeroizing::new([0u8; 64]);
        key_material.copy_from_slice(key);

        let old_value = self.key.replace(key_material);

        debug_assert!(old_value.is_none());
    }

    fn unload_key(&mut self) {
        // Zeroizing overwrites the key material on drop.
        self.key.take();
        self.encrypted_length.take();
    }

    fn encrypt_packet(&mut self, mut context: CipherContext) {
        let sequence_number = context.packet_sequence_number();
        let (mut payload_cipher, poly_key) = self.payload_cipher(sequence_number);
        let mut length_cipher = self.length_cipher(sequence_number);

        let data = context.all_data_mut();
        let payload_len = data.len() - 4 - TAG_SIZE;

        length_cipher.apply_keystream(&mut data[..4]);
        payload_cipher.apply_keystream(&mut data[4..4 + payload_len]);

        let tag = Poly1305::new(&(*poly_key).into()).compute_unpadded(&data[..4 + payload_len]);
        data[4 + payload_len..].copy_from_slice(&tag);
    }

    fn decrypt_packet(&mut self, mut context: CipherContext) -> Result<usize, IntegrityError> {
        let sequence_number = context.packet_sequence_number();
        let mut progress = 0;

        if context.processed_part().len() < 4 {
            if context.all_data().len() < 4 {
                return Ok(0);
            }

            let data = context.all_data_mut();
            let mut encrypted_length = [0u8; 4];
            encrypted_length.copy_from_slice(&data[..4]);
            self.encrypted_length = Some(encrypted_length);

            self.length_cipher(sequence_number)
                .apply_keystream(&mut data[..4]);

            context.mark_processed(4);
            progress += 4;
        }

        let packet_length =
            u32::from_be_bytes(context.processed_part()[..4].try_into().unwrap()) as usize;

        if context.all_data().len() < 4 + packet_length + TAG_SIZE {
            return Ok(progress);
        }

        let encrypted_length = self
            .encrypted_length
            .expect("the length was decrypted by this instance");

        let (mut payload_cipher, poly_key) = self.payload_cipher(sequence_number);

        // The tag covers the packet as it appeared on the wire.
        let data = context.all_data_mut();
        let mut tag_input = Vec::with_capacity(4 + packet_length);
        tag_input.extend_from_slice(&encrypted_length);
        tag_input.extend_from_slice(&data[4..4 + packet_length]);

        let expected_tag = Poly1305::new(&(*poly_key).into()).compute_unpadded(&tag_input);

        #[inline(never)]
        fn not_equal(a: &[u8], b: &[u8]) -> u8 {
            let mut res = 0;

            for i in 0..a.len() {
                res |= a[i] ^ b[i];
            }

            res
        }

        if not_equal(&expected_tag, &data[4 + packet_length..4 + packet_length + TAG_SIZE]) != 0 {
            return Err(IntegrityError::MacMismatch);
        }

        payload_cipher.apply_keystream(&mut data[4..4 + packet_length]);

        self.encrypted_length = None;
        context.mark_processed(packet_length);

        Ok(progress + packet_length)
    }
}

impl Clone for ChaCha20Poly1305 {
    fn clone(&self) -> Self {
        Self::new()
    }
}
