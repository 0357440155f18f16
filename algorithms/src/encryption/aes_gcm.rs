//! Provides implementations of the "aesXXX-gcm@openssh.com" encryption algorithms.
//!
//! These are AEAD modes as described in RFC 5647: the 4 byte packet length field stays
//! unencrypted on the wire and is authenticated as associated data, the rest of the
//! packet is encrypted and sealed with a 16 byte tag produced by the cipher itself, so
//! no separate MAC algorithm runs.
//!
//! The 12 byte nonce is the 4 byte fixed prefix from the derived IV followed by a 64 bit
//! invocation counter, which starts at the IV value and is incremented once per packet.

use definitions::algorithms::{CipherContext, EncryptionAlgorithm, IntegrityError};
use std::fmt;

/// The size of the authentication tag appended to each packet.
const TAG_SIZE: usize = 16;

macro_rules! impl_aes_gcm {
    ($name_str:expr, $name:ident, $alg:ty, $key_size:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` encryption algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Default)]
        pub struct $name {
            /// Contains the cipher and the current 12 byte nonce.
            ///
            /// This will be `None` as long as the keys aren't loaded.
            state: Option<($alg, [u8; 12])>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` encryption algorithm.")]
            pub fn new() -> Self {
                $name { state: None }
            }

            /// Increments the invocation counter part of the nonce.
            fn advance_nonce(nonce: &mut [u8; 12]) {
                let counter = u64::from_be_bytes(nonce[4..].try_into().unwrap());
                nonce[4..].copy_from_slice(&counter.wrapping_add(1).to_be_bytes());
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                // Hide implementation details and keys
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl EncryptionAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const CIPHER_BLOCK_SIZE: usize = 16;
            const KEY_SIZE: usize = $key_size;
            const IV_SIZE: usize = 12;
            const TAG_SIZE: Option<usize> = Some(TAG_SIZE);

            fn load_key(&mut self, iv: &[u8], key: &[u8]) {
                use aes_gcm::KeyInit as _;

                let nonce = <[u8; Self::IV_SIZE]>::try_from(iv).unwrap();
                let cipher = <$alg>::new_from_slice(key).expect("key has the correct size");

                let old_value = self.state.replace((cipher, nonce));

                debug_assert!(old_value.is_none());
            }

            fn unload_key(&mut self) {
                self.state.take();
            }

            fn encrypt_packet(&mut self, mut context: CipherContext) {
                use aes_gcm::{aead::generic_array::GenericArray, AeadInPlace as _};

                let (cipher, nonce) = self
                    .state
                    .as_mut()
                    .expect("algorithm was previously loaded");

                let data = context.all_data_mut();
                let payload_len = data.len() - 4 - TAG_SIZE;

                let (aad, rest) = data.split_at_mut(4);
                let (payload, tag_space) = rest.split_at_mut(payload_len);

                let tag = cipher
                    .encrypt_in_place_detached(GenericArray::from_slice(&nonce[..]), aad, payload)
                    .expect("in place encryption does not fail");
                tag_space.copy_from_slice(&tag);

                Self::advance_nonce(nonce);
            }

            fn decrypt_packet(
                &mut self,
                mut context: CipherContext,
            ) -> Result<usize, IntegrityError> {
                use aes_gcm::{aead::generic_array::GenericArray, AeadInPlace as _};

                let (cipher, nonce) = self
                    .state
                    .as_mut()
                    .expect("algorithm was previously loaded");

                let mut progress = 0;

                // The length field is transmitted unencrypted.
                if context.processed_part().len() < 4 {
                    if context.all_data().len() < 4 {
                        return Ok(0);
                    }

                    context.mark_processed(4);
                    progress += 4;
                }

                let packet_length =
                    u32::from_be_bytes(context.processed_part()[..4].try_into().unwrap()) as usize;

                // Decryption and verification happen in one step, once the whole
                // ciphertext and its tag have arrived.
                if context.all_data().len() < 4 + packet_length + TAG_SIZE {
                    return Ok(progress);
                }

                let data = context.all_data_mut();
                let (aad, rest) = data.split_at_mut(4);
                let (ciphertext, tag) = rest.split_at_mut(packet_length);

                cipher
                    .decrypt_in_place_detached(
                        GenericArray::from_slice(&nonce[..]),
                        aad,
                        ciphertext,
                        GenericArray::from_slice(&tag[..TAG_SIZE]),
                    )
                    .map_err(|_| IntegrityError::MacMismatch)?;

                Self::advance_nonce(nonce);

                context.mark_processed(packet_length);

                Ok(progress + packet_length)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new()
            }
        }
    };
}

#[cfg(feature = "aes128-gcm_at_openssh_com")]
impl_aes_gcm!(
    "aes128-gcm@openssh.com",
    Aes128Gcm,
    aes_gcm::Aes128Gcm,
    16
);

#[cfg(feature = "aes256-gcm_at_openssh_com")]
impl_aes_gcm!(
    "aes256-gcm@openssh.com",
    Aes256Gcm,
    aes_gcm::Aes256Gcm,
    32
);
