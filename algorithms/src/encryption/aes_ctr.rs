//! Provides implementations of the "aesXXX-ctr" encryption algorithms.
//!
//! The counter block bookkeeping (big-endian counter equal to one cipher block,
//! incremented after every block, partial final blocks handled from the same keystream)
//! is delegated to the `ctr` crate.

use definitions::algorithms::{CipherContext, EncryptionAlgorithm, IntegrityError};
use std::fmt;

macro_rules! impl_aes_ctr {
    ($name_str:expr, $name:ident, $alg:ty, $key_size:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` encryption algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Default)]
        pub struct $name {
            /// Contains the algorithm implementation and the keys.
            ///
            /// This will be `None` as long as the keys aren't loaded.
            algorithm: Option<$alg>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` encryption algorithm.")]
            pub fn new() -> Self {
                $name { algorithm: None }
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
            const IV_SIZE: usize = 16;

            fn load_key(&mut self, iv: &[u8], key: &[u8]) {
                let key = <[u8; Self::KEY_SIZE]>::try_from(key).unwrap();
                let iv = <[u8; Self::IV_SIZE]>::try_from(iv).unwrap();

                use aes::cipher::KeyIvInit as _;
                let old_value = self.algorithm.replace(<$alg>::new(&key.into(), &iv.into()));

                debug_assert!(old_value.is_none());
            }

            fn unload_key(&mut self) {
                self.algorithm.take();
            }

            fn encrypt_packet(&mut self, mut context: CipherContext) {
                let alg = self
                    .algorithm
                    .as_mut()
                    .expect("algorithm was previously loaded");

                use aes::cipher::StreamCipher as _;
                alg.apply_keystream(context.unprocessed_part());
            }

            fn decrypt_packet(
                &mut self,
                mut context: CipherContext,
            ) -> Result<usize, IntegrityError> {
                let alg = self
                    .algorithm
                    .as_mut()
                    .expect("algorithm was previously loaded");

                use aes::cipher::StreamCipher as _;
                alg.apply_keystream(context.unprocessed_part());

                Ok(context.unprocessed_part().len())
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new()
            }
        }
    };
}

#[cfg(feature = "aes128-ctr")]
impl_aes_ctr!("aes128-ctr", Aes128Ctr, ctr::Ctr128BE::<aes::Aes128>, 16);

#[cfg(feature = "aes192-ctr")]
impl_aes_ctr!("aes192-ctr", Aes192Ctr, ctr::Ctr128BE::<aes::Aes192>, 24);

#[cfg(feature = "aes256-ctr")]
impl_aes_ctr!("aes256-ctr", Aes256Ctr, ctr::Ctr128BE::<aes::Aes256>, 32);

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs a full packet through an encrypting and an independently keyed decrypting
    /// instance and checks that the plaintext survives the round trip.
    #[test]
    fn round_trip() {
        let key = [0x42; 16];
        let iv = [0x24; 16];

        let mut encryptor = Aes128Ctr::new();
        let mut decryptor = Aes128Ctr::new();
        encryptor.load_key(&iv, &key);
        decryptor.load_key(&iv, &key);

        let plaintext: Vec<u8> = (0..48).collect();
        let mut data = plaintext.clone();

        encryptor.encrypt_packet(CipherContext::new(0, &mut data, 0));
        assert_ne!(&data, &plaintext);

        let progress = decryptor
            .decrypt_packet(CipherContext::new(0, &mut data, 0))
            .unwrap();
        assert_eq!(progress, 48);
        assert_eq!(&data, &plaintext);
    }

    /// The keystream must continue correctly across chunked decryption calls.
    #[test]
    fn chunked_decryption() {
        let key = [0x11; 32];
        let iv = [0x99; 16];

        let mut encryptor = Aes256Ctr::new();
        let mut decryptor = Aes256Ctr::new();
        encryptor.load_key(&iv, &key);
        decryptor.load_key(&iv, &key);

        let plaintext: Vec<u8> = (0..64).map(|i| i * 3).collect();
        let mut data = plaintext.clone();

        encryptor.encrypt_packet(CipherContext::new(0, &mut data, 0));

        let first = decryptor
            .decrypt_packet(CipherContext::new(0, &mut data[..16], 0))
            .unwrap();
        assert_eq!(first, 16);

        let second = decryptor
            .decrypt_packet(CipherContext::new(0, &mut data, 16))
            .unwrap();
        assert_eq!(second, 48);

        assert_eq!(&data, &plaintext);
    }
}
