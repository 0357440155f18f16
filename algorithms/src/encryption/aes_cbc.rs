//! Provides implementations of the "aesXXX-cbc" encryption algorithms.
//!
//! The block chaining is written directly over the block cipher primitive: each
//! plaintext block is XORed with the previous ciphertext block (the IV for the first
//! one) before encryption, and the mirror image on decryption. The chaining vector is
//! carried across packets, as the SSH packet stream forms one continuous CBC stream.

use definitions::algorithms::{CipherContext, EncryptionAlgorithm, IntegrityError};
use std::fmt;

macro_rules! impl_aes_cbc {
    ($name_str:expr, $name:ident, $alg:ty, $key_size:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` encryption algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Default)]
        pub struct $name {
            /// Contains the block cipher and the chaining vector.
            ///
            /// This will be `None` as long as the keys aren't loaded.
            state: Option<($alg, [u8; 16])>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` encryption algorithm.")]
            pub fn new() -> Self {
                $name { state: None }
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
                use aes::cipher::KeyInit as _;

                let key = <[u8; Self::KEY_SIZE]>::try_from(key).unwrap();
                let iv = <[u8; Self::IV_SIZE]>::try_from(iv).unwrap();

                let old_value = self.state.replace((<$alg>::new(&key.into()), iv));

                debug_assert!(old_value.is_none());
            }

            fn unload_key(&mut self) {
                use zeroize::Zeroize as _;

                if let Some((_, mut iv)) = self.state.take() {
                    iv.zeroize();
                }
            }

            fn encrypt_packet(&mut self, mut context: CipherContext) {
                use aes::cipher::{generic_array::GenericArray, BlockEncrypt as _};

                let (cipher, chain) = self
                    .state
                    .as_mut()
                    .expect("algorithm was previously loaded");

                for block in context.unprocessed_part().chunks_exact_mut(16) {
                    for (b, c) in block.iter_mut().zip(chain.iter()) {
                        *b ^= c;
                    }

                    cipher.encrypt_block(GenericArray::from_mut_slice(block));
                    chain.copy_from_slice(block);
                }
            }

            fn decrypt_packet(
                &mut self,
                mut context: CipherContext,
            ) -> Result<usize, IntegrityError> {
                use aes::cipher::{generic_array::GenericArray, BlockDecrypt as _};

                let (cipher, chain) = self
                    .state
                    .as_mut()
                    .expect("algorithm was previously loaded");

                let mut decrypted = 0;

                // Only whole blocks can make progress, the rest stays buffered.
                for block in context.unprocessed_part().chunks_exact_mut(16) {
                    let ciphertext = <[u8; 16]>::try_from(&block[..]).unwrap();

                    cipher.decrypt_block(GenericArray::from_mut_slice(block));
                    for (b, c) in block.iter_mut().zip(chain.iter()) {
                        *b ^= c;
                    }

                    *chain = ciphertext;
                    decrypted += 16;
                }

                Ok(decrypted)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new()
            }
        }
    };
}

#[cfg(feature = "aes128-cbc")]
impl_aes_cbc!("aes128-cbc", Aes128Cbc, aes::Aes128, 16);

#[cfg(feature = "aes256-cbc")]
impl_aes_cbc!("aes256-cbc", Aes256Cbc, aes::Aes256, 32);
