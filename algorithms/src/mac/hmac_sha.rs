//! Provides implementations of the "hmac-shaX(-XXX)" MAC algorithms.
//!
//! The `-96` variant truncates the computed digest to its leftmost 96 bits, as
//! described in RFC 2104 section 5; key size and computation are unchanged.

use definitions::algorithms::MacAlgorithm;
use hmac::{Hmac, Mac as _};
use zeroize::Zeroizing;

macro_rules! impl_hmac_sha {
    ($name_str:expr, $name:ident, $alg:ty, $key_size:expr, $mac_size:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` MAC algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Debug, Default)]
        pub struct $name {
            /// The key to use for the MAC computations.
            key: Option<Zeroizing<Vec<u8>>>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` MAC algorithm.")]
            pub fn new() -> $name {
                $name { key: None }
            }

            /// Performs the actual MAC calculation.
            fn calculate(&self, data: &[u8], sequence_number: u32) -> Zeroizing<Vec<u8>> {
                let key = self.key.as_ref().expect("`load_key` was called before");

                let mut alg =
                    Hmac::<$alg>::new_from_slice(key).expect("HMAC can take any key size");

                alg.update(&sequence_number.to_be_bytes());
                alg.update(data);

                Zeroizing::new(alg.finalize().into_bytes().to_vec())
            }
        }

        impl MacAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const MAC_SIZE: usize = $mac_size;
            const KEY_SIZE: usize = $key_size;

            fn load_key(&mut self, key: &[u8]) {
                debug_assert_eq!(key.len(), Self::KEY_SIZE);

                self.key.replace(Zeroizing::new(key.to_vec()));
            }

            fn unload_key(&mut self) {
                // Zeroizing overwrites the key material on drop.
                self.key.take();
            }

            fn compute(&mut self, data: &[u8], sequence_number: u32, result: &mut [u8]) {
                debug_assert_eq!(result.len(), Self::MAC_SIZE);

                result.copy_from_slice(&self.calculate(data, sequence_number)[..Self::MAC_SIZE]);
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new()
            }
        }
    };
}

#[cfg(feature = "hmac-sha1")]
impl_hmac_sha!("hmac-sha1", HmacSha1, sha1::Sha1, 20, 20);

#[cfg(feature = "hmac-sha1-96")]
impl_hmac_sha!("hmac-sha1-96", HmacSha196, sha1::Sha1, 20, 12);

#[cfg(feature = "hmac-sha2-256")]
impl_hmac_sha!("hmac-sha2-256", HmacSha2256, sha2::Sha256, 32, 32);

#[cfg(feature = "hmac-sha2-512")]
impl_hmac_sha!("hmac-sha2-512", HmacSha2512, sha2::Sha512, 64, 64);

#[cfg(test)]
mod tests {
    use super::*;
    use definitions::algorithms::IntegrityError;

    #[test]
    fn compute_and_verify() {
        let mut alg = HmacSha2256::new();
        alg.load_key(&[0x0b; 32]);

        let mut mac = [0u8; 32];
        alg.compute(b"some authenticated data", 17, &mut mac);

        assert!(alg.verify(b"some authenticated data", 17, &mac).is_ok());
        assert_eq!(
            alg.verify(b"some authenticated datA", 17, &mac),
            Err(IntegrityError::MacMismatch)
        );
        assert_eq!(
            alg.verify(b"some authenticated data", 18, &mac),
            Err(IntegrityError::MacMismatch)
        );
    }

    #[test]
    fn truncated_variant_matches_full_prefix() {
        let key = [0x42; 20];

        let mut full = HmacSha1::new();
        let mut truncated = HmacSha196::new();
        full.load_key(&key);
        truncated.load_key(&key);

        let mut full_mac = [0u8; 20];
        let mut truncated_mac = [0u8; 12];
        full.compute(b"data", 0, &mut full_mac);
        truncated.compute(b"data", 0, &mut truncated_mac);

        assert_eq!(&full_mac[..12], &truncated_mac[..]);
        assert!(truncated.verify(b"data", 0, &truncated_mac).is_ok());
    }

    #[test]
    fn same_input_same_mac() {
        let mut first = HmacSha2512::new();
        let mut second = HmacSha2512::new();
        first.load_key(&[0x17; 64]);
        second.load_key(&[0x17; 64]);

        let mut first_mac = [0u8; 64];
        let mut second_mac = [0u8; 64];
        first.compute(b"identical input", 3, &mut first_mac);
        second.compute(b"identical input", 3, &mut second_mac);

        assert_eq!(&first_mac[..], &second_mac[..]);
    }
}
