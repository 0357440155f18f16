//! Implements the "curve25519-sha256" key exchange algorithm.

use definitions::{
    algorithms::{
        internal::HostKeyAlgorithmEntry, KeyExchangeAlgorithm, KeyExchangeAlgorithmError,
        KeyExchangeData, KeyExchangeHashFunction, KeyExchangeResponse,
    },
    consts::{SSH_MSG_KEX_ECDH_INIT, SSH_MSG_KEX_ECDH_REPLY},
    parse, write, ParseError, ParsedValue,
};
use num_bigint::BigInt;
use rand::{CryptoRng, RngCore};
use sha2::{Digest as _, Sha256};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey};

macro_rules! impl_curve25519_sha256 {
    ($name_str:expr, $name:ident) => {
        #[doc = concat!("Implements the `", $name_str, "` key exchange algorithm.")]
        #[doc = ""]
        #[doc = "The existence of this struct is controlled by the `curve25519-sha256` feature."]
        #[derive(Default)]
        pub struct $name {
            /// The ephemeral secret used for the current key exchange.
            secret: Option<EphemeralSecret>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` key exchange algorithm.")]
            pub fn new() -> $name {
                $name { secret: None }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                // Hide the ephemeral secret
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl KeyExchangeAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const REQUIRES_ENCRYPTION_CAPABLE_HOST_KEY_ALGORITHM: bool = false;
            const REQUIRES_SIGNATURE_CAPABLE_HOST_KEY_ALGORITHM: bool = true;
            const HASH_FUNCTION: KeyExchangeHashFunction =
                |message| Sha256::digest(message).to_vec();

            fn start<Rng: RngCore + CryptoRng + ?Sized>(
                &mut self,
                _key_exchange_data: &KeyExchangeData,
                rng: &mut Rng,
            ) -> Option<Vec<u8>> {
                let secret = EphemeralSecret::random_from_rng(&mut *rng);
                let public = PublicKey::from(&secret);

                let mut packet = Vec::new();
                write::byte(SSH_MSG_KEX_ECDH_INIT, &mut packet).expect("vec writes don't fail");
                write::string(public.as_bytes(), &mut packet).expect("vec writes don't fail");

                self.secret.replace(secret);

                Some(packet)
            }

            fn respond<Rng: RngCore + CryptoRng + ?Sized>(
                &mut self,
                message: &[u8],
                key_exchange_data: &KeyExchangeData,
                host_key_algorithm: &mut HostKeyAlgorithmEntry,
                _rng: &mut Rng,
            ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError> {
                let (server_host_key, server_public_key, signature) = parse_ecdh_reply(message)
                    .map_err(|_| KeyExchangeAlgorithmError::InvalidFormat)?;

                let server_public_key: [u8; 32] = server_public_key
                    .try_into()
                    .map_err(|_| KeyExchangeAlgorithmError::InvalidPublicValue)?;
                let server_public = PublicKey::from(server_public_key);

                let own_secret = self
                    .secret
                    .take()
                    .expect("`start` should be called before `respond`");
                let own_public = PublicKey::from(&own_secret);

                let shared_secret = own_secret.diffie_hellman(&server_public);
                let shared_secret =
                    BigInt::from_bytes_be(num_bigint::Sign::Plus, shared_secret.as_bytes());

                let mut hash_input = Vec::new();
                write::string(key_exchange_data.client_identification, &mut hash_input)
                    .expect("vec writes don't fail");
                write::string(key_exchange_data.server_identification, &mut hash_input)
                    .expect("vec writes don't fail");
                write::string(key_exchange_data.client_kexinit, &mut hash_input)
                    .expect("vec writes don't fail");
                write::string(key_exchange_data.server_kexinit, &mut hash_input)
                    .expect("vec writes don't fail");
                write::string(server_host_key, &mut hash_input).expect("vec writes don't fail");
                write::string(own_public.as_bytes(), &mut hash_input)
                    .expect("vec writes don't fail");
                write::string(&server_public_key, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&shared_secret, &mut hash_input).expect("vec writes don't fail");

                let exchange_hash = Sha256::digest(&hash_input).to_vec();

                if !host_key_algorithm.verify(&exchange_hash, signature, server_host_key) {
                    return Err(KeyExchangeAlgorithmError::InvalidSignature);
                }

                Ok(KeyExchangeResponse::Finished {
                    host_key: server_host_key.to_vec(),
                    shared_secret,
                    exchange_hash,
                })
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self::new()
            }
        }
    };
}

impl_curve25519_sha256!("curve25519-sha256", Curve25519Sha256);
impl_curve25519_sha256!("curve25519-sha256@libssh.org", Curve25519Sha256Libssh);

/// Parses a `SSH_MSG_KEX_ECDH_REPLY` packet into (host key, public key, signature).
fn parse_ecdh_reply(input: &[u8]) -> Result<(&[u8], &[u8], &[u8]), ParseError> {
    let ParsedValue {
        value: message_number,
        rest_input,
    } = parse::byte(input)?;

    if message_number != SSH_MSG_KEX_ECDH_REPLY {
        return Err(ParseError::Invalid);
    }

    let ParsedValue {
        value: server_host_key,
        rest_input,
    } = parse::string(rest_input)?;
    let ParsedValue {
        value: server_public_key,
        rest_input,
    } = parse::string(rest_input)?;
    let ParsedValue {
        value: signature, ..
    } = parse::string(rest_input)?;

    Ok((server_host_key, server_public_key, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha20Rng;

    /// Plays the server side of an exchange by hand and checks that the client half
    /// accepts the reply and produces the matching shared secret.
    #[test]
    fn full_exchange_against_scripted_server() {
        use ed25519_dalek::{Signer as _, SigningKey};

        let mut rng = ChaCha20Rng::from_seed([1; 32]);

        let kex_data = KeyExchangeData {
            client_identification: b"SSH-2.0-client",
            server_identification: b"SSH-2.0-server",
            client_kexinit: b"\x14client kexinit",
            server_kexinit: b"\x14server kexinit",
        };

        let mut alg = Curve25519Sha256::new();
        let init_packet = alg.start(&kex_data, &mut rng).unwrap();

        // Server side: read the client public value from the init packet.
        let ParsedValue { value: tag, rest_input } = parse::byte(&init_packet).unwrap();
        assert_eq!(tag, SSH_MSG_KEX_ECDH_INIT);
        let ParsedValue {
            value: client_public,
            ..
        } = parse::string(rest_input).unwrap();
        let client_public = PublicKey::from(<[u8; 32]>::try_from(client_public).unwrap());

        let server_secret = EphemeralSecret::random_from_rng(&mut rng);
        let server_public = PublicKey::from(&server_secret);
        let shared = server_secret.diffie_hellman(&client_public);
        let shared = BigInt::from_bytes_be(num_bigint::Sign::Plus, shared.as_bytes());

        let signing_key = SigningKey::from_bytes(&[7; 32]);
        let mut host_key = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20".to_vec();
        host_key.extend(signing_key.verifying_key().as_bytes());

        // Server side: compute the same exchange hash and sign it.
        let mut hash_input = Vec::new();
        write::string(kex_data.client_identification, &mut hash_input).unwrap();
        write::string(kex_data.server_identification, &mut hash_input).unwrap();
        write::string(kex_data.client_kexinit, &mut hash_input).unwrap();
        write::string(kex_data.server_kexinit, &mut hash_input).unwrap();
        write::string(&host_key, &mut hash_input).unwrap();
        write::string(client_public.as_bytes(), &mut hash_input).unwrap();
        write::string(server_public.as_bytes(), &mut hash_input).unwrap();
        write::mpint(&shared, &mut hash_input).unwrap();
        let hash = Sha256::digest(&hash_input);

        let mut signature = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x40".to_vec();
        signature.extend(signing_key.sign(&hash).to_bytes());

        let mut reply = Vec::new();
        write::byte(SSH_MSG_KEX_ECDH_REPLY, &mut reply).unwrap();
        write::string(&host_key, &mut reply).unwrap();
        write::string(server_public.as_bytes(), &mut reply).unwrap();
        write::string(&signature, &mut reply).unwrap();

        let mut host_key_entry = crate::host_key::Ed25519::new().into();

        match alg
            .respond(&reply, &kex_data, &mut host_key_entry, &mut rng)
            .unwrap()
        {
            KeyExchangeResponse::Finished {
                host_key: presented_key,
                shared_secret,
                exchange_hash,
            } => {
                assert_eq!(presented_key, host_key);
                assert_eq!(shared_secret, shared);
                assert_eq!(exchange_hash, hash.to_vec());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    /// A reply with a bad signature must abort the exchange.
    #[test]
    fn bad_signature_is_rejected() {
        use ed25519_dalek::Signer as _;

        let mut rng = ChaCha20Rng::from_seed([2; 32]);

        let kex_data = KeyExchangeData {
            client_identification: b"SSH-2.0-client",
            server_identification: b"SSH-2.0-server",
            client_kexinit: b"\x14client kexinit",
            server_kexinit: b"\x14server kexinit",
        };

        let mut alg = Curve25519Sha256::new();
        let _ = alg.start(&kex_data, &mut rng).unwrap();

        let server_secret = EphemeralSecret::random_from_rng(&mut rng);
        let server_public = PublicKey::from(&server_secret);

        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[9; 32]);
        let mut host_key = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20".to_vec();
        host_key.extend(signing_key.verifying_key().as_bytes());

        // Signature over something other than the exchange hash.
        let mut signature = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x40".to_vec();
        signature.extend(signing_key.sign(b"not the exchange hash").to_bytes());

        let mut reply = Vec::new();
        write::byte(SSH_MSG_KEX_ECDH_REPLY, &mut reply).unwrap();
        write::string(&host_key, &mut reply).unwrap();
        write::string(server_public.as_bytes(), &mut reply).unwrap();
        write::string(&signature, &mut reply).unwrap();

        let mut host_key_entry = crate::host_key::Ed25519::new().into();

        assert!(matches!(
            alg.respond(&reply, &kex_data, &mut host_key_entry, &mut rng),
            Err(KeyExchangeAlgorithmError::InvalidSignature)
        ));
    }
}
