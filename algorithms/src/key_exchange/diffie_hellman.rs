//! Implements the Diffie-Hellman key exchange algorithms over MODP groups.
//!
//! The fixed group variants ("diffie-hellman-group1-sha1",
//! "diffie-hellman-group14-sha1" and "diffie-hellman-group14-sha256") follow
//! [RFC 4253 section 8](https://tools.ietf.org/html/rfc4253#section-8), the negotiated
//! group variant ("diffie-hellman-group-exchange-sha256") follows
//! [RFC 4419](https://tools.ietf.org/html/rfc4419).

use definitions::{
    algorithms::{
        internal::HostKeyAlgorithmEntry, KeyExchangeAlgorithm, KeyExchangeAlgorithmError,
        KeyExchangeData, KeyExchangeHashFunction, KeyExchangeResponse,
    },
    consts::{
        SSH_MSG_KEXDH_INIT, SSH_MSG_KEXDH_REPLY, SSH_MSG_KEX_DH_GEX_GROUP,
        SSH_MSG_KEX_DH_GEX_INIT, SSH_MSG_KEX_DH_GEX_REPLY, SSH_MSG_KEX_DH_GEX_REQUEST,
    },
    parse, write, ParseError, ParsedValue,
};
use num_bigint::{BigInt, RandBigInt as _};
use rand::{CryptoRng, RngCore};
use std::fmt;

/// The prime of the 1024 bit Oakley Group 2, used by "diffie-hellman-group1-sha1".
///
/// See [RFC 2409 section 6.2](https://tools.ietf.org/html/rfc2409#section-6.2).
const GROUP1_PRIME: &[u8] = b"\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381\
FFFFFFFFFFFFFFFF";

/// The prime of the 2048 bit MODP group 14, used by the "diffie-hellman-group14-*"
/// algorithms.
///
/// See [RFC 3526 section 3](https://tools.ietf.org/html/rfc3526#section-3).
const GROUP14_PRIME: &[u8] = b"\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
83655D23DCA3AD961C62F356208552BB9ED529077096966D\
670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
15728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// The generator shared by all carried MODP groups.
const GENERATOR: u32 = 2;

/// The group size bounds sent in a group exchange request.
const GEX_MIN_GROUP_BITS: u32 = 1024;
/// The preferred group size sent in a group exchange request.
const GEX_PREFERRED_GROUP_BITS: u32 = 2048;
/// The maximum group size sent in a group exchange request.
const GEX_MAX_GROUP_BITS: u32 = 8192;

/// Generates the private exponent and public value for the given group.
fn generate_keypair<Rng: RngCore + CryptoRng + ?Sized>(
    prime: &BigInt,
    generator: &BigInt,
    rng: &mut Rng,
) -> (BigInt, BigInt) {
    // x in [2, p-2], e = g^x mod p
    let private = rng.gen_bigint_range(&BigInt::from(2), &(prime - BigInt::from(2)));
    let public = generator.modpow(&private, prime);

    (private, public)
}

/// Checks that a peer supplied public value is in the range `1 < value < p-1`.
fn validate_public_value(value: &BigInt, prime: &BigInt) -> Result<(), KeyExchangeAlgorithmError> {
    if value <= &BigInt::from(1) || value >= &(prime - BigInt::from(1)) {
        Err(KeyExchangeAlgorithmError::InvalidPublicValue)
    } else {
        Ok(())
    }
}

/// Parses a Diffie-Hellman reply packet into (host key, f, signature).
///
/// The same layout is used by `SSH_MSG_KEXDH_REPLY` and `SSH_MSG_KEX_DH_GEX_REPLY`.
fn parse_dh_reply(input: &[u8], message_number: u8) -> Result<(&[u8], BigInt, &[u8]), ParseError> {
    let ParsedValue {
        value: tag,
        rest_input,
    } = parse::byte(input)?;

    if tag != message_number {
        return Err(ParseError::Invalid);
    }

    let ParsedValue {
        value: server_host_key,
        rest_input,
    } = parse::string(rest_input)?;
    let ParsedValue {
        value: f,
        rest_input,
    } = parse::mpint(rest_input)?;
    let ParsedValue {
        value: signature, ..
    } = parse::string(rest_input)?;

    Ok((server_host_key, f, signature))
}

macro_rules! impl_dh_fixed_group {
    ($name_str:expr, $name:ident, $prime:expr, $hash:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` key exchange algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Default)]
        pub struct $name {
            /// The private exponent and public value of the current exchange.
            state: Option<(BigInt, BigInt)>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` key exchange algorithm.")]
            pub fn new() -> $name {
                $name { state: None }
            }

            /// Returns the prime of the group used by this algorithm.
            fn prime() -> BigInt {
                BigInt::parse_bytes($prime, 16).expect("group prime constant is valid hex")
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                // Hide the private exponent
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl KeyExchangeAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const REQUIRES_ENCRYPTION_CAPABLE_HOST_KEY_ALGORITHM: bool = false;
            const REQUIRES_SIGNATURE_CAPABLE_HOST_KEY_ALGORITHM: bool = true;
            const HASH_FUNCTION: KeyExchangeHashFunction = $hash;

            fn start<Rng: RngCore + CryptoRng + ?Sized>(
                &mut self,
                _key_exchange_data: &KeyExchangeData,
                rng: &mut Rng,
            ) -> Option<Vec<u8>> {
                let prime = Self::prime();
                let (private, public) =
                    generate_keypair(&prime, &BigInt::from(GENERATOR), rng);

                let mut packet = Vec::new();
                write::byte(SSH_MSG_KEXDH_INIT, &mut packet).expect("vec writes don't fail");
                write::mpint(&public, &mut packet).expect("vec writes don't fail");

                self.state.replace((private, public));

                Some(packet)
            }

            fn respond<Rng: RngCore + CryptoRng + ?Sized>(
                &mut self,
                message: &[u8],
                key_exchange_data: &KeyExchangeData,
                host_key_algorithm: &mut HostKeyAlgorithmEntry,
                _rng: &mut Rng,
            ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError> {
                let (server_host_key, f, signature) = parse_dh_reply(message, SSH_MSG_KEXDH_REPLY)
                    .map_err(|_| KeyExchangeAlgorithmError::InvalidFormat)?;

                let prime = Self::prime();
                validate_public_value(&f, &prime)?;

                let (private, public) = self
                    .state
                    .take()
                    .expect("`start` should be called before `respond`");

                let shared_secret = f.modpow(&private, &prime);

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
                write::mpint(&public, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&f, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&shared_secret, &mut hash_input).expect("vec writes don't fail");

                let exchange_hash = (Self::HASH_FUNCTION)(&hash_input);

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

#[cfg(feature = "diffie-hellman-group1-sha1")]
impl_dh_fixed_group!(
    "diffie-hellman-group1-sha1",
    DhGroup1Sha1,
    GROUP1_PRIME,
    |message| {
        use sha1::Digest as _;
        sha1::Sha1::digest(message).to_vec()
    }
);

#[cfg(feature = "diffie-hellman-group14-sha1")]
impl_dh_fixed_group!(
    "diffie-hellman-group14-sha1",
    DhGroup14Sha1,
    GROUP14_PRIME,
    |message| {
        use sha1::Digest as _;
        sha1::Sha1::digest(message).to_vec()
    }
);

#[cfg(feature = "diffie-hellman-group14-sha256")]
impl_dh_fixed_group!(
    "diffie-hellman-group14-sha256",
    DhGroup14Sha256,
    GROUP14_PRIME,
    |message| {
        use sha2::Digest as _;
        sha2::Sha256::digest(message).to_vec()
    }
);

/// The progress of a negotiated-group exchange.
#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
enum GroupExchangeState {
    /// The group request was sent, the group parameters are awaited.
    AwaitingGroup,
    /// The exchange init was sent, the reply is awaited.
    AwaitingReply {
        /// The negotiated group prime.
        prime: BigInt,
        /// The negotiated group generator.
        generator: BigInt,
        /// The private exponent of the current exchange.
        private: BigInt,
        /// The public value of the current exchange.
        public: BigInt,
    },
}

/// Implements the `diffie-hellman-group-exchange-sha256` key exchange algorithm.
///
/// The existence of this struct is controlled by the
/// `diffie-hellman-group-exchange-sha256` feature.
#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
#[derive(Default)]
pub struct DhGroupExchangeSha256 {
    /// The progress of the current exchange.
    state: Option<GroupExchangeState>,
}

#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
impl DhGroupExchangeSha256 {
    /// Creates a new `diffie-hellman-group-exchange-sha256` key exchange algorithm.
    pub fn new() -> DhGroupExchangeSha256 {
        DhGroupExchangeSha256 { state: None }
    }
}

#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
impl fmt::Debug for DhGroupExchangeSha256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Hide the private exponent
        f.debug_struct("DhGroupExchangeSha256").finish_non_exhaustive()
    }
}

#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
impl KeyExchangeAlgorithm for DhGroupExchangeSha256 {
    const NAME: &'static str = "diffie-hellman-group-exchange-sha256";
    const REQUIRES_ENCRYPTION_CAPABLE_HOST_KEY_ALGORITHM: bool = false;
    const REQUIRES_SIGNATURE_CAPABLE_HOST_KEY_ALGORITHM: bool = true;
    const HASH_FUNCTION: KeyExchangeHashFunction = |message| {
        use sha2::Digest as _;
        sha2::Sha256::digest(message).to_vec()
    };

    fn start<Rng: RngCore + CryptoRng + ?Sized>(
        &mut self,
        _key_exchange_data: &KeyExchangeData,
        _rng: &mut Rng,
    ) -> Option<Vec<u8>> {
        let mut packet = Vec::new();
        write::byte(SSH_MSG_KEX_DH_GEX_REQUEST, &mut packet).expect("vec writes don't fail");
        write::uint32(GEX_MIN_GROUP_BITS, &mut packet).expect("vec writes don't fail");
        write::uint32(GEX_PREFERRED_GROUP_BITS, &mut packet).expect("vec writes don't fail");
        write::uint32(GEX_MAX_GROUP_BITS, &mut packet).expect("vec writes don't fail");

        self.state.replace(GroupExchangeState::AwaitingGroup);

        Some(packet)
    }

    fn respond<Rng: RngCore + CryptoRng + ?Sized>(
        &mut self,
        message: &[u8],
        key_exchange_data: &KeyExchangeData,
        host_key_algorithm: &mut HostKeyAlgorithmEntry,
        rng: &mut Rng,
    ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError> {
        match self
            .state
            .take()
            .expect("`start` should be called before `respond`")
        {
            GroupExchangeState::AwaitingGroup => {
                let (prime, generator) = parse_gex_group(message)
                    .map_err(|_| KeyExchangeAlgorithmError::InvalidFormat)?;

                let bits = prime.bits();
                if bits < GEX_MIN_GROUP_BITS as u64 || bits > GEX_MAX_GROUP_BITS as u64 {
                    return Err(KeyExchangeAlgorithmError::InvalidPublicValue);
                }
                validate_public_value(&generator, &prime)?;

                let (private, public) = generate_keypair(&prime, &generator, rng);

                let mut packet = Vec::new();
                write::byte(SSH_MSG_KEX_DH_GEX_INIT, &mut packet).expect("vec writes don't fail");
                write::mpint(&public, &mut packet).expect("vec writes don't fail");

                self.state.replace(GroupExchangeState::AwaitingReply {
                    prime,
                    generator,
                    private,
                    public,
                });

                Ok(KeyExchangeResponse::Packet(packet))
            }
            GroupExchangeState::AwaitingReply {
                prime,
                generator,
                private,
                public,
            } => {
                let (server_host_key, f, signature) =
                    parse_dh_reply(message, SSH_MSG_KEX_DH_GEX_REPLY)
                        .map_err(|_| KeyExchangeAlgorithmError::InvalidFormat)?;

                validate_public_value(&f, &prime)?;

                let shared_secret = f.modpow(&private, &prime);

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
                write::uint32(GEX_MIN_GROUP_BITS, &mut hash_input).expect("vec writes don't fail");
                write::uint32(GEX_PREFERRED_GROUP_BITS, &mut hash_input)
                    .expect("vec writes don't fail");
                write::uint32(GEX_MAX_GROUP_BITS, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&prime, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&generator, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&public, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&f, &mut hash_input).expect("vec writes don't fail");
                write::mpint(&shared_secret, &mut hash_input).expect("vec writes don't fail");

                let exchange_hash = (Self::HASH_FUNCTION)(&hash_input);

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
    }
}

#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
impl Clone for DhGroupExchangeSha256 {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Parses a `SSH_MSG_KEX_DH_GEX_GROUP` packet into (prime, generator).
#[cfg(feature = "diffie-hellman-group-exchange-sha256")]
fn parse_gex_group(input: &[u8]) -> Result<(BigInt, BigInt), ParseError> {
    let ParsedValue {
        value: tag,
        rest_input,
    } = parse::byte(input)?;

    if tag != SSH_MSG_KEX_DH_GEX_GROUP {
        return Err(ParseError::Invalid);
    }

    let ParsedValue {
        value: prime,
        rest_input,
    } = parse::mpint(rest_input)?;
    let ParsedValue {
        value: generator, ..
    } = parse::mpint(rest_input)?;

    Ok((prime, generator))
}
