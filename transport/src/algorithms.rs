//! Manages the algorithms available to and chosen by a connection.

use definitions::algorithms::{
    internal::{
        CompressionAlgorithmEntry, EncryptionAlgorithmEntry, HostKeyAlgorithmEntry,
        KeyExchangeAlgorithmEntry, MacAlgorithmEntry,
    },
    KeyExchangeHashFunction,
};
use num_bigint::BigInt;
use std::borrow::Cow;

use crate::errors::InvalidNameError;

pub(crate) use self::list::{AddIn, AlgorithmList, Nameable};

mod builtin;
mod helpers;
mod key_expansion;
mod list;

impl Nameable for KeyExchangeAlgorithmEntry {
    fn name(&self) -> &'static str {
        self.name
    }
}

impl Nameable for HostKeyAlgorithmEntry {
    fn name(&self) -> &'static str {
        self.name
    }
}

impl Nameable for EncryptionAlgorithmEntry {
    fn name(&self) -> &'static str {
        self.name
    }
}

impl Nameable for MacAlgorithmEntry {
    fn name(&self) -> &'static str {
        self.name
    }
}

impl Nameable for CompressionAlgorithmEntry {
    fn name(&self) -> &'static str {
        self.name
    }
}

/// The name of the compression algorithm that only becomes active after authentication.
const DELAYED_COMPRESSION_NAME: &str = "zlib@openssh.com";

/// The lists of available packet algorithms in one communication direction.
#[derive(Debug)]
pub struct OneWayPacketAlgorithms {
    /// The available encryption algorithms.
    pub(crate) encryption: AlgorithmList<EncryptionAlgorithmEntry>,
    /// The available MAC algorithms.
    pub(crate) mac: AlgorithmList<MacAlgorithmEntry>,
    /// The available compression algorithms.
    pub(crate) compression: AlgorithmList<CompressionAlgorithmEntry>,
}

impl Default for OneWayPacketAlgorithms {
    fn default() -> OneWayPacketAlgorithms {
        OneWayPacketAlgorithms {
            encryption: builtin::encryption_algorithms(),
            mac: builtin::mac_algorithms(),
            compression: builtin::compression_algorithms(),
        }
    }
}

impl OneWayPacketAlgorithms {
    /// Creates a new one way packet algorithms struct containing no algorithms.
    pub fn new() -> OneWayPacketAlgorithms {
        OneWayPacketAlgorithms {
            encryption: AlgorithmList::new(),
            mac: AlgorithmList::new(),
            compression: AlgorithmList::new(),
        }
    }

    /// Returns the currently chosen algorithms.
    pub(crate) fn current(&mut self, authenticated: bool) -> PacketAlgorithms {
        let encryption = self.encryption.current();
        let tag_included = encryption.computes_tag();

        let compression = self.compression.current();
        let compression_active = compression.name != DELAYED_COMPRESSION_NAME || authenticated;

        PacketAlgorithms {
            encryption,
            mac: if !tag_included {
                Some(self.mac.current())
            } else {
                None
            },
            compression,
            compression_active,
        }
    }

    /// Unloads the keys of the currently chosen algorithms.
    fn unload_keys(&mut self) {
        let encryption = self.encryption.current();
        let tag_included = encryption.computes_tag();

        encryption.unload_key();
        if !tag_included {
            self.mac.current().unload_key();
        }
    }

    /// Chooses the given algorithms and loads the keys derived for this direction.
    #[allow(clippy::too_many_arguments)]
    fn load_keys(
        &mut self,
        encryption: &str,
        mac: Option<&str>,
        compression: &str,
        letters: [u8; 3],
        hash_fn: KeyExchangeHashFunction,
        shared_secret: &BigInt,
        exchange_hash: &[u8],
        session_id: &[u8],
    ) {
        self.encryption.choose(encryption);
        if let Some(mac) = mac {
            self.mac.choose(mac);
        }
        self.compression.choose(compression);

        let encryption = self.encryption.current();
        let mac = if !encryption.computes_tag() {
            Some(self.mac.current())
        } else {
            None
        };

        let mut iv = vec![0; encryption.iv_size];
        let mut encryption_key = vec![0; encryption.key_size];
        let mut mac_key = vec![0; mac.as_ref().map(|m| m.key_size).unwrap_or(0)];

        key_expansion::expand_direction_keys(
            &mut key_expansion::DirectionKeys {
                iv: &mut iv,
                encryption_key: &mut encryption_key,
                mac_key: &mut mac_key,
            },
            letters,
            hash_fn,
            shared_secret,
            exchange_hash,
            session_id,
        );

        encryption.load_key(&iv, &encryption_key);
        if let Some(mac) = mac {
            mac.load_key(&mac_key);
        }
    }
}

/// Contains the algorithms available for a connection.
#[derive(Debug)]
pub struct ConnectionAlgorithms {
    /// The available key exchange algorithms.
    pub(crate) kex: AlgorithmList<KeyExchangeAlgorithmEntry>,
    /// The available host key algorithms.
    pub(crate) host_key: AlgorithmList<HostKeyAlgorithmEntry>,
    /// The algorithms for client to server communication.
    pub(crate) c2s: OneWayPacketAlgorithms,
    /// The algorithms for server to client communication.
    pub(crate) s2c: OneWayPacketAlgorithms,
}

impl Default for ConnectionAlgorithms {
    fn default() -> ConnectionAlgorithms {
        ConnectionAlgorithms {
            kex: builtin::key_exchange_algorithms(),
            host_key: builtin::host_key_algorithms(),
            c2s: Default::default(),
            s2c: Default::default(),
        }
    }
}

impl ConnectionAlgorithms {
    /// Creates a new connection algorithms struct containing no algorithms.
    pub fn new() -> ConnectionAlgorithms {
        ConnectionAlgorithms {
            kex: AlgorithmList::new(),
            host_key: AlgorithmList::new(),
            c2s: OneWayPacketAlgorithms::new(),
            s2c: OneWayPacketAlgorithms::new(),
        }
    }

    /// Adds a new key exchange algorithm with the highest priority.
    pub fn add_key_exchange_algorithm<
        A: definitions::algorithms::KeyExchangeAlgorithm + 'static,
    >(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.kex.add(algorithm, AddIn::Front)?;

        Ok(self)
    }

    /// Adds a new host key algorithm with the highest priority.
    pub fn add_host_key_algorithm<A: definitions::algorithms::HostKeyAlgorithm + 'static>(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.host_key.add(algorithm, AddIn::Front)?;

        Ok(self)
    }

    /// Adds a new encryption algorithm with the highest priority in both directions.
    pub fn add_encryption_algorithm<
        A: definitions::algorithms::EncryptionAlgorithm + Clone + 'static,
    >(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.c2s.encryption.add(algorithm.clone(), AddIn::Front)?;
        self.s2c.encryption.add(algorithm, AddIn::Front)?;

        Ok(self)
    }

    /// Adds a new MAC algorithm with the highest priority in both directions.
    pub fn add_mac_algorithm<A: definitions::algorithms::MacAlgorithm + Clone + 'static>(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.c2s.mac.add(algorithm.clone(), AddIn::Front)?;
        self.s2c.mac.add(algorithm, AddIn::Front)?;

        Ok(self)
    }

    /// Adds a new compression algorithm with the highest priority in both directions.
    pub fn add_compression_algorithm<
        A: definitions::algorithms::CompressionAlgorithm + Clone + 'static,
    >(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.c2s.compression.add(algorithm.clone(), AddIn::Front)?;
        self.s2c.compression.add(algorithm, AddIn::Front)?;

        Ok(self)
    }

    /// Clears all algorithms.
    pub fn clear(&mut self) {
        self.kex.clear();
        self.host_key.clear();
        self.c2s.encryption.clear();
        self.s2c.encryption.clear();
        self.c2s.mac.clear();
        self.s2c.mac.clear();
        self.c2s.compression.clear();
        self.s2c.compression.clear();
    }

    /// Returns the algorithms used to seal outgoing packets.
    pub(crate) fn outgoing(&mut self, authenticated: bool) -> PacketAlgorithms {
        self.c2s.current(authenticated)
    }

    /// Returns the algorithms used to open incoming packets.
    pub(crate) fn incoming(&mut self, authenticated: bool) -> PacketAlgorithms {
        self.s2c.current(authenticated)
    }

    /// Returns the first empty algorithm category, if one exists.
    pub(crate) fn empty_algorithm_role(&self) -> Option<AlgorithmRole> {
        use definitions::algorithms::{AlgorithmCategory, AlgorithmDirection};

        if self.kex.is_empty() {
            Some(AlgorithmRole(AlgorithmCategory::KeyExchange, None))
        } else if self.host_key.is_empty() {
            Some(AlgorithmRole(AlgorithmCategory::HostKey, None))
        } else if self.c2s.encryption.is_empty() {
            Some(AlgorithmRole(
                AlgorithmCategory::Encryption,
                Some(AlgorithmDirection::ClientToServer),
            ))
        } else if self.s2c.encryption.is_empty() {
            Some(AlgorithmRole(
                AlgorithmCategory::Encryption,
                Some(AlgorithmDirection::ServerToClient),
            ))
        } else if self.c2s.mac.is_empty() {
            Some(AlgorithmRole(
                AlgorithmCategory::Mac,
                Some(AlgorithmDirection::ClientToServer),
            ))
        } else if self.s2c.mac.is_empty() {
            Some(AlgorithmRole(
                AlgorithmCategory::Mac,
                Some(AlgorithmDirection::ServerToClient),
            ))
        } else if self.c2s.compression.is_empty() {
            Some(AlgorithmRole(
                AlgorithmCategory::Compression,
                Some(AlgorithmDirection::ClientToServer),
            ))
        } else if self.s2c.compression.is_empty() {
            Some(AlgorithmRole(
                AlgorithmCategory::Compression,
                Some(AlgorithmDirection::ServerToClient),
            ))
        } else {
            None
        }
    }

    /// Returns the first algorithm role with a missing required "none" algorithm.
    ///
    /// The "none" algorithms carry the connection until the first key exchange
    /// completes, so they must be present even if they are never negotiated.
    pub(crate) fn required_none_missing(&self) -> Option<AlgorithmRole> {
        use definitions::algorithms::{AlgorithmCategory, AlgorithmDirection};

        if !self.c2s.encryption.contains_algorithm("none") {
            Some(AlgorithmRole(
                AlgorithmCategory::Encryption,
                Some(AlgorithmDirection::ClientToServer),
            ))
        } else if !self.s2c.encryption.contains_algorithm("none") {
            Some(AlgorithmRole(
                AlgorithmCategory::Encryption,
                Some(AlgorithmDirection::ServerToClient),
            ))
        } else if !self.c2s.mac.contains_algorithm("none") {
            Some(AlgorithmRole(
                AlgorithmCategory::Mac,
                Some(AlgorithmDirection::ClientToServer),
            ))
        } else if !self.s2c.mac.contains_algorithm("none") {
            Some(AlgorithmRole(
                AlgorithmCategory::Mac,
                Some(AlgorithmDirection::ServerToClient),
            ))
        } else if !self.c2s.compression.contains_algorithm("none") {
            Some(AlgorithmRole(
                AlgorithmCategory::Compression,
                Some(AlgorithmDirection::ClientToServer),
            ))
        } else if !self.s2c.compression.contains_algorithm("none") {
            Some(AlgorithmRole(
                AlgorithmCategory::Compression,
                Some(AlgorithmDirection::ServerToClient),
            ))
        } else {
            None
        }
    }

    /// Unloads the keys of the outgoing direction and loads the newly derived ones.
    ///
    /// This is called the moment our `SSH_MSG_NEWKEYS` has been sent, independently of
    /// the incoming direction, so packets already in flight under the old keys are
    /// never corrupted.
    pub(crate) fn switch_outgoing_keys(
        &mut self,
        negotiated: &NegotiatedAlgorithms,
        hash_fn: KeyExchangeHashFunction,
        shared_secret: &BigInt,
        exchange_hash: &[u8],
        session_id: &[u8],
    ) {
        self.c2s.unload_keys();
        self.c2s.load_keys(
            &negotiated.encryption_c2s,
            negotiated.mac_c2s.as_deref(),
            &negotiated.compression_c2s,
            key_expansion::CLIENT_TO_SERVER_LETTERS,
            hash_fn,
            shared_secret,
            exchange_hash,
            session_id,
        );
    }

    /// Unloads the keys of the incoming direction and loads the newly derived ones.
    ///
    /// This is called the moment the peer's `SSH_MSG_NEWKEYS` has been received.
    pub(crate) fn switch_incoming_keys(
        &mut self,
        negotiated: &NegotiatedAlgorithms,
        hash_fn: KeyExchangeHashFunction,
        shared_secret: &BigInt,
        exchange_hash: &[u8],
        session_id: &[u8],
    ) {
        self.s2c.unload_keys();
        self.s2c.load_keys(
            &negotiated.encryption_s2c,
            negotiated.mac_s2c.as_deref(),
            &negotiated.compression_s2c,
            key_expansion::SERVER_TO_CLIENT_LETTERS,
            hash_fn,
            shared_secret,
            exchange_hash,
            session_id,
        );
    }
}

pub(crate) use definitions::algorithms::AlgorithmRole;

/// The algorithms chosen by one negotiation round.
///
/// The value is immutable for the lifetime of one round and superseded entirely by the
/// next re-key.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NegotiatedAlgorithms {
    /// The negotiated key exchange algorithm.
    pub kex: String,
    /// The negotiated host key algorithm.
    pub host_key: String,
    /// The encryption algorithm for client to server communication.
    pub encryption_c2s: String,
    /// The encryption algorithm for server to client communication.
    pub encryption_s2c: String,
    /// The MAC algorithm for client to server communication.
    ///
    /// `None` if the negotiated encryption algorithm authenticates its own packets.
    pub mac_c2s: Option<String>,
    /// The MAC algorithm for server to client communication.
    ///
    /// `None` if the negotiated encryption algorithm authenticates its own packets.
    pub mac_s2c: Option<String>,
    /// The compression algorithm for client to server communication.
    pub compression_c2s: String,
    /// The compression algorithm for server to client communication.
    pub compression_s2c: String,
}

/// Contains the algorithm name lists exchanged during negotiation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct AlgorithmNameList<'a> {
    /// The key exchange algorithms available.
    pub(crate) kex: Vec<Cow<'a, str>>,
    /// The host key algorithms available.
    pub(crate) host_key: Vec<Cow<'a, str>>,
    /// The encryption algorithms available for client to server communication.
    pub(crate) encryption_c2s: Vec<Cow<'a, str>>,
    /// The encryption algorithms available for server to client communication.
    pub(crate) encryption_s2c: Vec<Cow<'a, str>>,
    /// The MAC algorithms available for client to server communication.
    pub(crate) mac_c2s: Vec<Cow<'a, str>>,
    /// The MAC algorithms available for server to client communication.
    pub(crate) mac_s2c: Vec<Cow<'a, str>>,
    /// The compression algorithms available for client to server communication.
    pub(crate) compression_c2s: Vec<Cow<'a, str>>,
    /// The compression algorithms available for server to client communication.
    pub(crate) compression_s2c: Vec<Cow<'a, str>>,
}

impl AlgorithmNameList<'static> {
    /// Creates the algorithm name list from the available algorithms.
    pub(crate) fn from_available(
        available_algorithms: &ConnectionAlgorithms,
        allow_none_algorithms: bool,
    ) -> AlgorithmNameList<'static> {
        AlgorithmNameList {
            kex: available_algorithms.kex.to_name_list(true),
            host_key: available_algorithms.host_key.to_name_list(true),
            encryption_c2s: available_algorithms
                .c2s
                .encryption
                .to_name_list(allow_none_algorithms),
            encryption_s2c: available_algorithms
                .s2c
                .encryption
                .to_name_list(allow_none_algorithms),
            mac_c2s: available_algorithms
                .c2s
                .mac
                .to_name_list(allow_none_algorithms),
            mac_s2c: available_algorithms
                .s2c
                .mac
                .to_name_list(allow_none_algorithms),
            compression_c2s: available_algorithms.c2s.compression.to_name_list(true),
            compression_s2c: available_algorithms.s2c.compression.to_name_list(true),
        }
    }

    /// Moves the given host key algorithms to the front of the preference list.
    ///
    /// Host keys already trusted for the peer are preferred, reducing unnecessary trust
    /// prompts.
    pub(crate) fn prefer_host_key_algorithms(&mut self, preferred: &[&'static str]) {
        let mut reordered: Vec<Cow<'static, str>> = Vec::with_capacity(self.host_key.len());

        for name in preferred {
            if let Some(idx) = self.host_key.iter().position(|n| n == name) {
                reordered.push(self.host_key.remove(idx));
            }
        }

        reordered.append(&mut self.host_key);
        self.host_key = reordered;
    }
}

/// Bundles the algorithms used for handling regular packets in one direction.
#[derive(Debug)]
pub(crate) struct PacketAlgorithms<'a> {
    /// The encryption algorithm used for the packets.
    pub(crate) encryption: &'a mut EncryptionAlgorithmEntry,
    /// The MAC algorithm used for the packets, if the encryption algorithm does not
    /// authenticate them itself.
    pub(crate) mac: Option<&'a mut MacAlgorithmEntry>,
    /// The compression algorithm used for the packets.
    pub(crate) compression: &'a mut CompressionAlgorithmEntry,
    /// Whether the compression algorithm is currently engaged.
    ///
    /// Delayed compression algorithms stay inert until authentication succeeded.
    pub(crate) compression_active: bool,
}

impl PacketAlgorithms<'_> {
    /// Returns the number of MAC or tag bytes that follow each packet.
    pub(crate) fn mac_len(&self) -> usize {
        self.mac
            .as_ref()
            .map(|alg| alg.mac_size)
            .unwrap_or_else(|| {
                self.encryption
                    .tag_size
                    .expect("encryption algorithm is authenticated when no MAC is present")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_algorithms_present() {
        let algorithms = ConnectionAlgorithms::default();

        assert!(algorithms.empty_algorithm_role().is_none());
        assert!(algorithms.required_none_missing().is_none());
        assert!(algorithms.c2s.encryption.contains_algorithm("aes128-ctr"));
        assert!(algorithms
            .kex
            .contains_algorithm("curve25519-sha256"));
    }

    #[test]
    fn name_list_hides_none_when_asked() {
        let algorithms = ConnectionAlgorithms::default();

        let list = AlgorithmNameList::from_available(&algorithms, false);
        assert!(!list.encryption_c2s.iter().any(|n| n == "none"));
        assert!(!list.mac_s2c.iter().any(|n| n == "none"));
        // The "none" compression algorithm is always offered.
        assert!(list.compression_c2s.iter().any(|n| n == "none"));

        let list = AlgorithmNameList::from_available(&algorithms, true);
        assert!(list.encryption_c2s.iter().any(|n| n == "none"));
    }

    #[test]
    fn host_key_preference_reordering() {
        let algorithms = ConnectionAlgorithms::default();
        let mut list = AlgorithmNameList::from_available(&algorithms, false);

        list.host_key = vec!["ssh-rsa".into(), "ecdsa-sha2-nistp256".into(), "ssh-ed25519".into()];
        list.prefer_host_key_algorithms(&["ssh-ed25519"]);

        assert_eq!(
            list.host_key,
            vec![
                Cow::Borrowed("ssh-ed25519"),
                Cow::Borrowed("ssh-rsa"),
                Cow::Borrowed("ecdsa-sha2-nistp256")
            ]
        );
    }
}
