//! Handles key exchange related protocol functions.

use definitions::{
    algorithms::{AlgorithmCategory, AlgorithmDirection, AlgorithmRole},
    consts::SSH_MSG_KEXINIT,
    parse, write, ParseError, ParsedValue,
};
use std::{
    borrow::Cow,
    io::{self, Write},
};

use crate::{
    algorithms::{AlgorithmNameList, ConnectionAlgorithms, NegotiatedAlgorithms},
    errors::KeyExchangeProcedureError,
};

/// Represents a `SSH_MSG_KEXINIT` packet.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct KexInitPacket<'a> {
    /// The random cookie in the packet.
    pub(crate) cookie: [u8; 16],
    /// The algorithm name lists in the packet.
    pub(crate) algorithm_list: AlgorithmNameList<'a>,
    /// Indicates if a guessed key exchange packet follows the `SSH_MSG_KEXINIT` packet.
    pub(crate) first_kex_packet_follows: bool,
}

/// Parses a `SSH_MSG_KEXINIT` packet.
pub(crate) fn parse_kexinit(input: &[u8]) -> Result<KexInitPacket, ParseError> {
    let ParsedValue {
        value: message_number,
        rest_input,
    } = parse::byte(input)?;
    if message_number != SSH_MSG_KEXINIT {
        return Err(ParseError::Invalid);
    }

    let ParsedValue {
        value: cookie,
        rest_input,
    } = parse::bytes_const::<16>(rest_input)?;

    let ParsedValue {
        value: kex,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: host_key,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: encryption_c2s,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: encryption_s2c,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: mac_c2s,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: mac_s2c,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: compression_c2s,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: compression_s2c,
        rest_input,
    } = parse::name_list(rest_input)?;
    let ParsedValue {
        value: _languages_c2s,
        rest_input,
    } = parse::name_list::<Cow<str>>(rest_input)?;
    let ParsedValue {
        value: _languages_s2c,
        rest_input,
    } = parse::name_list::<Cow<str>>(rest_input)?;
    let ParsedValue {
        value: first_kex_packet_follows,
        rest_input,
    } = parse::boolean(rest_input)?;
    // The trailing reserved uint32 must be present, but its value is ignored.
    let _ = parse::uint32(rest_input)?;

    Ok(KexInitPacket {
        cookie,
        algorithm_list: AlgorithmNameList {
            kex,
            host_key,
            encryption_c2s,
            encryption_s2c,
            mac_c2s,
            mac_s2c,
            compression_c2s,
            compression_s2c,
        },
        first_kex_packet_follows,
    })
}

/// Writes a `SSH_MSG_KEXINIT` packet.
pub(crate) fn write_kexinit(packet: &KexInitPacket, output: &mut impl Write) -> io::Result<()> {
    write::byte(SSH_MSG_KEXINIT, output)?;
    write::bytes(&packet.cookie[..], output)?;

    write::name_list(&packet.algorithm_list.kex, output)?;
    write::name_list(&packet.algorithm_list.host_key, output)?;
    write::name_list(&packet.algorithm_list.encryption_c2s, output)?;
    write::name_list(&packet.algorithm_list.encryption_s2c, output)?;
    write::name_list(&packet.algorithm_list.mac_c2s, output)?;
    write::name_list(&packet.algorithm_list.mac_s2c, output)?;
    write::name_list(&packet.algorithm_list.compression_c2s, output)?;
    write::name_list(&packet.algorithm_list.compression_s2c, output)?;

    // No languages are offered.
    let language_list: &[&'static str] = &[];
    write::name_list(language_list, output)?;
    write::name_list(language_list, output)?;

    write::boolean(packet.first_kex_packet_follows, output)?;
    write::uint32(0, output)
}

/// Negotiates an encryption, MAC or compression algorithm.
///
/// The result is the first entry of the client list that also appears in the server
/// list.
fn negotiate_basic_algorithm<'names>(
    client_list: &'names [Cow<'names, str>],
    server_list: &[Cow<'_, str>],
    role: AlgorithmRole,
) -> Result<&'names str, KeyExchangeProcedureError> {
    client_list
        .iter()
        .find(|name| server_list.contains(name))
        .map(|name| &**name)
        .ok_or(KeyExchangeProcedureError::NoAlgorithmFound(role))
}

/// Negotiates the key exchange and host key algorithms.
///
/// The kex choice is constrained by the host key capabilities it requires: a kex
/// algorithm is only viable if some mutually supported host key algorithm can satisfy
/// its requirements.
fn negotiate_kex_and_host_key(
    client_list: &AlgorithmNameList<'_>,
    server_list: &AlgorithmNameList<'_>,
    available_algorithms: &ConnectionAlgorithms,
) -> Result<(String, String), KeyExchangeProcedureError> {
    for kex_name in &client_list.kex {
        if !server_list.kex.contains(kex_name) {
            continue;
        }

        let kex_alg = match available_algorithms.kex.algorithm(kex_name) {
            Some(alg) => alg,
            None => continue,
        };

        let host_key_name = client_list
            .host_key
            .iter()
            .filter(|name| {
                available_algorithms
                    .host_key
                    .algorithm(name)
                    .map(|alg| {
                        (!kex_alg.requires_signature_capable_host_key_algorithm
                            || alg.is_signature_capable)
                            && (!kex_alg.requires_encryption_capable_host_key_algorithm
                                || alg.is_encryption_capable)
                    })
                    .unwrap_or(false)
            })
            .find(|name| server_list.host_key.contains(name));

        if let Some(host_key_name) = host_key_name {
            return Ok((kex_name.to_string(), host_key_name.to_string()));
        }
    }

    Err(KeyExchangeProcedureError::NoAlgorithmFound(AlgorithmRole(
        AlgorithmCategory::KeyExchange,
        None,
    )))
}

/// Performs the algorithm negotiation.
///
/// For each category the first entry of the local (client) preference list that also
/// appears in the server's list is chosen. A category with no common entry fails the
/// negotiation.
pub(crate) fn negotiate_algorithms(
    own_list: &AlgorithmNameList<'_>,
    other_list: &AlgorithmNameList<'_>,
    available_algorithms: &ConnectionAlgorithms,
) -> Result<NegotiatedAlgorithms, KeyExchangeProcedureError> {
    let (kex, host_key) =
        negotiate_kex_and_host_key(own_list, other_list, available_algorithms)?;

    let encryption_c2s = negotiate_basic_algorithm(
        &own_list.encryption_c2s,
        &other_list.encryption_c2s,
        AlgorithmRole(
            AlgorithmCategory::Encryption,
            Some(AlgorithmDirection::ClientToServer),
        ),
    )?;
    let encryption_s2c = negotiate_basic_algorithm(
        &own_list.encryption_s2c,
        &other_list.encryption_s2c,
        AlgorithmRole(
            AlgorithmCategory::Encryption,
            Some(AlgorithmDirection::ServerToClient),
        ),
    )?;

    // A separate MAC is only negotiated if the chosen cipher does not authenticate its
    // own packets.
    let mac_c2s = if cipher_computes_tag(available_algorithms, encryption_c2s, true) {
        None
    } else {
        Some(
            negotiate_basic_algorithm(
                &own_list.mac_c2s,
                &other_list.mac_c2s,
                AlgorithmRole(
                    AlgorithmCategory::Mac,
                    Some(AlgorithmDirection::ClientToServer),
                ),
            )?
            .to_string(),
        )
    };
    let mac_s2c = if cipher_computes_tag(available_algorithms, encryption_s2c, false) {
        None
    } else {
        Some(
            negotiate_basic_algorithm(
                &own_list.mac_s2c,
                &other_list.mac_s2c,
                AlgorithmRole(
                    AlgorithmCategory::Mac,
                    Some(AlgorithmDirection::ServerToClient),
                ),
            )?
            .to_string(),
        )
    };

    let compression_c2s = negotiate_basic_algorithm(
        &own_list.compression_c2s,
        &other_list.compression_c2s,
        AlgorithmRole(
            AlgorithmCategory::Compression,
            Some(AlgorithmDirection::ClientToServer),
        ),
    )?;
    let compression_s2c = negotiate_basic_algorithm(
        &own_list.compression_s2c,
        &other_list.compression_s2c,
        AlgorithmRole(
            AlgorithmCategory::Compression,
            Some(AlgorithmDirection::ServerToClient),
        ),
    )?;

    Ok(NegotiatedAlgorithms {
        kex,
        host_key,
        encryption_c2s: encryption_c2s.to_string(),
        encryption_s2c: encryption_s2c.to_string(),
        mac_c2s,
        mac_s2c,
        compression_c2s: compression_c2s.to_string(),
        compression_s2c: compression_s2c.to_string(),
    })
}

/// Returns whether the named cipher computes its own authentication tag.
fn cipher_computes_tag(
    available_algorithms: &ConnectionAlgorithms,
    name: &str,
    client_to_server: bool,
) -> bool {
    let list = if client_to_server {
        &available_algorithms.c2s.encryption
    } else {
        &available_algorithms.s2c.encryption
    };

    list.algorithm(name)
        .map(|alg| alg.computes_tag())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_list(names: &[&'static str]) -> Vec<Cow<'static, str>> {
        names.iter().map(|name| Cow::Borrowed(*name)).collect()
    }

    fn list_with(
        kex: &[&'static str],
        host_key: &[&'static str],
        encryption: &[&'static str],
        mac: &[&'static str],
        compression: &[&'static str],
    ) -> AlgorithmNameList<'static> {
        AlgorithmNameList {
            kex: name_list(kex),
            host_key: name_list(host_key),
            encryption_c2s: name_list(encryption),
            encryption_s2c: name_list(encryption),
            mac_c2s: name_list(mac),
            mac_s2c: name_list(mac),
            compression_c2s: name_list(compression),
            compression_s2c: name_list(compression),
        }
    }

    #[test]
    fn kexinit_roundtrip() {
        let list = list_with(
            &["curve25519-sha256", "diffie-hellman-group14-sha256"],
            &["ssh-ed25519"],
            &["aes128-ctr", "none"],
            &["hmac-sha2-256", "none"],
            &["none", "zlib"],
        );

        let packet = KexInitPacket {
            cookie: [42; 16],
            algorithm_list: list,
            first_kex_packet_follows: false,
        };

        let mut target = Vec::new();
        write_kexinit(&packet, &mut target).unwrap();

        assert_eq!(target[0], SSH_MSG_KEXINIT);
        assert_eq!(&target[1..17], &[42; 16]);
        assert_eq!(parse_kexinit(&target).unwrap(), packet);
    }

    #[test]
    fn truncated_kexinit_is_incomplete() {
        let packet = KexInitPacket {
            cookie: [7; 16],
            algorithm_list: list_with(
                &["curve25519-sha256"],
                &["ssh-ed25519"],
                &["aes128-ctr"],
                &["hmac-sha2-256"],
                &["none"],
            ),
            first_kex_packet_follows: false,
        };

        let mut target = Vec::new();
        write_kexinit(&packet, &mut target).unwrap();

        assert_eq!(
            parse_kexinit(&target[..target.len() - 5]),
            Err(ParseError::Incomplete)
        );
    }

    /// The first client preference present in the server's list wins, for every
    /// category.
    #[test]
    fn first_client_preference_wins() {
        let available = ConnectionAlgorithms::default();

        let client = list_with(
            &["curve25519-sha256", "diffie-hellman-group14-sha256"],
            &["ssh-ed25519"],
            &["aes256-ctr", "aes192-ctr", "aes128-ctr"],
            &["hmac-sha2-512", "hmac-sha2-256", "hmac-sha1"],
            &["none", "zlib"],
        );
        let server = list_with(
            &["diffie-hellman-group14-sha256", "curve25519-sha256"],
            &["ssh-ed25519"],
            &["aes128-ctr", "aes192-ctr"],
            &["hmac-sha1", "hmac-sha2-256"],
            &["zlib", "none"],
        );

        let negotiated = negotiate_algorithms(&client, &server, &available).unwrap();

        assert_eq!(negotiated.kex, "curve25519-sha256");
        assert_eq!(negotiated.host_key, "ssh-ed25519");
        assert_eq!(negotiated.encryption_c2s, "aes192-ctr");
        assert_eq!(negotiated.encryption_s2c, "aes192-ctr");
        assert_eq!(negotiated.mac_c2s.as_deref(), Some("hmac-sha2-256"));
        assert_eq!(negotiated.mac_s2c.as_deref(), Some("hmac-sha2-256"));
        assert_eq!(negotiated.compression_c2s, "none");
        assert_eq!(negotiated.compression_s2c, "none");
    }

    /// A category without a common entry fails the whole negotiation.
    #[test]
    fn disjoint_preferences_fail() {
        let available = ConnectionAlgorithms::default();

        let client = list_with(
            &["curve25519-sha256"],
            &["ssh-ed25519"],
            &["aes128-ctr"],
            &["hmac-sha2-256"],
            &["none"],
        );
        let server = list_with(
            &["diffie-hellman-group14-sha256"],
            &["ssh-ed25519"],
            &["aes128-ctr"],
            &["hmac-sha2-256"],
            &["none"],
        );

        assert!(matches!(
            negotiate_algorithms(&client, &server, &available),
            Err(KeyExchangeProcedureError::NoAlgorithmFound(AlgorithmRole(
                AlgorithmCategory::KeyExchange,
                None
            )))
        ));

        let server = list_with(
            &["curve25519-sha256"],
            &["ssh-ed25519"],
            &["aes256-cbc"],
            &["hmac-sha2-256"],
            &["none"],
        );

        assert!(matches!(
            negotiate_algorithms(&client, &server, &available),
            Err(KeyExchangeProcedureError::NoAlgorithmFound(AlgorithmRole(
                AlgorithmCategory::Encryption,
                Some(AlgorithmDirection::ClientToServer)
            )))
        ));
    }

    /// A negotiated AEAD cipher leaves the MAC slot implicit even if the MAC lists are
    /// disjoint.
    #[test]
    fn aead_cipher_skips_mac_negotiation() {
        let available = ConnectionAlgorithms::default();

        let client = list_with(
            &["curve25519-sha256"],
            &["ssh-ed25519"],
            &["chacha20poly1305@openssh.com"],
            &["hmac-sha2-256"],
            &["none"],
        );
        let server = list_with(
            &["curve25519-sha256"],
            &["ssh-ed25519"],
            &["chacha20poly1305@openssh.com"],
            &["hmac-sha1"],
            &["none"],
        );

        let negotiated = negotiate_algorithms(&client, &server, &available).unwrap();

        assert_eq!(negotiated.encryption_c2s, "chacha20poly1305@openssh.com");
        assert_eq!(negotiated.mac_c2s, None);
        assert_eq!(negotiated.mac_s2c, None);
    }
}
