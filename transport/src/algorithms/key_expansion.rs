//! Implements the key expansion for the encryption and MAC algorithms.
//!
//! Key material shorter than an algorithm's requirement is deterministically extended by
//! iterated hashing, so both peers agree on the bytes without extra negotiation.

use definitions::{algorithms::KeyExchangeHashFunction, write};
use num_bigint::BigInt;

/// References the buffers where the keys of one direction are generated.
pub(super) struct DirectionKeys<'a> {
    /// The initialization vector for the encryption algorithm.
    pub(super) iv: &'a mut [u8],
    /// The key for the encryption algorithm.
    pub(super) encryption_key: &'a mut [u8],
    /// The key for the MAC algorithm.
    pub(super) mac_key: &'a mut [u8],
}

/// The derivation letters for the client to server direction.
///
/// The letters are `"A"`, `"C"` and `"E"` for the IV, encryption key and MAC key,
/// according to section 7.2 of RFC 4253.
pub(super) const CLIENT_TO_SERVER_LETTERS: [u8; 3] = [b'A', b'C', b'E'];

/// The derivation letters for the server to client direction.
///
/// The letters are `"B"`, `"D"` and `"F"` for the IV, encryption key and MAC key,
/// according to section 7.2 of RFC 4253.
pub(super) const SERVER_TO_CLIENT_LETTERS: [u8; 3] = [b'B', b'D', b'F'];

/// Fills the key buffers of one direction.
///
/// Each key starts as `K1 = HASH(shared_secret || exchange_hash || letter || session_id)`
/// and is extended by `Ki = HASH(shared_secret || exchange_hash || K1 || ... || Ki-1)`
/// until the needed length is reached.
pub(super) fn expand_direction_keys(
    keys: &mut DirectionKeys,
    letters: [u8; 3],
    hash_fn: KeyExchangeHashFunction,
    shared_secret: &BigInt,
    exchange_hash: &[u8],
    session_id: &[u8],
) {
    let (letter_offset, mut initial_key_vec) = {
        let mut key_vec = Vec::new();

        write::mpint(shared_secret, &mut key_vec).expect("vec writes don't fail");
        key_vec.reserve_exact(exchange_hash.len() + 1 + session_id.len());
        key_vec.extend(exchange_hash);

        let letter_offset = key_vec.len();

        // This will be replaced with the correct letter for the given key.
        key_vec.extend(b"X");
        key_vec.extend(session_id);

        (letter_offset, key_vec)
    };

    let mut extension_vec = None;

    let mut expand_into_slice = |slice: &mut [u8], letter: u8| {
        initial_key_vec[letter_offset] = letter;

        let mut key = hash_fn(&initial_key_vec);
        extend_key(
            &mut key,
            &mut extension_vec,
            shared_secret,
            exchange_hash,
            slice.len(),
            hash_fn,
        );

        slice.copy_from_slice(&key[..slice.len()]);
    };

    expand_into_slice(keys.iv, letters[0]);
    expand_into_slice(keys.encryption_key, letters[1]);
    expand_into_slice(keys.mac_key, letters[2]);
}

/// Extends the given key to the needed size.
fn extend_key(
    key: &mut Vec<u8>,
    extension_vec: &mut Option<Vec<u8>>,
    shared_secret: &BigInt,
    exchange_hash: &[u8],
    len: usize,
    hash_fn: KeyExchangeHashFunction,
) {
    if key.len() >= len {
        return;
    }

    let key_vec = extension_vec.get_or_insert_with(|| {
        let mut vec = Vec::new();

        write::mpint(shared_secret, &mut vec).expect("vec writes don't fail");
        vec.extend(exchange_hash);

        vec
    });

    let start_len = key_vec.len();

    key_vec.extend(&key[..]);

    while key.len() < len {
        let hash = hash_fn(&key_vec);
        key.extend(&hash);
        key_vec.extend(&hash);
    }

    key_vec.truncate(start_len);
}
