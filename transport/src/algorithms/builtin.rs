//! Contains the built-in algorithm lists.

use definitions::algorithms::internal::{
    CompressionAlgorithmEntry, EncryptionAlgorithmEntry, HostKeyAlgorithmEntry,
    KeyExchangeAlgorithmEntry, MacAlgorithmEntry,
};

use super::list::{AddIn, AlgorithmList};

/// Builds an algorithm list from a registration function.
macro_rules! list_from {
    ($add_algorithms:expr) => {{
        #[allow(unused_mut)]
        let mut list = AlgorithmList::new();

        #[cfg(feature = "default-algorithms")]
        $add_algorithms(|entry| {
            list.add_raw(entry, AddIn::Back)
                .expect("built-in algorithm names are valid");
        });

        list
    }};
}

/// Returns a list of all built-in key exchange algorithms.
pub(crate) fn key_exchange_algorithms() -> AlgorithmList<KeyExchangeAlgorithmEntry> {
    list_from!(algorithms::key_exchange::add_algorithms)
}

/// Returns a list of all built-in host key algorithms.
pub(crate) fn host_key_algorithms() -> AlgorithmList<HostKeyAlgorithmEntry> {
    list_from!(algorithms::host_key::add_algorithms)
}

/// Returns a list of all built-in encryption algorithms.
pub(crate) fn encryption_algorithms() -> AlgorithmList<EncryptionAlgorithmEntry> {
    list_from!(algorithms::encryption::add_algorithms)
}

/// Returns a list of all built-in MAC algorithms.
pub(crate) fn mac_algorithms() -> AlgorithmList<MacAlgorithmEntry> {
    list_from!(algorithms::mac::add_algorithms)
}

/// Returns a list of all built-in compression algorithms.
pub(crate) fn compression_algorithms() -> AlgorithmList<CompressionAlgorithmEntry> {
    list_from!(algorithms::compression::add_algorithms)
}
