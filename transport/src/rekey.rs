//! Tracks when a connection has to be re-keyed.

/// The traffic limits after which a new key exchange is triggered.
///
/// The limits apply per direction and are reset by every completed key exchange.
/// Crossing either limit in either direction starts a transparent re-key before the next
/// user packet is processed.
///
/// The exact numbers are a safety margin, not an interoperability constant: any choice
/// is valid as long as a re-key happens well before the negotiated cipher reaches its
/// safe usage bound.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RekeyLimits {
    /// The number of packets after which a re-key is triggered.
    pub max_packets: u64,
    /// The number of transmitted bytes after which a re-key is triggered.
    pub max_bytes: u64,
}

impl RekeyLimits {
    /// Returns the limits to use for a cipher with the given block size.
    ///
    /// Ciphers with small blocks leak more per processed byte, so they re-key earlier.
    pub fn for_block_size(block_size: usize) -> RekeyLimits {
        let max_bytes = if block_size >= 16 {
            // 1 GiB
            1 << 30
        } else {
            // 256 MiB
            1 << 28
        };

        RekeyLimits {
            max_packets: 1 << 28,
            max_bytes,
        }
    }
}

impl Default for RekeyLimits {
    fn default() -> RekeyLimits {
        RekeyLimits::for_block_size(16)
    }
}

/// A snapshot of the traffic counters of one direction.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub(crate) struct Traffic {
    /// The number of packets processed in this direction.
    pub(crate) packets: u64,
    /// The number of bytes processed in this direction.
    pub(crate) bytes: u64,
}

impl Traffic {
    /// Returns `true` if the traffic since `baseline` exceeds `limits`.
    pub(crate) fn exceeds(&self, baseline: Traffic, limits: RekeyLimits) -> bool {
        self.packets - baseline.packets > limits.max_packets
            || self.bytes - baseline.bytes > limits.max_bytes
    }
}
