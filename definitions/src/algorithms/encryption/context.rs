//! Defines the context used for encryption and decryption of packets.

/// Describes the encryption or decryption context of a packet.
#[derive(Debug)]
pub struct CipherContext<'packet> {
    /// The sequence number that the packet has.
    packet_sequence_number: u32,
    /// The data of the packet that is being processed.
    data: &'packet mut [u8],
    /// The offset of the first byte in the data that is not yet processed.
    processed_until: usize,
}

impl CipherContext<'_> {
    /// Creates a new `CipherContext` from the given data.
    pub fn new(
        packet_sequence_number: u32,
        data: &mut [u8],
        processed_until: usize,
    ) -> CipherContext {
        CipherContext {
            packet_sequence_number,
            data,
            processed_until,
        }
    }

    /// Returns the sequence number of the packet that is being processed.
    pub fn packet_sequence_number(&self) -> u32 {
        self.packet_sequence_number
    }

    /// Returns the part of the packet that was already processed.
    ///
    /// During encryption this is always empty, as encryption takes place in one pass.
    /// During decryption this is the part of the packet that was already decrypted.
    pub fn processed_part(&self) -> &[u8] {
        &self.data[..self.processed_until]
    }

    /// Returns the part of the packet that has yet to be processed.
    ///
    /// During encryption this is the entire packet, as encryption takes place in one
    /// pass. During decryption this is the part of the packet that still needs to be
    /// decrypted.
    pub fn unprocessed_part(&mut self) -> &mut [u8] {
        &mut self.data[self.processed_until..]
    }

    /// Returns a reference to both the processed and the unprocessed part of the packet.
    pub fn all_data(&self) -> &[u8] {
        self.data
    }

    /// Returns mutable access to all packet data in the context.
    ///
    /// **The processed part must be restored to its state at call time before the
    /// encryption or decryption function returns.**
    ///
    /// Some algorithms, such as "chacha20poly1305@openssh.com", require access to the
    /// whole packet as it appeared on the wire for their tag calculation, which is what
    /// this method exists for.
    pub fn all_data_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Marks that an additional `num_bytes` have been processed.
    pub fn mark_processed(&mut self, num_bytes: usize) {
        self.processed_until += num_bytes;
    }
}
