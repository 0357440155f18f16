//! Handles the input side of the SSH connection.

use definitions::{algorithms::IntegrityError, ParseError, ParsedValue};
use std::{
    borrow::Cow,
    cmp::{max, min},
};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    algorithms::PacketAlgorithms,
    constants::PACKET_LEN_SIZE,
    errors::{CommunicationError, IncomingPacketError},
    rekey::Traffic,
    version::VersionInformation,
};

use definitions::algorithms::{internal::EncryptionAlgorithmEntry, CipherContext};

pub(crate) use self::parse::ParsedPacket;

mod parse;

/// Make some sanity checks to verify that the internal state is valid.
macro_rules! assert_valid_state {
    ($self:ident) => {
        debug_assert!($self.parsed_until <= $self.decrypted_until);
        debug_assert!($self.decrypted_until <= $self.initialized_until);
        debug_assert!($self.initialized_until <= $self.data.len());
    };
}

/// Handle the result of a parsing operation in a quick way.
macro_rules! parse {
    ($parser_call:expr) => {
        match $parser_call {
            Ok(val) => val,
            Err(ParseError::Incomplete) => return Ok(None),
            Err(ParseError::Invalid) => return Err(crate::errors::IncomingPacketError::Format),
        }
    };
}

/// The default size for data reads.
pub(crate) const READ_SIZE: usize = 0x1000;

/// A trait to represent the input to the SSH transport layer.
pub trait InputStream: AsyncRead + Unpin {}

impl<T: AsyncRead + Unpin> InputStream for T {}

/// The per direction counters that read packets advance.
#[derive(Debug, PartialEq, Eq, Default)]
struct InputCounters {
    /// The number of packets that have arrived (modulo 32 bits).
    sequence_number: u32,
    /// The traffic seen so far, for re-key detection.
    traffic: Traffic,
}

/// Handles input transformations and buffering.
///
/// This is the receiving half of the binary packet protocol: a re-entrant state machine
/// that buffers raw bytes, decrypts them as far as the cipher allows and hands out one
/// verified packet at a time. All state survives partial reads, so the buffer can be
/// fed a single byte at a time and still produce the same packets.
#[derive(Debug)]
pub(crate) struct InputBuffer {
    /// The underlying buffer.
    data: Vec<u8>,
    /// The index of the first byte that has not yet been parsed.
    parsed_until: usize,
    /// The index of the first byte that has not yet been decrypted.
    decrypted_until: usize,
    /// The index of the first byte that has not yet been initialized.
    initialized_until: usize,
    /// The counters advanced by each read packet.
    counters: InputCounters,
}

impl InputBuffer {
    /// Creates a new empty input buffer.
    pub(crate) fn new() -> InputBuffer {
        InputBuffer {
            data: Vec::new(),
            parsed_until: 0,
            decrypted_until: 0,
            initialized_until: 0,
            counters: InputCounters::default(),
        }
    }

    /// Returns the sequence number of the next expected packet.
    pub(crate) fn sequence_number(&self) -> u32 {
        self.counters.sequence_number
    }

    /// Returns the traffic processed so far.
    pub(crate) fn traffic(&self) -> Traffic {
        self.counters.traffic
    }

    /// Overrides the next expected sequence number.
    #[cfg(test)]
    pub(crate) fn set_sequence_number(&mut self, sequence_number: u32) {
        self.counters.sequence_number = sequence_number;
    }

    /// Reserves at least `size` bytes for input and returns access to them.
    fn reserve(&mut self, size: usize) -> &mut [u8] {
        assert_valid_state!(self);

        let additional_capacity = self.data.len() - self.initialized_until;
        let space_needed = size.saturating_sub(additional_capacity);

        self.data.resize(self.data.len() + space_needed, 0);

        assert_valid_state!(self);

        &mut self.data[self.initialized_until..]
    }

    /// Reads more data from the source into the buffer.
    pub(crate) async fn read_more_data<I: InputStream>(
        &mut self,
        input: &mut I,
    ) -> Result<usize, CommunicationError> {
        assert_valid_state!(self);

        let buf = self.reserve(READ_SIZE);

        let size = input.read(buf).await.map_err(CommunicationError::Io)?;

        if size == 0 {
            return Err(CommunicationError::EndOfInput);
        }

        self.initialized_until += size;

        assert_valid_state!(self);

        Ok(size)
    }

    /// Parses the version information passed during initialization.
    ///
    /// This should not be called again, after the first `Ok(Some(_))` was returned.
    pub(crate) fn parse_initialization(
        &mut self,
    ) -> Result<Option<(VersionInformation, Vec<u8>)>, IncomingPacketError> {
        assert_valid_state!(self);

        debug_assert_eq!(self.parsed_until, 0);
        debug_assert_eq!(self.decrypted_until, 0);

        let ParsedValue {
            value: (info, line, bytes_read),
            ..
        } = parse!(parse::initialization(
            &self.data[..self.initialized_until]
        ));

        self.parsed_until = bytes_read;
        self.decrypted_until = bytes_read;

        let line = line.to_vec();

        self.remove_old_data();

        assert_valid_state!(self);

        Ok(Some((info, line)))
    }

    /// Advances the decryption of data to the index `to`.
    ///
    /// If there isn't enough data available the data is decrypted as far as possible.
    /// Returns whether progress was made.
    fn decrypt(
        &mut self,
        to: usize,
        algorithm: &mut EncryptionAlgorithmEntry,
    ) -> Result<bool, IntegrityError> {
        assert_valid_state!(self);

        let current_packet = &mut self.data[self.parsed_until..min(to, self.initialized_until)];
        let context = CipherContext::new(
            self.counters.sequence_number,
            current_packet,
            self.decrypted_until - self.parsed_until,
        );

        let decrypted_at_start = self.decrypted_until;

        self.decrypted_until += algorithm.decrypt_packet(context)?;

        assert_valid_state!(self);

        Ok(self.decrypted_until > decrypted_at_start)
    }

    /// Decrypts the next packet as far as possible.
    ///
    /// Returns `Ok(true)` if the packet is fully decrypted and its MAC or tag has
    /// arrived, so it is ready to be parsed.
    fn decrypt_packet(
        &mut self,
        dec_algorithm: &mut EncryptionAlgorithmEntry,
        mac_len: usize,
    ) -> Result<bool, IntegrityError> {
        assert_valid_state!(self);

        let block_size = dec_algorithm.cipher_block_size;
        let minimum_packet_length = max(block_size, 8);

        let packet_length = loop {
            if let Some(len) = self.parse_packet_length() {
                break len;
            }

            match self.decrypt(self.parsed_until + minimum_packet_length, dec_algorithm)? {
                true => continue,
                false => return Ok(false),
            }
        };

        // Tag computing ciphers need the tag in view to finish decrypting.
        let optional_tag_len = dec_algorithm.tag_size.unwrap_or(0);

        while self.decrypted_until < self.parsed_until + PACKET_LEN_SIZE + packet_length {
            match self.decrypt(
                self.parsed_until + PACKET_LEN_SIZE + packet_length + optional_tag_len,
                dec_algorithm,
            )? {
                true => continue,
                false => return Ok(false),
            }
        }

        assert_valid_state!(self);

        Ok(self.initialized_until >= self.parsed_until + PACKET_LEN_SIZE + packet_length + mac_len)
    }

    /// Parses the length of the current packet, if it is already decrypted.
    fn parse_packet_length(&self) -> Option<usize> {
        match parse::packet_length(&self.data[self.parsed_until..self.decrypted_until]) {
            Ok(ParsedValue { value: length, .. }) => Some(length as usize),
            Err(ParseError::Incomplete) => None,
            Err(ParseError::Invalid) => unreachable!(),
        }
    }

    /// Parses the next available packet, if possible.
    ///
    /// Returns the parsed packet along with the input counters for later access if
    /// enough data is available.
    fn parse_packet(
        &mut self,
        dec_algorithm: &mut EncryptionAlgorithmEntry,
        mac_len: usize,
    ) -> Result<Option<(ParsedPacket<'_>, &mut InputCounters)>, IncomingPacketError> {
        assert_valid_state!(self);

        if !self
            .decrypt_packet(dec_algorithm, mac_len)
            .map_err(IncomingPacketError::Mac)?
        {
            return Ok(None);
        }

        // It's safe to unwrap here since the length must be parsable after the
        // decryption of a packet.
        let packet_length = self.parse_packet_length().unwrap();

        let packet_end = self.parsed_until + PACKET_LEN_SIZE + packet_length + mac_len;

        let ParsedValue { value: packet, .. } = parse!(parse::packet(
            &self.data[self.parsed_until..packet_end],
            mac_len
        ));

        self.decrypted_until = packet_end;
        self.parsed_until = self.decrypted_until;

        assert_valid_state!(self);

        Ok(Some((packet, &mut self.counters)))
    }

    /// Shrinks the input to the smallest possible size.
    fn remove_old_data(&mut self) {
        assert_valid_state!(self);

        self.data.drain(..self.parsed_until);

        self.decrypted_until -= self.parsed_until;
        self.initialized_until -= self.parsed_until;
        self.parsed_until = 0;

        assert_valid_state!(self);
    }

    /// Reads the next packet from the buffer and returns its payload.
    ///
    /// If the buffer does not contain all of the next input packet, `Ok(None)` is
    /// returned and all internal state is preserved for the next call.
    pub(crate) fn read_packet(
        &mut self,
        mut algorithms: PacketAlgorithms<'_>,
    ) -> Result<Option<Cow<'_, [u8]>>, IncomingPacketError> {
        self.remove_old_data();

        let mac_len = algorithms.mac_len();

        let (packet, counters) = match self.parse_packet(algorithms.encryption, mac_len)? {
            Some(result) => result,
            None => return Ok(None),
        };

        verify_packet(&packet, counters.sequence_number, &mut algorithms)?;

        counters.sequence_number = counters.sequence_number.wrapping_add(1);
        counters.traffic.packets += 1;
        counters.traffic.bytes += (packet.whole_packet.len() + mac_len) as u64;

        if algorithms.compression_active {
            algorithms
                .compression
                .decompress(Cow::Borrowed(packet.payload))
                .map(Some)
                .map_err(IncomingPacketError::Compression)
        } else {
            Ok(Some(Cow::Borrowed(packet.payload)))
        }
    }
}

/// Verifies that a parsed packet is valid.
///
/// This function verifies that
/// - the MAC is correct (if that wasn't already checked during decryption)
/// - the padding length is valid given the alignment constraints
fn verify_packet(
    packet: &ParsedPacket,
    packet_sequence_number: u32,
    algorithms: &mut PacketAlgorithms<'_>,
) -> Result<(), IncomingPacketError> {
    if let Some(mac_algorithm) = &mut algorithms.mac {
        mac_algorithm
            .verify(packet.whole_packet, packet_sequence_number, packet.mac)
            .map_err(IncomingPacketError::Mac)?;
    }

    // The unencrypted length field of tag computing ciphers is excluded from the
    // alignment.
    let len_modifier = if algorithms.encryption.computes_tag() {
        4
    } else {
        0
    };
    if (packet.whole_packet.len() - len_modifier) % max(algorithms.encryption.cipher_block_size, 8)
        != 0
    {
        return Err(IncomingPacketError::Padding);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{algorithms::ConnectionAlgorithms, test_helpers::FakeNetworkInput};

    #[test]
    fn decrypt_packet_none() {
        let mut input_buffer = InputBuffer::new();
        let mut dec_algorithm = algorithms::encryption::None::new().into();

        let payload1 = b"some more testing data as payload";
        let padding1 = [0x21u8; 0x12];

        let payload2 = b"testpayload";
        let padding2 = [0x42u8; 0x08];

        let mut packet_data = Vec::new();

        packet_data.extend([0x00, 0x00, 0x00, 0x34, 0x12]);
        packet_data.extend(payload1);
        packet_data.extend(padding1);

        let midpoint = packet_data.len();

        packet_data.extend([0x00, 0x00, 0x00, 0x14, 0x08]);
        packet_data.extend(payload2);
        packet_data.extend(padding2);

        {
            let buf = input_buffer.reserve(packet_data.len());

            buf[..10].copy_from_slice(&packet_data[..10]);

            input_buffer.initialized_until += 10;
        }

        assert!(matches!(
            input_buffer.parse_packet(&mut dec_algorithm, 0),
            Ok(None)
        ));
        assert_eq!(input_buffer.parsed_until, 0);
        assert_eq!(input_buffer.decrypted_until, 10);

        {
            let buf = input_buffer.reserve(0);

            buf[..46].copy_from_slice(&packet_data[10..56]);

            input_buffer.initialized_until += 46;
        }

        {
            let (packet, _) = input_buffer
                .parse_packet(&mut dec_algorithm, 0)
                .unwrap()
                .unwrap();
            assert_eq!(packet.payload, payload1);
            assert_eq!(packet.padding, &padding1);
            assert_eq!(packet.whole_packet, &packet_data[..midpoint]);
            assert_eq!(packet.mac, &[] as &[u8]);
        }
        assert_eq!(input_buffer.parsed_until, 56);
        assert_eq!(input_buffer.decrypted_until, 56);

        input_buffer.remove_old_data();
        assert_eq!(input_buffer.parsed_until, 0);
        assert_eq!(input_buffer.decrypted_until, 0);

        {
            let buf = input_buffer.reserve(0);

            let rest = packet_data.len() - 56;
            buf[..rest].copy_from_slice(&packet_data[56..]);

            input_buffer.initialized_until += rest;
        }

        {
            let (packet, _) = input_buffer
                .parse_packet(&mut dec_algorithm, 0)
                .unwrap()
                .unwrap();
            assert_eq!(packet.payload, payload2);
            assert_eq!(packet.whole_packet, &packet_data[midpoint..]);
        }

        assert!(matches!(
            input_buffer.parse_packet(&mut dec_algorithm, 0),
            Ok(None)
        ));
    }

    #[test]
    fn initialization_and_packets() {
        let packet_data = b"SSH is a protocol\r\nSSH-2.0-test@1.0\r\n\x00\x00\x00\x14\x08testpayload\x73\xae\xf8\x03\x7d\x38\x91\x10\x00\x00\x00\x14\x08othertester\x74\xaf\xf9\x04\x7e\x39\x92\x11".to_vec();
        let packet_len = packet_data.len();

        let mut fake_input = FakeNetworkInput::new(packet_data, packet_len);

        let mut input_buffer = InputBuffer::new();

        let mut connection_algorithms = ConnectionAlgorithms::default();

        futures::executor::block_on(async {
            assert_eq!(
                input_buffer.read_more_data(&mut fake_input).await.unwrap(),
                packet_len
            );
            assert_eq!(
                input_buffer.parse_initialization().unwrap().unwrap(),
                (
                    VersionInformation::new("test@1.0").unwrap(),
                    b"SSH-2.0-test@1.0".to_vec()
                )
            );

            assert_eq!(
                input_buffer
                    .read_packet(connection_algorithms.incoming(false))
                    .unwrap()
                    .unwrap(),
                b"testpayload".to_vec()
            );

            assert_eq!(
                input_buffer
                    .read_packet(connection_algorithms.incoming(false))
                    .unwrap()
                    .unwrap(),
                b"othertester".to_vec()
            );

            assert_eq!(input_buffer.sequence_number(), 2);
            assert_eq!(input_buffer.traffic().packets, 2);

            assert!(matches!(
                input_buffer.read_packet(connection_algorithms.incoming(false)),
                Ok(None)
            ));
        });
    }

    /// Feeding the buffer one byte at a time yields exactly the same packets as feeding
    /// everything at once.
    #[test]
    fn byte_at_a_time_resilience() {
        let packet_data = b"SSH-2.0-test@1.0\r\n\x00\x00\x00\x14\x08testpayload\x73\xae\xf8\x03\x7d\x38\x91\x10\x00\x00\x00\x14\x08othertester\x74\xaf\xf9\x04\x7e\x39\x92\x11".to_vec();
        let packet_len = packet_data.len();

        // Deliver one byte per read.
        let mut fake_input = FakeNetworkInput::new(packet_data, 1);

        let mut input_buffer = InputBuffer::new();

        let mut connection_algorithms = ConnectionAlgorithms::default();

        futures::executor::block_on(async {
            let mut packets = Vec::new();
            let mut initialized = false;

            for _ in 0..packet_len {
                assert_eq!(
                    input_buffer.read_more_data(&mut fake_input).await.unwrap(),
                    1
                );

                if !initialized {
                    if let Some(parsed) = input_buffer.parse_initialization().unwrap() {
                        assert_eq!(parsed.1, b"SSH-2.0-test@1.0".to_vec());
                        initialized = true;
                    } else {
                        continue;
                    }
                }

                while let Some(packet) = input_buffer
                    .read_packet(connection_algorithms.incoming(false))
                    .unwrap()
                {
                    packets.push(packet.to_vec());
                }
            }

            assert_eq!(
                packets,
                vec![b"testpayload".to_vec(), b"othertester".to_vec()]
            );
        });
    }

    #[test]
    fn invalid_packet_format() {
        let packet_data =
            b"SSH-2.0-test@1.0\r\n\x00\x00\x00\x0e\x02testpayload\x73\xae".to_vec();
        let packet_len = packet_data.len();

        let mut fake_input = FakeNetworkInput::new(packet_data, packet_len);

        let mut input_buffer = InputBuffer::new();

        let mut connection_algorithms = ConnectionAlgorithms::default();

        futures::executor::block_on(async {
            assert_eq!(
                input_buffer.read_more_data(&mut fake_input).await.unwrap(),
                packet_len
            );
            input_buffer.parse_initialization().unwrap().unwrap();

            assert!(matches!(
                input_buffer.read_packet(connection_algorithms.incoming(false)),
                Err(IncomingPacketError::Format)
            ));
        });
    }
}
