//! Defines all the errors that can occur in the transport layer.

pub use definitions::{
    algorithms::{
        AlgorithmCategory, AlgorithmRole, IntegrityError, KeyExchangeAlgorithmError,
    },
    ParseError,
};

use std::{error::Error, io};

use crate::version::VersionInformation;

/// There was an error during communication.
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    /// The input reached its end.
    ///
    /// No more packets will be received after this error.
    #[error("end of input reached")]
    EndOfInput,
    /// There was an IO error while sending or receiving a packet.
    #[error("an io error occurred: {0}")]
    Io(io::Error),
    /// A received packet had an invalid format.
    #[error("a packet had an invalid format")]
    InvalidFormat,
    /// A received packet had an invalid padding.
    #[error("a packet had an invalid padding")]
    InvalidPadding,
    /// The MAC or AEAD tag on a received packet was invalid.
    ///
    /// The cipher state cannot be resynchronized after this, so the connection is
    /// unusable afterwards.
    #[error("a received packet failed its integrity check: {0}")]
    Integrity(IntegrityError),
    /// A received packet could not be decompressed successfully.
    #[error("decompression unsuccessful: {0}")]
    InvalidCompression(Box<dyn Error>),
    /// The peer terminated the connection with a disconnect message.
    ///
    /// This is a clean termination, not a crash.
    #[error("the peer disconnected (reason code {reason}): {message}")]
    Disconnect {
        /// The machine readable reason code of the disconnect.
        reason: u32,
        /// The human readable description sent by the peer.
        message: String,
    },
    /// A blocking read did not complete within its deadline.
    #[error("the read deadline was exceeded")]
    ReadTimeout,
    /// A transparent key re-exchange failed.
    ///
    /// The connection is unusable afterwards.
    #[error("re-keying the connection failed: {0}")]
    Rekey(Box<KeyExchangeProcedureError>),
    /// A protocol internal packet was sent by user code.
    ///
    /// All protocol internal packets are handled by the transport layer itself.
    #[error("you tried to send a transport layer packet, which is not supported")]
    ProtocolInternalPacketSent,
}

/// Describes errors that can occur while parsing a received packet.
#[derive(Debug, thiserror::Error)]
pub(crate) enum IncomingPacketError {
    /// The packet could not be parsed.
    #[error("the packet could not be parsed")]
    Format,
    /// The packet had an invalid padding.
    #[error("the packet had an invalid padding")]
    Padding,
    /// The packet failed its MAC or tag verification.
    #[error("the packet failed its integrity check")]
    Mac(IntegrityError),
    /// The packet could not be decompressed.
    #[error("the packet could not be decompressed")]
    Compression(Box<dyn Error>),
}

impl From<IncomingPacketError> for CommunicationError {
    fn from(err: IncomingPacketError) -> CommunicationError {
        match err {
            IncomingPacketError::Format => CommunicationError::InvalidFormat,
            IncomingPacketError::Padding => CommunicationError::InvalidPadding,
            IncomingPacketError::Mac(err) => CommunicationError::Integrity(err),
            IncomingPacketError::Compression(err) => CommunicationError::InvalidCompression(err),
        }
    }
}

/// There was an error during initialization.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    /// There was an error while sending or receiving a packet during initialization.
    #[error("a communication error occurred: {0}")]
    Communication(CommunicationError),
    /// The protocol version used by the connection partner is unsupported.
    #[error("the ssh version used by the other party (`{0}`) is not supported")]
    UnsupportedProtocolVersion(VersionInformation),
    /// The server identification line did not arrive within the configured deadline.
    #[error("the server did not send its identification in time")]
    BannerTimeout,
    /// The initial key exchange did not complete within the configured deadline.
    #[error("the handshake did not complete in time")]
    HandshakeTimeout,
    /// There was an error during the initial key exchange.
    ///
    /// # Note
    /// `CommunicationError`s that occur during the initial key exchange are reported
    /// as `InitializationError::Communication(_)` instead of
    /// `InitializationError::KeyExchange(KeyExchangeProcedureError::Communication(_))`.
    #[error("key exchange unsuccessful: {0}")]
    KeyExchange(KeyExchangeProcedureError),
}

/// There was an error during the key exchange procedure.
#[derive(Debug, thiserror::Error)]
pub enum KeyExchangeProcedureError {
    /// There was an error while sending or receiving a packet during key exchange.
    #[error("a communication error occurred: {0}")]
    Communication(CommunicationError),
    /// No algorithm was found for the given algorithm role.
    #[error("{0}: no suitable algorithm found")]
    NoAlgorithmFound(AlgorithmRole),
    /// There was an error while performing the key exchange algorithm.
    #[error("{0}")]
    KeyExchangeAlgorithmError(KeyExchangeAlgorithmError),
    /// A non key exchange related packet was received in the wrong moment.
    #[error("non key exchange packet received during key exchange")]
    NonKeyExchangePacketReceived,
    /// No `SSH_MSG_NEWKEYS` was received, when it was required.
    #[error("the other party did not acknowledge the key exchange")]
    NoNewkeysPacket,
    /// The host key verifier rejected the key presented by the server.
    #[error("the host key presented by the server was rejected")]
    HostKeyRejected,
    /// A key exchange packet had an invalid format.
    #[error("a key exchange packet had an invalid format")]
    InvalidFormat,
}

/// Describes the errors that can occur while building a transport session.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The given algorithm category had no algorithms in it.
    #[error("{0}: no algorithm found")]
    EmptyAlgorithmRole(AlgorithmRole),
    /// The given algorithm category requires a "none" algorithm, but none was given.
    #[error("{0}: no \"none\" algorithm found")]
    RequiredNoneAlgorithmMissing(AlgorithmRole),
    /// There was an error during the initialization of the connection.
    #[error("error initializing the connection: {0}")]
    Initialization(InitializationError),
}

/// Describes the errors that can occur while requesting a service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceRequestError {
    /// There was an error while sending or receiving a packet during the service request.
    #[error("a communication error occurred: {0}")]
    Communication(CommunicationError),
    /// The service request reply packet had an invalid format.
    #[error("the service request reply packet had an invalid format")]
    InvalidFormat,
    /// A service other than the requested one was accepted.
    #[error("a service other than the requested one was accepted: {0:?}")]
    WrongServiceAccepted(Vec<u8>),
}

/// The software version was illegal according to the specification.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum IllegalVersionError {
    /// The proposed version contained a non-ascii character.
    #[error("the version can only contain ascii characters")]
    NonAscii(usize),
    /// The proposed version contained a whitespace character.
    #[error("the version cannot contain whitespace characters")]
    Whitespace(usize),
    /// The proposed version contained a non printable character.
    #[error("the version can only contain printable characters")]
    NonPrintable(usize),
    /// The proposed version contained the `'-'` character.
    #[error("the version cannot contain the '-' character")]
    Minus(usize),
}

/// Contains the reason why an algorithm name is invalid.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum InvalidNameError {
    /// The name was empty.
    #[error("algorithm name was empty")]
    EmptyName,
    /// The name was too long.
    #[error("algorithm name was too long")]
    TooLong,
    /// The name contained more than one `'@'` character.
    #[error("algorithm name contained too many '@' symbols")]
    TooManyAtSymbols,
    /// The name contained a comma.
    #[error("algorithm name contained the ',' character")]
    CommaUsed,
    /// The name contained the given non ascii character.
    #[error("algorithm name contained a non ascii character: {0:?}")]
    NonAscii(char),
    /// The name contained the given whitespace character.
    #[error("algorithm name contained a whitespace character")]
    Whitespace(char),
    /// The name contained the given non printable character.
    #[error("algorithm name contained a non printable character")]
    NonPrintable(char),
    /// The domain in the algorithm name is not a valid domain.
    #[error("algorithm name contained an invalid domain")]
    InvalidDomain,
}
