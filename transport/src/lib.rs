//! Provides an abstraction for the SSH transport layer, from the client side.
//!
//! This library turns a raw byte stream into a sequence of authenticated, optionally
//! encrypted and compressed protocol packets. It performs the version exchange,
//! negotiates algorithms, runs the key exchange, re-keys transparently when traffic
//! limits are reached and hides all transport internal messages from its users.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

use definitions::CryptoRngCore;
use rand::{rngs::StdRng, SeedableRng as _};
use std::{fmt, time::Duration};

use crate::protocol::{HandlerConfig, ProtocolHandler};

pub use crate::{
    algorithms::{ConnectionAlgorithms, NegotiatedAlgorithms, OneWayPacketAlgorithms},
    input::InputStream,
    output::OutputStream,
    rekey::RekeyLimits,
    verifier::{AcceptAllVerifier, HostKeyVerifier, Verdict},
    version::VersionInformation,
};

mod algorithms;
mod input;
mod output;
mod protocol;
mod rekey;
#[cfg(test)]
mod test_helpers;
mod verifier;
mod version;

pub mod constants;
pub mod errors;
pub mod padding;

use errors::{BuildError, CommunicationError, ServiceRequestError};

static_assertions::assert_cfg!(
    not(target_pointer_width = "16"),
    "16-bit platforms are not supported by skiff."
);

/// A secured transport session with an SSH server.
///
/// A session is created through a [`Builder`] and becomes usable once the version
/// exchange and the initial key exchange have completed. It owns the underlying socket
/// exclusively; everything above it (like the channel multiplexer) requests reads and
/// writes through it and never touches the socket directly.
pub struct Session<Input: InputStream, Output: OutputStream> {
    /// The handler for the transport layer protocol.
    protocol_handler: ProtocolHandler<Input, Output>,
}

impl<Input: InputStream, Output: OutputStream> fmt::Debug for Session<Input, Output> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Session {{ /* fields omitted */ }}")
    }
}

impl<Input: InputStream, Output: OutputStream> Session<Input, Output> {
    /// Receives the next packet from the peer, waiting for input as needed.
    ///
    /// Transport level packets are never surfaced here: disconnects become terminal
    /// errors, ignore and debug messages are swallowed and a peer initiated re-key is
    /// handled transparently.
    pub async fn next_packet(&mut self) -> Result<Vec<u8>, CommunicationError> {
        self.protocol_handler.next_user_packet().await
    }

    /// Receives the next packet from the peer, bounded by a deadline.
    ///
    /// A deadline overrun leaves the session usable; partially received packets stay
    /// buffered and complete on a later call.
    pub async fn next_packet_timeout(
        &mut self,
        deadline: Duration,
    ) -> Result<Vec<u8>, CommunicationError> {
        match tokio::time::timeout(deadline, self.protocol_handler.next_user_packet()).await {
            Ok(result) => result,
            Err(_) => Err(CommunicationError::ReadTimeout),
        }
    }

    /// Receives the next packet if one is already buffered, without waiting for input.
    pub async fn try_next_packet(&mut self) -> Result<Option<Vec<u8>>, CommunicationError> {
        self.protocol_handler.try_next_user_packet().await
    }

    /// Waits until more input arrived from the peer and buffers it.
    ///
    /// This is the readiness point for cooperative drivers: await it, then drain
    /// buffered packets with [`Self::try_next_packet`].
    pub async fn read_more(&mut self) -> Result<usize, CommunicationError> {
        self.protocol_handler.read_more().await
    }

    /// Sends a packet with the given data to the peer.
    ///
    /// # Packet length
    /// Receivers of SSH packets are only required to be able to handle a payload length
    /// of 32768, so first check that the receiver is able to handle larger packets, if
    /// you want to send a packet with `data.len() > 32768`.
    ///
    /// # Panics
    /// This function may panic if the total packet length does not fit into a `u32`.
    pub async fn send_packet(&mut self, data: &[u8]) -> Result<(), CommunicationError> {
        self.protocol_handler.send_user_packet(data).await
    }

    /// Re-keys the connection.
    ///
    /// This is also done transparently when the traffic limits are reached.
    pub async fn rekey(&mut self) -> Result<(), CommunicationError> {
        self.protocol_handler.rekey().await
    }

    /// Sends a service request to the peer.
    pub async fn service_request(&mut self, service: &[u8]) -> Result<(), ServiceRequestError> {
        self.protocol_handler.service_request(service).await
    }

    /// Returns the session identifier.
    ///
    /// This is the exchange hash of the first key exchange and stays fixed for the
    /// lifetime of the connection, even across re-keys.
    pub fn session_id(&self) -> &[u8] {
        self.protocol_handler
            .session_id()
            .expect("the initial key exchange has completed")
    }

    /// Returns the version information announced by the peer.
    pub fn peer_version_info(&self) -> &VersionInformation {
        self.protocol_handler.peer_version_info()
    }

    /// Marks the connection as authenticated.
    ///
    /// This is called by the authentication layer on success and engages delayed
    /// compression algorithms such as `zlib@openssh.com`.
    pub fn mark_authenticated(&mut self) {
        self.protocol_handler.mark_authenticated();
    }
}

/// A builder for a [`Session`].
pub struct Builder<Input: InputStream, Output: OutputStream> {
    /// The source where the input for the SSH transport layer will come from.
    input: Input,
    /// The sink where the output of the SSH transport layer will be written to.
    output: Output,
    /// The version information for the SSH transport session.
    version_info: Option<VersionInformation>,
    /// The algorithms available to use during communication.
    connection_algorithms: ConnectionAlgorithms,
    /// The distribution used for packet padding lengths.
    padding_length_distribution: Option<Box<padding::PaddingLengthDistribution>>,
    /// The random number generator used for any required randomness.
    rng: Option<Box<dyn CryptoRngCore>>,
    /// Whether to allow "none" algorithms for encryption and MAC.
    allow_none_algorithms: bool,
    /// The host key trust decision.
    verifier: Box<dyn HostKeyVerifier>,
    /// The identity of the peer, as passed to the verifier.
    peer_identity: String,
    /// A caller supplied override for the re-key limits.
    rekey_limits: Option<RekeyLimits>,
    /// The deadline for the banner and for the initial key exchange.
    handshake_timeout: Option<Duration>,
}

impl<Input: InputStream, Output: OutputStream> fmt::Debug for Builder<Input, Output> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Builder")
            .field("version_info", &self.version_info)
            .field("connection_algorithms", &self.connection_algorithms)
            .field("allow_none_algorithms", &self.allow_none_algorithms)
            .field("peer_identity", &self.peer_identity)
            .field("rekey_limits", &self.rekey_limits)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

impl<Input: InputStream, Output: OutputStream> Builder<Input, Output> {
    /// Creates a new builder with sensible default values.
    ///
    /// Note that the default host key verifier accepts every key. Clients that are not
    /// deliberately opportunistic should replace it with [`Self::verifier`].
    pub fn new(input: Input, output: Output) -> Self {
        Builder {
            input,
            output,
            version_info: None,
            connection_algorithms: Default::default(),
            padding_length_distribution: None,
            rng: None,
            allow_none_algorithms: false,
            verifier: Box::new(AcceptAllVerifier::new()),
            peer_identity: String::new(),
            rekey_limits: None,
            handshake_timeout: None,
        }
    }

    /// Sets the version information announced to the peer.
    pub fn version_info(mut self, version_info: VersionInformation) -> Self {
        self.version_info = Some(version_info);
        self
    }

    /// Replaces the available algorithms.
    pub fn algorithms(mut self, connection_algorithms: ConnectionAlgorithms) -> Self {
        self.connection_algorithms = connection_algorithms;
        self
    }

    /// Returns mutable access to the available algorithms.
    pub fn algorithms_mut(&mut self) -> &mut ConnectionAlgorithms {
        &mut self.connection_algorithms
    }

    /// Sets the distribution for random padding lengths.
    ///
    /// The returned value of the function is the number of extra "padding blocks",
    /// which consist of a number of bytes equal to the cipher block size or 8,
    /// whichever is higher. Values that would overflow the padding length field are
    /// cropped, so any returned value is valid.
    pub fn padding_length_distribution<D>(mut self, distribution: D) -> Self
    where
        D: FnMut(&mut dyn CryptoRngCore) -> u8 + 'static,
    {
        self.padding_length_distribution = Some(Box::new(distribution));
        self
    }

    /// Sets the random number generator.
    pub fn rng<NewRng: CryptoRngCore + 'static>(mut self, rng: NewRng) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Sets if "none" MAC and encryption algorithms should be allowed.
    ///
    /// They are disabled by default and it is strongly encouraged to keep them
    /// disabled.
    pub fn allow_none_algorithms(mut self, allow: bool) -> Self {
        self.allow_none_algorithms = allow;
        self
    }

    /// Sets the host key verifier.
    pub fn verifier<V: HostKeyVerifier + 'static>(mut self, verifier: V) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    /// Sets the identity of the peer, as passed to the host key verifier.
    ///
    /// This is typically the `host:port` pair the connection was dialed to.
    pub fn peer_identity<S: Into<String>>(mut self, peer_identity: S) -> Self {
        self.peer_identity = peer_identity.into();
        self
    }

    /// Overrides the traffic limits that trigger a transparent re-key.
    ///
    /// Without an override the limits are derived from the negotiated cipher's block
    /// size.
    pub fn rekey_limits(mut self, rekey_limits: RekeyLimits) -> Self {
        self.rekey_limits = Some(rekey_limits);
        self
    }

    /// Bounds the wait for the server identification and for the initial key exchange.
    ///
    /// The two phases time out separately, each with this deadline, and report distinct
    /// errors so callers can tell "never got a banner" from "handshake stalled".
    pub fn handshake_timeout(mut self, deadline: Duration) -> Self {
        self.handshake_timeout = Some(deadline);
        self
    }

    /// Creates a [`Session`] from the configured builder.
    ///
    /// This performs the version exchange and the initial key exchange before
    /// returning.
    pub async fn build(self) -> Result<Session<Input, Output>, BuildError> {
        if let Some(role) = self.connection_algorithms.empty_algorithm_role() {
            return Err(BuildError::EmptyAlgorithmRole(role));
        }

        if let Some(role) = self.connection_algorithms.required_none_missing() {
            return Err(BuildError::RequiredNoneAlgorithmMissing(role));
        }

        let config = HandlerConfig {
            version_info: self.version_info.unwrap_or_default(),
            connection_algorithms: self.connection_algorithms,
            allow_none_algorithms: self.allow_none_algorithms,
            rng: self
                .rng
                .unwrap_or_else(|| Box::new(StdRng::from_entropy())),
            padding_length_distribution: self.padding_length_distribution,
            verifier: self.verifier,
            peer_identity: self.peer_identity,
            rekey_limits: self.rekey_limits,
            handshake_timeout: self.handshake_timeout,
        };

        ProtocolHandler::new(self.input, self.output, config)
            .await
            .map(|protocol_handler| Session { protocol_handler })
            .map_err(BuildError::Initialization)
    }
}
