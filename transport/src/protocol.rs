//! Contains the logic that decides which packets are sent when.

use definitions::{
    algorithms::{
        internal::{HostKeyAlgorithmEntry, KeyExchangeAlgorithmEntry},
        KeyExchangeData, KeyExchangeResponse,
    },
    consts::{
        SSH_MSG_DEBUG, SSH_MSG_DISCONNECT, SSH_MSG_IGNORE, SSH_MSG_KEXINIT, SSH_MSG_NEWKEYS,
        SSH_MSG_SERVICE_ACCEPT, SSH_MSG_SERVICE_REQUEST, SSH_MSG_UNIMPLEMENTED,
    },
    parse, write, CryptoRngCore, MessageGroup, ParseError, ParsedValue,
};
use num_bigint::BigInt;
use std::{collections::VecDeque, time::Duration};

use crate::{
    algorithms::{AlgorithmNameList, ConnectionAlgorithms},
    errors::{
        CommunicationError, InitializationError, KeyExchangeProcedureError, ServiceRequestError,
    },
    input::{InputBuffer, InputStream},
    output::{OutputBuffer, OutputStream},
    padding::PaddingLengthDistribution,
    rekey::{RekeyLimits, Traffic},
    verifier::{HostKeyVerifier, Verdict},
    version::VersionInformation,
};

pub(crate) mod kex;

/// The configuration collected by the builder for a new protocol handler.
pub(crate) struct HandlerConfig {
    /// The version information to announce.
    pub(crate) version_info: VersionInformation,
    /// The algorithms available for the connection.
    pub(crate) connection_algorithms: ConnectionAlgorithms,
    /// Whether "none" encryption and MAC algorithms may be negotiated.
    pub(crate) allow_none_algorithms: bool,
    /// The random number generator used for the connection.
    pub(crate) rng: Box<dyn CryptoRngCore>,
    /// The distribution for extra padding lengths.
    pub(crate) padding_length_distribution: Option<Box<PaddingLengthDistribution>>,
    /// The host key trust decision.
    pub(crate) verifier: Box<dyn HostKeyVerifier>,
    /// The identity of the peer, as passed to the verifier.
    pub(crate) peer_identity: String,
    /// A caller supplied override for the re-key limits.
    pub(crate) rekey_limits: Option<RekeyLimits>,
    /// The deadline for the banner and for the initial key exchange.
    pub(crate) handshake_timeout: Option<Duration>,
}

/// Handles all protocol interactions at the transport layer level.
pub(crate) struct ProtocolHandler<Input: InputStream, Output: OutputStream> {
    /// The buffer for input from the peer.
    input_buffer: InputBuffer,
    /// The source of the input.
    input: Input,
    /// The buffer for output to the peer.
    output_buffer: OutputBuffer,
    /// The sink for the output.
    output: Output,
    /// The identification line sent by the peer.
    peer_identification: Vec<u8>,
    /// The version information sent by the peer.
    peer_version_info: VersionInformation,
    /// The session identifier.
    ///
    /// This is the exchange hash of the first key exchange and stays fixed for the
    /// lifetime of the connection, even across re-keys.
    session_id: Option<Vec<u8>>,
    /// The random number generator used for the connection.
    rng: Box<dyn CryptoRngCore>,
    /// The algorithms available to the connection.
    connection_algorithms: ConnectionAlgorithms,
    /// The local algorithm preference lists.
    ///
    /// This preserves the original preference order, while algorithms can still be
    /// temporarily moved out of the `ConnectionAlgorithms` during an exchange.
    algorithm_list: AlgorithmNameList<'static>,
    /// The local version information.
    version_info: VersionInformation,
    /// The host key trust decision.
    verifier: Box<dyn HostKeyVerifier>,
    /// The identity of the peer, as passed to the verifier.
    peer_identity: String,
    /// A caller supplied override for the re-key limits.
    rekey_limit_override: Option<RekeyLimits>,
    /// The traffic limits of the incoming direction.
    limits_in: RekeyLimits,
    /// The traffic limits of the outgoing direction.
    limits_out: RekeyLimits,
    /// The incoming traffic counter values at the last completed key exchange.
    baseline_in: Traffic,
    /// The outgoing traffic counter values at the last completed key exchange.
    baseline_out: Traffic,
    /// Whether the authentication layer reported success.
    ///
    /// Delayed compression algorithms only engage once this is set.
    authenticated: bool,
    /// User packets that arrived while a key exchange was in progress.
    ///
    /// They are delivered, in order, before any packet received after the exchange.
    pending_user_packets: VecDeque<Vec<u8>>,
}

impl<Input: InputStream, Output: OutputStream> ProtocolHandler<Input, Output> {
    /// Initializes the connection up until the first key exchange is performed.
    pub(crate) async fn new(
        input: Input,
        output: Output,
        config: HandlerConfig,
    ) -> Result<Self, InitializationError> {
        let mut input = input;
        let mut output = output;
        let mut input_buffer = InputBuffer::new();
        let mut output_buffer = OutputBuffer::new(config.padding_length_distribution);

        output_buffer.write_version_info(&config.version_info);
        output_buffer
            .flush_into(&mut output)
            .await
            .map_err(|err| InitializationError::Communication(CommunicationError::Io(err)))?;

        let read_banner = async {
            loop {
                match input_buffer.parse_initialization() {
                    Ok(Some(result)) => break Ok(result),
                    Ok(None) => {
                        input_buffer.read_more_data(&mut input).await?;
                    }
                    Err(err) => break Err(CommunicationError::from(err)),
                }
            }
        };

        let (peer_version_info, peer_identification) = match config.handshake_timeout {
            Some(deadline) => tokio::time::timeout(deadline, read_banner)
                .await
                .map_err(|_| InitializationError::BannerTimeout)?,
            None => read_banner.await,
        }
        .map_err(InitializationError::Communication)?;

        if peer_version_info.protocol_version() != "2.0" {
            return Err(InitializationError::UnsupportedProtocolVersion(
                peer_version_info,
            ));
        }

        let algorithm_list = AlgorithmNameList::from_available(
            &config.connection_algorithms,
            config.allow_none_algorithms,
        );

        let mut handler = ProtocolHandler {
            input_buffer,
            input,
            output_buffer,
            output,
            peer_identification,
            peer_version_info,
            session_id: None,
            rng: config.rng,
            connection_algorithms: config.connection_algorithms,
            algorithm_list,
            version_info: config.version_info,
            verifier: config.verifier,
            peer_identity: config.peer_identity,
            rekey_limit_override: config.rekey_limits,
            limits_in: RekeyLimits::default(),
            limits_out: RekeyLimits::default(),
            baseline_in: Traffic::default(),
            baseline_out: Traffic::default(),
            authenticated: false,
            pending_user_packets: VecDeque::new(),
        };

        let initial_exchange = handler.perform_key_exchange(None);

        match config.handshake_timeout {
            Some(deadline) => tokio::time::timeout(deadline, initial_exchange)
                .await
                .map_err(|_| InitializationError::HandshakeTimeout)?,
            None => initial_exchange.await,
        }
        .map_err(|err| match err {
            KeyExchangeProcedureError::Communication(err) => {
                InitializationError::Communication(err)
            }
            err => InitializationError::KeyExchange(err),
        })?;

        Ok(handler)
    }

    /// Returns the session identifier.
    ///
    /// After initialization this is always `Some(_)`.
    pub(crate) fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    /// Returns the version information announced by the peer.
    pub(crate) fn peer_version_info(&self) -> &VersionInformation {
        &self.peer_version_info
    }

    /// Marks the connection as authenticated, engaging delayed compression.
    pub(crate) fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// Seals a packet into the output buffer.
    fn seal_packet(&mut self, payload: &[u8]) {
        let algorithms = self.connection_algorithms.outgoing(self.authenticated);
        self.output_buffer
            .write_packet(payload, algorithms, &mut *self.rng);
    }

    /// Flushes the buffered output into the output stream.
    async fn flush(&mut self) -> Result<(), CommunicationError> {
        self.output_buffer
            .flush_into(&mut self.output)
            .await
            .map_err(CommunicationError::Io)
    }

    /// Returns the next fully buffered packet, without waiting for more input.
    fn try_next_raw_packet(&mut self) -> Result<Option<Vec<u8>>, CommunicationError> {
        let algorithms = self.connection_algorithms.incoming(self.authenticated);

        Ok(self
            .input_buffer
            .read_packet(algorithms)?
            .map(|packet| packet.into_owned()))
    }

    /// Returns the next packet, waiting for more input as needed.
    async fn next_raw_packet(&mut self) -> Result<Vec<u8>, CommunicationError> {
        loop {
            if let Some(packet) = self.try_next_raw_packet()? {
                return Ok(packet);
            }

            self.input_buffer.read_more_data(&mut self.input).await?;
        }
    }

    /// Receives the next packet that will be surfaced to the user.
    ///
    /// Transport level packets are intercepted here and never surfaced.
    pub(crate) async fn next_user_packet(&mut self) -> Result<Vec<u8>, CommunicationError> {
        loop {
            if let Some(packet) = self.pending_user_packets.pop_front() {
                return Ok(packet);
            }

            if let Some(packet) = self.try_next_raw_packet()? {
                if let Some(user_packet) = self.process_incoming(packet).await? {
                    return Ok(user_packet);
                }

                continue;
            }

            self.rekey_if_needed().await?;
            self.input_buffer.read_more_data(&mut self.input).await?;
        }
    }

    /// Receives the next user packet if one is already buffered.
    ///
    /// This never waits for socket readability, but it may still send protocol packets
    /// (for example when a buffered peer `SSH_MSG_KEXINIT` starts a re-key).
    pub(crate) async fn try_next_user_packet(
        &mut self,
    ) -> Result<Option<Vec<u8>>, CommunicationError> {
        loop {
            if let Some(packet) = self.pending_user_packets.pop_front() {
                return Ok(Some(packet));
            }

            match self.try_next_raw_packet()? {
                Some(packet) => {
                    if let Some(user_packet) = self.process_incoming(packet).await? {
                        return Ok(Some(user_packet));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    /// Waits until more input data arrived and buffers it.
    pub(crate) async fn read_more(&mut self) -> Result<usize, CommunicationError> {
        self.input_buffer.read_more_data(&mut self.input).await
    }

    /// Handles one incoming packet, intercepting everything transport related.
    async fn process_incoming(
        &mut self,
        packet: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, CommunicationError> {
        let message_number = match packet.first() {
            Some(&number) => number,
            None => return Err(CommunicationError::InvalidFormat),
        };

        match message_number {
            SSH_MSG_DISCONNECT => Err(parse_disconnect(&packet)),
            SSH_MSG_IGNORE => Ok(None),
            SSH_MSG_DEBUG => {
                log_debug_message(&packet);
                Ok(None)
            }
            SSH_MSG_UNIMPLEMENTED => {
                tracing::warn!("the peer reported a packet as unimplemented");
                Ok(None)
            }
            SSH_MSG_KEXINIT => {
                // The peer initiated a transparent re-key.
                self.perform_key_exchange(Some(packet))
                    .await
                    .map_err(rekey_error)?;

                Ok(None)
            }
            _ if MessageGroup::from_number(message_number).is_transport_internal() => {
                // A transport message that only makes sense during an exchange.
                tracing::warn!(message_number, "unexpected transport message");
                self.send_unimplemented().await?;

                Ok(None)
            }
            _ => Ok(Some(packet)),
        }
    }

    /// Answers the most recently received packet with `SSH_MSG_UNIMPLEMENTED`.
    async fn send_unimplemented(&mut self) -> Result<(), CommunicationError> {
        let sequence_number = self.input_buffer.sequence_number().wrapping_sub(1);

        let mut payload = Vec::new();
        write::byte(SSH_MSG_UNIMPLEMENTED, &mut payload).expect("vec writes don't fail");
        write::uint32(sequence_number, &mut payload).expect("vec writes don't fail");

        self.seal_packet(&payload);
        self.flush().await
    }

    /// Sends a packet from the user.
    ///
    /// # Panics
    /// This function may panic if the total packet length does not fit into a `u32`.
    pub(crate) async fn send_user_packet(&mut self, data: &[u8]) -> Result<(), CommunicationError> {
        match MessageGroup::from_message(data) {
            None => return Err(CommunicationError::InvalidFormat),
            Some(group) if group.is_transport_internal() => {
                return Err(CommunicationError::ProtocolInternalPacketSent)
            }
            Some(_) => {}
        }

        self.rekey_if_needed().await?;

        self.seal_packet(data);
        self.flush().await
    }

    /// Starts a transparent re-key if either direction crossed its traffic limits.
    async fn rekey_if_needed(&mut self) -> Result<(), CommunicationError> {
        let outgoing_exceeded = self
            .output_buffer
            .traffic()
            .exceeds(self.baseline_out, self.limits_out);
        let incoming_exceeded = self
            .input_buffer
            .traffic()
            .exceeds(self.baseline_in, self.limits_in);

        if outgoing_exceeded || incoming_exceeded {
            tracing::debug!("traffic limits reached, starting transparent re-key");
            self.perform_key_exchange(None).await.map_err(rekey_error)?;
        }

        Ok(())
    }

    /// Re-keys the connection.
    pub(crate) async fn rekey(&mut self) -> Result<(), CommunicationError> {
        self.perform_key_exchange(None).await.map_err(rekey_error)
    }

    /// Performs a key exchange with the peer.
    ///
    /// `peer_kexinit` is the already received `SSH_MSG_KEXINIT` payload if the peer
    /// initiated the exchange.
    async fn perform_key_exchange(
        &mut self,
        peer_kexinit: Option<Vec<u8>>,
    ) -> Result<(), KeyExchangeProcedureError> {
        // Float host key algorithms the verifier already trusts to the front.
        let mut name_list = self.algorithm_list.clone();
        let trusted = self.verifier.trusted_algorithms(&self.peer_identity);
        name_list.prefer_host_key_algorithms(&trusted);

        let local_kexinit_packet = {
            let mut cookie = [0u8; 16];
            self.rng.fill_bytes(&mut cookie);

            let mut packet = Vec::new();
            kex::write_kexinit(
                &kex::KexInitPacket {
                    cookie,
                    algorithm_list: name_list.clone(),
                    first_kex_packet_follows: false,
                },
                &mut packet,
            )
            .expect("vec writes don't fail");

            packet
        };

        self.seal_packet(&local_kexinit_packet);
        self.flush()
            .await
            .map_err(KeyExchangeProcedureError::Communication)?;

        let remote_kexinit = match peer_kexinit {
            Some(packet) => packet,
            None => loop {
                let packet = self
                    .next_raw_packet()
                    .await
                    .map_err(KeyExchangeProcedureError::Communication)?;

                match packet.first() {
                    Some(&SSH_MSG_KEXINIT) => break packet,
                    Some(&SSH_MSG_IGNORE) | Some(&SSH_MSG_DEBUG) => continue,
                    Some(&SSH_MSG_DISCONNECT) => {
                        return Err(KeyExchangeProcedureError::Communication(parse_disconnect(
                            &packet,
                        )))
                    }
                    Some(&number) if !MessageGroup::from_number(number).is_transport_internal() => {
                        // The peer has not seen our KEXINIT yet and may still send user
                        // traffic, which is delivered after the exchange.
                        self.pending_user_packets.push_back(packet);
                    }
                    _ => return Err(KeyExchangeProcedureError::NonKeyExchangePacketReceived),
                }
            },
        };

        let remote = kex::parse_kexinit(&remote_kexinit).map_err(|_| {
            KeyExchangeProcedureError::Communication(CommunicationError::InvalidFormat)
        })?;

        let negotiated = kex::negotiate_algorithms(
            &name_list,
            &remote.algorithm_list,
            &self.connection_algorithms,
        )?;

        // A guessed first packet that guessed wrong must be discarded.
        let discard_guessed_packet = remote.first_kex_packet_follows
            && (remote.algorithm_list.kex.first().map(|name| name.as_ref())
                != Some(negotiated.kex.as_str())
                || remote
                    .algorithm_list
                    .host_key
                    .first()
                    .map(|name| name.as_ref())
                    != Some(negotiated.host_key.as_str()));

        let client_identification = format!("{}", self.version_info).into_bytes();
        let server_identification = self.peer_identification.clone();

        let kex_data = KeyExchangeData {
            client_identification: &client_identification,
            server_identification: &server_identification,
            client_kexinit: &local_kexinit_packet,
            server_kexinit: &remote_kexinit,
        };

        let (kex_index, mut kex_alg) = self
            .connection_algorithms
            .kex
            .remove(&negotiated.kex)
            .expect("negotiated kex algorithm is available");
        let (host_key_index, mut host_key_alg) = self
            .connection_algorithms
            .host_key
            .remove(&negotiated.host_key)
            .expect("negotiated host key algorithm is available");

        let hash_fn = kex_alg.hash_function;

        let exchange_result = self
            .run_kex_exchange(
                &mut kex_alg,
                &mut host_key_alg,
                &kex_data,
                discard_guessed_packet,
            )
            .await;

        self.connection_algorithms
            .host_key
            .reinsert(host_key_index, host_key_alg);
        self.connection_algorithms.kex.reinsert(kex_index, kex_alg);

        let (host_key, shared_secret, exchange_hash) = exchange_result?;

        // The signature proved possession of the key, the verifier decides whether the
        // key belongs to this peer. Nothing derived from this exchange is used before
        // both checks passed.
        if let Verdict::Reject = self.verifier.verify(&self.peer_identity, &host_key) {
            return Err(KeyExchangeProcedureError::HostKeyRejected);
        }

        self.seal_packet(&[SSH_MSG_NEWKEYS]);
        self.flush()
            .await
            .map_err(KeyExchangeProcedureError::Communication)?;

        if self.session_id.is_none() {
            self.session_id = Some(exchange_hash.clone());
        }
        let session_id = self
            .session_id
            .clone()
            .expect("session id was set by the first exchange");

        // Each direction switches its keys independently the moment its NEWKEYS has
        // been sent or received, so in-flight traffic under the old keys stays intact.
        self.connection_algorithms.switch_outgoing_keys(
            &negotiated,
            hash_fn,
            &shared_secret,
            &exchange_hash,
            &session_id,
        );

        loop {
            let packet = self
                .next_raw_packet()
                .await
                .map_err(KeyExchangeProcedureError::Communication)?;

            match packet.first() {
                Some(&SSH_MSG_NEWKEYS) => break,
                Some(&SSH_MSG_IGNORE) | Some(&SSH_MSG_DEBUG) => continue,
                Some(&SSH_MSG_DISCONNECT) => {
                    return Err(KeyExchangeProcedureError::Communication(parse_disconnect(
                        &packet,
                    )))
                }
                _ => return Err(KeyExchangeProcedureError::NoNewkeysPacket),
            }
        }

        self.connection_algorithms.switch_incoming_keys(
            &negotiated,
            hash_fn,
            &shared_secret,
            &exchange_hash,
            &session_id,
        );

        let block_size_c2s = self
            .connection_algorithms
            .c2s
            .encryption
            .algorithm(&negotiated.encryption_c2s)
            .map(|alg| alg.cipher_block_size)
            .unwrap_or(16);
        let block_size_s2c = self
            .connection_algorithms
            .s2c
            .encryption
            .algorithm(&negotiated.encryption_s2c)
            .map(|alg| alg.cipher_block_size)
            .unwrap_or(16);

        self.limits_out = self
            .rekey_limit_override
            .unwrap_or_else(|| RekeyLimits::for_block_size(block_size_c2s));
        self.limits_in = self
            .rekey_limit_override
            .unwrap_or_else(|| RekeyLimits::for_block_size(block_size_s2c));
        self.baseline_out = self.output_buffer.traffic();
        self.baseline_in = self.input_buffer.traffic();

        tracing::debug!(
            kex = %negotiated.kex,
            host_key = %negotiated.host_key,
            cipher_c2s = %negotiated.encryption_c2s,
            cipher_s2c = %negotiated.encryption_s2c,
            "key exchange finished"
        );

        Ok(())
    }

    /// Drives the method specific part of a key exchange.
    async fn run_kex_exchange(
        &mut self,
        kex_alg: &mut KeyExchangeAlgorithmEntry,
        host_key_alg: &mut HostKeyAlgorithmEntry,
        kex_data: &KeyExchangeData<'_>,
        mut discard_first_packet: bool,
    ) -> Result<(Vec<u8>, BigInt, Vec<u8>), KeyExchangeProcedureError> {
        if let Some(start_packet) = kex_alg.start(kex_data, &mut *self.rng) {
            self.seal_packet(&start_packet);
            self.flush()
                .await
                .map_err(KeyExchangeProcedureError::Communication)?;
        }

        loop {
            let packet = self
                .next_raw_packet()
                .await
                .map_err(KeyExchangeProcedureError::Communication)?;

            match MessageGroup::from_message(&packet) {
                Some(MessageGroup::KeyExchangeMethodSpecific) => {
                    if discard_first_packet {
                        discard_first_packet = false;
                        continue;
                    }

                    match kex_alg.respond(&packet, kex_data, host_key_alg, &mut *self.rng) {
                        Ok(KeyExchangeResponse::Packet(response)) => {
                            self.seal_packet(&response);
                            self.flush()
                                .await
                                .map_err(KeyExchangeProcedureError::Communication)?;
                        }
                        Ok(KeyExchangeResponse::Finished {
                            host_key,
                            shared_secret,
                            exchange_hash,
                        }) => return Ok((host_key, shared_secret, exchange_hash)),
                        Err(err) => {
                            return Err(KeyExchangeProcedureError::KeyExchangeAlgorithmError(err))
                        }
                    }
                }
                Some(MessageGroup::TransportLayerGeneric) => match packet[0] {
                    SSH_MSG_IGNORE | SSH_MSG_DEBUG => continue,
                    SSH_MSG_DISCONNECT => {
                        return Err(KeyExchangeProcedureError::Communication(parse_disconnect(
                            &packet,
                        )))
                    }
                    _ => return Err(KeyExchangeProcedureError::NonKeyExchangePacketReceived),
                },
                _ => return Err(KeyExchangeProcedureError::NonKeyExchangePacketReceived),
            }
        }
    }

    /// Requests a service from the peer.
    pub(crate) async fn service_request(
        &mut self,
        service: &[u8],
    ) -> Result<(), ServiceRequestError> {
        let mut packet = Vec::new();
        write::byte(SSH_MSG_SERVICE_REQUEST, &mut packet).expect("vec writes don't fail");
        write::string(service, &mut packet).expect("vec writes don't fail");

        self.seal_packet(&packet);
        self.flush()
            .await
            .map_err(ServiceRequestError::Communication)?;

        let answer = loop {
            let packet = self
                .next_raw_packet()
                .await
                .map_err(ServiceRequestError::Communication)?;

            match packet.first() {
                Some(&SSH_MSG_IGNORE) | Some(&SSH_MSG_DEBUG) => continue,
                Some(&SSH_MSG_DISCONNECT) => {
                    return Err(ServiceRequestError::Communication(parse_disconnect(
                        &packet,
                    )))
                }
                _ => break packet,
            }
        };

        let ParsedValue {
            value: code,
            rest_input: rest_answer,
        } = parse::byte(&answer).map_err(|_| ServiceRequestError::InvalidFormat)?;

        if code != SSH_MSG_SERVICE_ACCEPT {
            return Err(ServiceRequestError::InvalidFormat);
        }

        let ParsedValue { value: name, .. } =
            parse::string(rest_answer).map_err(|_| ServiceRequestError::InvalidFormat)?;

        if name == service {
            Ok(())
        } else {
            Err(ServiceRequestError::WrongServiceAccepted(name.to_vec()))
        }
    }
}

/// Maps a failed re-key to the fatal communication error that poisons the session.
fn rekey_error(err: KeyExchangeProcedureError) -> CommunicationError {
    match err {
        KeyExchangeProcedureError::Communication(err) => err,
        err => CommunicationError::Rekey(Box::new(err)),
    }
}

/// Parses a `SSH_MSG_DISCONNECT` packet into the terminal error it represents.
fn parse_disconnect(packet: &[u8]) -> CommunicationError {
    let parse_fields = || -> Result<(u32, String), ParseError> {
        let ParsedValue { rest_input, .. } = parse::byte(packet)?;
        let ParsedValue {
            value: reason,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: description,
            ..
        } = parse::string(rest_input)?;

        Ok((reason, String::from_utf8_lossy(description).into_owned()))
    };

    match parse_fields() {
        Ok((reason, message)) => CommunicationError::Disconnect { reason, message },
        Err(_) => CommunicationError::InvalidFormat,
    }
}

/// Logs the contents of a `SSH_MSG_DEBUG` packet.
fn log_debug_message(packet: &[u8]) {
    let parse_fields = || -> Result<String, ParseError> {
        let ParsedValue { rest_input, .. } = parse::byte(packet)?;
        let ParsedValue { rest_input, .. } = parse::boolean(rest_input)?;
        let ParsedValue { value: message, .. } = parse::string(rest_input)?;

        Ok(String::from_utf8_lossy(message).into_owned())
    };

    if let Ok(message) = parse_fields() {
        tracing::debug!(message = %message, "peer debug message");
    }
}
