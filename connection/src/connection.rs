//! The sans-io core of the connection protocol.
//!
//! [`Connection`] owns all channel state and is driven entirely by feeding it incoming
//! packet payloads; everything it wants to send is collected in an outbox that the
//! [`crate::Multiplexer`] drains through the transport session. This keeps all
//! dispatching and flow control logic independent of sockets and testable in isolation.

use definitions::{
    consts::{
        open_failure_reason, SSH_MSG_CHANNEL_CLOSE, SSH_MSG_CHANNEL_DATA, SSH_MSG_CHANNEL_EOF,
        SSH_MSG_CHANNEL_EXTENDED_DATA, SSH_MSG_CHANNEL_FAILURE, SSH_MSG_CHANNEL_OPEN,
        SSH_MSG_CHANNEL_OPEN_CONFIRMATION, SSH_MSG_CHANNEL_OPEN_FAILURE, SSH_MSG_CHANNEL_REQUEST,
        SSH_MSG_CHANNEL_SUCCESS, SSH_MSG_CHANNEL_WINDOW_ADJUST, SSH_MSG_GLOBAL_REQUEST,
        SSH_MSG_REQUEST_FAILURE, SSH_MSG_REQUEST_SUCCESS,
    },
    Compose as _, Parse as _, ParsedValue,
};
use std::{borrow::Cow, collections::HashMap, fmt};

use crate::{
    channel::{Channel, ChannelState, ReplyCallback, RequestOutcome},
    messages,
};
use transport::errors::CommunicationError;

/// The initial window size offered for channels we open.
pub const DEFAULT_WINDOW_SIZE: u32 = 0x200000;

/// The maximum packet size offered for channels we open.
pub const DEFAULT_MAXIMUM_PACKET_SIZE: u32 = 0x8000;

/// There was an error in the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The underlying transport failed.
    ///
    /// The session is unusable afterwards.
    #[error("transport error: {0}")]
    Transport(CommunicationError),
    /// The peer referenced a channel id that is not open.
    #[error("the peer referenced unknown channel {0}")]
    UnknownChannel(u32),
    /// The peer violated the connection protocol.
    ///
    /// The session is unusable afterwards, like for any other protocol violation.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
    /// An operation referenced a channel that no longer exists locally.
    #[error("channel {0} is not open")]
    ChannelNotOpen(u32),
}

/// A recoverable refusal of a channel open request.
///
/// The caller may retry with different parameters; the session stays usable.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChannelOpenFailed {
    /// The machine readable reason code.
    pub reason_code: u32,
    /// The human readable description sent by the peer.
    pub description: String,
}

/// A protocol irregularity that does not terminate the session.
///
/// Anomalies are logged and collected so callers can inspect them, but the connection
/// keeps running.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Anomaly {
    /// A description of what happened.
    pub description: String,
}

/// The decision of a handler for peer initiated channel opens.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OpenRejection {
    /// The machine readable reason code.
    pub reason_code: u32,
    /// The human readable description.
    pub description: String,
}

/// A handler deciding whether to accept a peer initiated channel open.
///
/// On acceptance it returns the local window and maximum packet size to offer.
type OpenHandler = Box<dyn FnMut(&messages::ChannelOpen<'_>) -> Result<(u32, u32), OpenRejection>>;

/// A callback resolving a locally initiated channel open.
type OpenCallback = Box<dyn FnOnce(Result<u32, ChannelOpenFailed>)>;

/// A callback resolving a global request that awaits a reply.
type GlobalReplyCallback = Box<dyn FnOnce(RequestOutcome, &[u8])>;

/// The sans-io state of one connection: the channel table and everything needed to
/// dispatch incoming messages and drive outgoing flushes under flow control.
#[derive(Default)]
pub struct Connection {
    /// All live channels, keyed by their local id.
    channels: HashMap<u32, Channel>,
    /// The next local channel id to assign.
    ///
    /// Ids increase monotonically and are never reused while a channel is open.
    next_local_id: u32,
    /// Callbacks for locally initiated opens that await their confirmation.
    open_callbacks: HashMap<u32, OpenCallback>,
    /// Handlers for peer initiated channel opens, keyed by channel type name.
    open_handlers: HashMap<Vec<u8>, OpenHandler>,
    /// Replies to our global requests are matched in FIFO order through this queue.
    pending_global_replies: std::collections::VecDeque<GlobalReplyCallback>,
    /// The packets waiting to be sent through the transport.
    outbox: Vec<Vec<u8>>,
    /// The protocol irregularities observed so far.
    anomalies: Vec<Anomaly>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("channels", &self.channels)
            .field("next_local_id", &self.next_local_id)
            .field("outbox", &self.outbox.len())
            .field("anomalies", &self.anomalies)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a new connection state without any channels.
    pub fn new() -> Connection {
        Connection::default()
    }

    /// Returns a reference to the channel with the given local id.
    pub fn channel(&self, local_id: u32) -> Option<&Channel> {
        self.channels.get(&local_id)
    }

    /// Returns mutable access to the channel with the given local id.
    ///
    /// This is the place to register event callbacks.
    pub fn channel_mut(&mut self, local_id: u32) -> Option<&mut Channel> {
        self.channels.get_mut(&local_id)
    }

    /// Returns the anomalies observed so far, clearing the record.
    pub fn take_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.anomalies)
    }

    /// Registers a handler for peer initiated channel opens of the given type.
    pub fn register_open_handler<H>(&mut self, channel_type: &[u8], handler: H)
    where
        H: FnMut(&messages::ChannelOpen<'_>) -> Result<(u32, u32), OpenRejection> + 'static,
    {
        self.open_handlers
            .insert(channel_type.to_vec(), Box::new(handler));
    }

    /// Records an anomaly.
    fn report_anomaly(&mut self, description: String) {
        tracing::warn!(%description, "protocol anomaly");
        self.anomalies.push(Anomaly { description });
    }

    /// Allocates the next local channel id.
    fn allocate_local_id(&mut self) -> u32 {
        let id = self.next_local_id;
        self.next_local_id += 1;
        id
    }

    /// Opens a new channel of the given type.
    ///
    /// The returned local id is valid immediately (for registering callbacks), the
    /// channel becomes usable once the peer confirms. `on_open` resolves with the
    /// outcome; an open failure is a recoverable, per-channel result.
    pub fn open_channel(
        &mut self,
        channel_type: &[u8],
        type_specific: &[u8],
        on_open: Option<OpenCallback>,
    ) -> u32 {
        let local_id = self.allocate_local_id();

        self.channels.insert(
            local_id,
            Channel::new(local_id, DEFAULT_WINDOW_SIZE, DEFAULT_MAXIMUM_PACKET_SIZE),
        );
        if let Some(on_open) = on_open {
            self.open_callbacks.insert(local_id, on_open);
        }

        self.outbox.push(
            messages::ChannelOpen {
                channel_type: channel_type.into(),
                sender_channel: local_id,
                initial_window_size: DEFAULT_WINDOW_SIZE,
                maximum_packet_size: DEFAULT_MAXIMUM_PACKET_SIZE,
                type_specific: type_specific.into(),
            }
            .compose_to_vec(),
        );

        local_id
    }

    /// Queues data on the given channel.
    ///
    /// The data leaves during the next flush, as far as the remote window allows.
    pub fn send_data(&mut self, local_id: u32, data: &[u8]) -> Result<(), ConnectionError> {
        let channel = self
            .channels
            .get_mut(&local_id)
            .ok_or(ConnectionError::ChannelNotOpen(local_id))?;

        channel.queue_data(data);

        Ok(())
    }

    /// Signals that no more data will be sent on the given channel.
    ///
    /// The eof leaves once all buffered data drained.
    pub fn send_eof(&mut self, local_id: u32) -> Result<(), ConnectionError> {
        let channel = self
            .channels
            .get_mut(&local_id)
            .ok_or(ConnectionError::ChannelNotOpen(local_id))?;

        channel.queue_eof();

        Ok(())
    }

    /// Starts closing the given channel.
    ///
    /// The channel id is released once the peer acknowledges the close.
    pub fn close_channel(&mut self, local_id: u32) -> Result<(), ConnectionError> {
        let channel = self
            .channels
            .get_mut(&local_id)
            .ok_or(ConnectionError::ChannelNotOpen(local_id))?;

        if channel.state() != ChannelState::Closing {
            let close = messages::ChannelClose {
                recipient_channel: channel.remote_id(),
            };
            channel.mark_close_sent();
            self.outbox.push(close.compose_to_vec());
        }

        self.remove_if_fully_closed(local_id);

        Ok(())
    }

    /// Sends a channel request, optionally awaiting its reply.
    ///
    /// Replies carry no request identifier on the wire, so they resolve the pending
    /// requests of the channel strictly in the order they were issued.
    pub fn request(
        &mut self,
        local_id: u32,
        request_type: &[u8],
        payload: &[u8],
        on_reply: Option<ReplyCallback>,
    ) -> Result<(), ConnectionError> {
        let channel = self
            .channels
            .get_mut(&local_id)
            .ok_or(ConnectionError::ChannelNotOpen(local_id))?;

        let message = messages::ChannelRequest {
            recipient_channel: channel.remote_id(),
            request_type: request_type.into(),
            want_reply: on_reply.is_some(),
            payload: payload.into(),
        };

        if let Some(on_reply) = on_reply {
            channel.push_pending_reply(on_reply);
        }

        self.outbox.push(message.compose_to_vec());

        Ok(())
    }

    /// Sends a global request, optionally awaiting its reply.
    pub fn global_request(
        &mut self,
        request_name: &[u8],
        payload: &[u8],
        on_reply: Option<GlobalReplyCallback>,
    ) {
        let message = messages::GlobalRequest {
            request_name: request_name.into(),
            want_reply: on_reply.is_some(),
            payload: payload.into(),
        };

        if let Some(on_reply) = on_reply {
            self.pending_global_replies.push_back(on_reply);
        }

        self.outbox.push(message.compose_to_vec());
    }

    /// Releases buffered channel data under flow control into the outbox.
    ///
    /// For every open, non-closing channel this emits data up to the lesser of the
    /// remaining remote window, the remote maximum packet size and the buffered amount.
    pub fn flush_channels(&mut self) {
        let mut eofs = Vec::new();

        for channel in self.channels.values_mut() {
            while let Some(chunk) = channel.next_outbound_chunk() {
                self.outbox.push(
                    messages::ChannelData {
                        recipient_channel: channel.remote_id(),
                        data: Cow::Owned(chunk),
                    }
                    .compose_to_vec(),
                );
            }

            if channel.take_ready_eof() {
                eofs.push(channel.remote_id());
            }
        }

        for remote_id in eofs {
            self.outbox.push(
                messages::ChannelEof {
                    recipient_channel: remote_id,
                }
                .compose_to_vec(),
            );
        }
    }

    /// Takes the packets waiting to be sent.
    pub fn take_outbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }

    /// Returns whether any packets are waiting to be sent.
    pub fn has_pending_output(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Removes the channel once close was both sent and received.
    fn remove_if_fully_closed(&mut self, local_id: u32) {
        let fully_closed = self
            .channels
            .get(&local_id)
            .map(|channel| channel.fully_closed())
            .unwrap_or(false);

        if fully_closed {
            let mut channel = self
                .channels
                .remove(&local_id)
                .expect("presence was just checked");

            if let Some(on_close) = channel.events.on_close.as_mut() {
                on_close();
            }
        }
    }

    /// Dispatches one incoming packet payload.
    ///
    /// Returns an error only for conditions that poison the whole session; recoverable
    /// outcomes (open failures, request failures) resolve through their callbacks and
    /// anomalies are recorded without terminating.
    pub fn handle_message(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let message_number = *payload
            .first()
            .ok_or(ConnectionError::ProtocolViolation("empty packet"))?;

        match message_number {
            SSH_MSG_CHANNEL_OPEN => self.handle_channel_open(payload),
            SSH_MSG_CHANNEL_OPEN_CONFIRMATION => self.handle_open_confirmation(payload),
            SSH_MSG_CHANNEL_OPEN_FAILURE => self.handle_open_failure(payload),
            SSH_MSG_CHANNEL_WINDOW_ADJUST => {
                let ParsedValue { value, .. } = messages::ChannelWindowAdjust::parse(payload)
                    .map_err(|_| ConnectionError::ProtocolViolation("malformed window adjust"))?;

                self.channel_for(value.recipient_channel)?
                    .handle_window_adjust(value.bytes_to_add);

                Ok(())
            }
            SSH_MSG_CHANNEL_DATA => self.handle_data(payload),
            SSH_MSG_CHANNEL_EXTENDED_DATA => self.handle_extended_data(payload),
            SSH_MSG_CHANNEL_EOF => {
                let ParsedValue { value, .. } = messages::ChannelEof::parse(payload)
                    .map_err(|_| ConnectionError::ProtocolViolation("malformed eof"))?;

                self.channel_for(value.recipient_channel)?.handle_eof();

                Ok(())
            }
            SSH_MSG_CHANNEL_CLOSE => self.handle_close(payload),
            SSH_MSG_CHANNEL_REQUEST => self.handle_channel_request(payload),
            SSH_MSG_CHANNEL_SUCCESS => self.handle_reply(payload, RequestOutcome::Success),
            SSH_MSG_CHANNEL_FAILURE => self.handle_reply(payload, RequestOutcome::Failure),
            SSH_MSG_GLOBAL_REQUEST => self.handle_global_request(payload),
            SSH_MSG_REQUEST_SUCCESS => {
                let ParsedValue { value, .. } = messages::RequestSuccess::parse(payload)
                    .map_err(|_| ConnectionError::ProtocolViolation("malformed reply"))?;

                match self.pending_global_replies.pop_front() {
                    Some(callback) => callback(RequestOutcome::Success, &value.payload),
                    None => self
                        .report_anomaly("global request reply without pending request".to_string()),
                }

                Ok(())
            }
            SSH_MSG_REQUEST_FAILURE => {
                match self.pending_global_replies.pop_front() {
                    Some(callback) => callback(RequestOutcome::Failure, &[]),
                    None => self
                        .report_anomaly("global request reply without pending request".to_string()),
                }

                Ok(())
            }
            _ => Err(ConnectionError::ProtocolViolation(
                "unexpected message number",
            )),
        }
    }

    /// Returns the channel for a peer supplied local id.
    fn channel_for(&mut self, local_id: u32) -> Result<&mut Channel, ConnectionError> {
        self.channels
            .get_mut(&local_id)
            .ok_or(ConnectionError::UnknownChannel(local_id))
    }

    /// Handles a peer initiated channel open.
    fn handle_channel_open(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: open, .. } = messages::ChannelOpen::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed channel open"))?;

        let decision = match self.open_handlers.get_mut(open.channel_type.as_ref()) {
            Some(handler) => handler(&open),
            None => Err(OpenRejection {
                reason_code: open_failure_reason::SSH_OPEN_UNKNOWN_CHANNEL_TYPE,
                description: "unknown channel type".to_string(),
            }),
        };

        match decision {
            Ok((window, maximum_packet)) => {
                let local_id = self.allocate_local_id();

                let mut channel = Channel::new(local_id, window, maximum_packet);
                channel.accept_open(
                    open.sender_channel,
                    open.initial_window_size,
                    open.maximum_packet_size,
                );
                self.channels.insert(local_id, channel);

                self.outbox.push(
                    messages::ChannelOpenConfirmation {
                        recipient_channel: open.sender_channel,
                        sender_channel: local_id,
                        initial_window_size: window,
                        maximum_packet_size: maximum_packet,
                        type_specific: Cow::Borrowed(b""),
                    }
                    .compose_to_vec(),
                );
            }
            Err(rejection) => {
                self.outbox.push(
                    messages::ChannelOpenFailure {
                        recipient_channel: open.sender_channel,
                        reason_code: rejection.reason_code,
                        description: Cow::Owned(rejection.description.into_bytes()),
                        language_tag: Cow::Borrowed(b""),
                    }
                    .compose_to_vec(),
                );
            }
        }

        Ok(())
    }

    /// Handles the confirmation of a locally initiated open.
    fn handle_open_confirmation(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue {
            value: confirmation,
            ..
        } = messages::ChannelOpenConfirmation::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed open confirmation"))?;

        let channel = self.channel_for(confirmation.recipient_channel)?;

        if channel.state() != ChannelState::Opening {
            return Err(ConnectionError::ProtocolViolation(
                "open confirmation for a channel that is not opening",
            ));
        }

        channel.confirm_open(
            confirmation.sender_channel,
            confirmation.initial_window_size,
            confirmation.maximum_packet_size,
        );

        if let Some(callback) = self.open_callbacks.remove(&confirmation.recipient_channel) {
            callback(Ok(confirmation.recipient_channel));
        }

        Ok(())
    }

    /// Handles the rejection of a locally initiated open.
    fn handle_open_failure(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: failure, .. } = messages::ChannelOpenFailure::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed open failure"))?;

        let channel = self.channel_for(failure.recipient_channel)?;

        if channel.state() != ChannelState::Opening {
            return Err(ConnectionError::ProtocolViolation(
                "open failure for a channel that is not opening",
            ));
        }

        self.channels.remove(&failure.recipient_channel);

        if let Some(callback) = self.open_callbacks.remove(&failure.recipient_channel) {
            callback(Err(ChannelOpenFailed {
                reason_code: failure.reason_code,
                description: String::from_utf8_lossy(&failure.description).into_owned(),
            }));
        }

        Ok(())
    }

    /// Handles incoming channel data.
    fn handle_data(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: data, .. } = messages::ChannelData::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed channel data"))?;

        let channel = self.channel_for(data.recipient_channel)?;

        let replenish = channel
            .account_received_data(data.data.len())
            .map_err(|()| ConnectionError::ProtocolViolation("local window overrun"))?;

        if let Some(on_data) = channel.events.on_data.as_mut() {
            on_data(&data.data);
        }

        if let Some(bytes_to_add) = replenish {
            let adjust = messages::ChannelWindowAdjust {
                recipient_channel: channel.remote_id(),
                bytes_to_add,
            };
            self.outbox.push(adjust.compose_to_vec());
        }

        Ok(())
    }

    /// Handles incoming extended channel data.
    fn handle_extended_data(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: data, .. } = messages::ChannelExtendedData::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed extended data"))?;

        let channel = self.channel_for(data.recipient_channel)?;

        let replenish = channel
            .account_received_data(data.data.len())
            .map_err(|()| ConnectionError::ProtocolViolation("local window overrun"))?;

        if let Some(on_extended_data) = channel.events.on_extended_data.as_mut() {
            on_extended_data(data.data_type_code, &data.data);
        }

        if let Some(bytes_to_add) = replenish {
            let adjust = messages::ChannelWindowAdjust {
                recipient_channel: channel.remote_id(),
                bytes_to_add,
            };
            self.outbox.push(adjust.compose_to_vec());
        }

        Ok(())
    }

    /// Handles the peer's close.
    fn handle_close(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: close, .. } = messages::ChannelClose::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed close"))?;

        let channel = self.channel_for(close.recipient_channel)?;
        channel.mark_close_received();

        if channel.close_pending() {
            let close_reply = messages::ChannelClose {
                recipient_channel: channel.remote_id(),
            };
            channel.mark_close_sent();
            self.outbox.push(close_reply.compose_to_vec());
        }

        self.remove_if_fully_closed(close.recipient_channel);

        Ok(())
    }

    /// Handles a channel request sent by the peer.
    fn handle_channel_request(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: request, .. } = messages::ChannelRequest::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed channel request"))?;

        let channel = self.channel_for(request.recipient_channel)?;

        let success = match channel.events.on_request.as_mut() {
            Some(on_request) => on_request(&request.request_type, &request.payload),
            None => false,
        };

        if request.want_reply {
            let remote_id = channel.remote_id();
            let reply = if success {
                messages::ChannelSuccess {
                    recipient_channel: remote_id,
                }
                .compose_to_vec()
            } else {
                messages::ChannelFailure {
                    recipient_channel: remote_id,
                }
                .compose_to_vec()
            };
            self.outbox.push(reply);
        }

        Ok(())
    }

    /// Handles a reply to one of our channel requests.
    fn handle_reply(
        &mut self,
        payload: &[u8],
        outcome: RequestOutcome,
    ) -> Result<(), ConnectionError> {
        let recipient_channel = match outcome {
            RequestOutcome::Success => {
                messages::ChannelSuccess::parse(payload)
                    .map_err(|_| ConnectionError::ProtocolViolation("malformed reply"))?
                    .value
                    .recipient_channel
            }
            RequestOutcome::Failure => {
                messages::ChannelFailure::parse(payload)
                    .map_err(|_| ConnectionError::ProtocolViolation("malformed reply"))?
                    .value
                    .recipient_channel
            }
        };

        let resolved = self.channel_for(recipient_channel)?.resolve_pending_reply(outcome);

        if !resolved {
            // No request id exists on the wire, so an unmatched reply cannot be
            // attributed. It is surfaced instead of silently dropped, but the session
            // survives.
            self.report_anomaly(format!(
                "channel {recipient_channel} received a request reply without a pending request"
            ));
        }

        Ok(())
    }

    /// Handles a global request sent by the peer.
    fn handle_global_request(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let ParsedValue { value: request, .. } = messages::GlobalRequest::parse(payload)
            .map_err(|_| ConnectionError::ProtocolViolation("malformed global request"))?;

        tracing::debug!(
            request = %String::from_utf8_lossy(&request.request_name),
            "peer global request"
        );

        // No global requests from the server are supported.
        if request.want_reply {
            self.outbox.push(messages::RequestFailure.compose_to_vec());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    /// Confirms the most recently opened channel with the given remote parameters.
    fn confirm(
        connection: &mut Connection,
        local_id: u32,
        remote_id: u32,
        window: u32,
        maximum_packet: u32,
    ) {
        let confirmation = messages::ChannelOpenConfirmation {
            recipient_channel: local_id,
            sender_channel: remote_id,
            initial_window_size: window,
            maximum_packet_size: maximum_packet,
            type_specific: Cow::Borrowed(b""),
        };

        connection
            .handle_message(&confirmation.compose_to_vec())
            .unwrap();
    }

    #[test]
    fn open_and_confirm() {
        let mut connection = Connection::new();

        let outcome = Rc::new(RefCell::new(None));
        let outcome_in_callback = Rc::clone(&outcome);

        let local_id = connection.open_channel(
            b"session",
            b"",
            Some(Box::new(move |result| {
                *outcome_in_callback.borrow_mut() = Some(result);
            })),
        );

        // The open request is in the outbox.
        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0][0], SSH_MSG_CHANNEL_OPEN);

        confirm(&mut connection, local_id, 17, 0x1000, 0x400);

        assert_eq!(*outcome.borrow(), Some(Ok(local_id)));
        assert_eq!(
            connection.channel(local_id).unwrap().state(),
            ChannelState::Open
        );
        assert_eq!(connection.channel(local_id).unwrap().remote_id(), 17);
    }

    #[test]
    fn open_failure_resolves_the_callback() {
        let mut connection = Connection::new();

        let outcome = Rc::new(RefCell::new(None));
        let outcome_in_callback = Rc::clone(&outcome);

        let local_id = connection.open_channel(
            b"session",
            b"",
            Some(Box::new(move |result| {
                *outcome_in_callback.borrow_mut() = Some(result);
            })),
        );

        let failure = messages::ChannelOpenFailure {
            recipient_channel: local_id,
            reason_code: open_failure_reason::SSH_OPEN_ADMINISTRATIVELY_PROHIBITED,
            description: Cow::Borrowed(b"no sessions allowed"),
            language_tag: Cow::Borrowed(b""),
        };
        connection.handle_message(&failure.compose_to_vec()).unwrap();

        assert_eq!(
            *outcome.borrow(),
            Some(Err(ChannelOpenFailed {
                reason_code: open_failure_reason::SSH_OPEN_ADMINISTRATIVELY_PROHIBITED,
                description: "no sessions allowed".to_string(),
            }))
        );
        // The channel id was released.
        assert!(connection.channel(local_id).is_none());
    }

    /// The spec scenario: remote window 100, packet size 100, 150 bytes sent. Exactly
    /// 100 bytes leave immediately, the remaining 50 only after a window adjust.
    #[test]
    fn window_limits_the_flush() {
        let mut connection = Connection::new();

        let local_id = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, local_id, 3, 100, 100);

        connection.send_data(local_id, &[0x55; 150]).unwrap();
        connection.flush_channels();

        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        let ParsedValue { value: data, .. } = messages::ChannelData::parse(&outbox[0]).unwrap();
        assert_eq!(data.recipient_channel, 3);
        assert_eq!(data.data.len(), 100);

        // Nothing more can leave until the peer replenishes the window.
        connection.flush_channels();
        assert!(connection.take_outbox().is_empty());

        let adjust = messages::ChannelWindowAdjust {
            recipient_channel: local_id,
            bytes_to_add: 50,
        };
        connection.handle_message(&adjust.compose_to_vec()).unwrap();
        connection.flush_channels();

        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        let ParsedValue { value: data, .. } = messages::ChannelData::parse(&outbox[0]).unwrap();
        assert_eq!(data.data.len(), 50);
    }

    /// The spec scenario: two requests with want-reply, replies resolve the callbacks
    /// in issue order.
    #[test]
    fn request_replies_resolve_in_order() {
        let mut connection = Connection::new();

        let local_id = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, local_id, 3, 0x1000, 0x400);

        let outcomes = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&outcomes);
        connection
            .request(
                local_id,
                b"exec",
                b"",
                Some(Box::new(move |outcome| {
                    first.borrow_mut().push(("exec", outcome));
                })),
            )
            .unwrap();

        let second = Rc::clone(&outcomes);
        connection
            .request(
                local_id,
                b"env",
                b"",
                Some(Box::new(move |outcome| {
                    second.borrow_mut().push(("env", outcome));
                })),
            )
            .unwrap();

        let success = messages::ChannelSuccess {
            recipient_channel: local_id,
        };
        let failure = messages::ChannelFailure {
            recipient_channel: local_id,
        };
        connection.handle_message(&success.compose_to_vec()).unwrap();
        connection.handle_message(&failure.compose_to_vec()).unwrap();

        assert_eq!(
            &*outcomes.borrow(),
            &[
                ("exec", RequestOutcome::Success),
                ("env", RequestOutcome::Failure)
            ]
        );
    }

    /// A reply without a pending request is an anomaly, not a session failure.
    #[test]
    fn unmatched_reply_is_an_anomaly() {
        let mut connection = Connection::new();

        let local_id = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, local_id, 3, 0x1000, 0x400);

        let success = messages::ChannelSuccess {
            recipient_channel: local_id,
        };
        connection.handle_message(&success.compose_to_vec()).unwrap();

        let anomalies = connection.take_anomalies();
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].description.contains("without a pending request"));

        // The record was cleared.
        assert!(connection.take_anomalies().is_empty());
    }

    #[test]
    fn data_dispatch_and_replenishment() {
        let mut connection = Connection::new();

        let local_id = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, local_id, 3, 0x1000, 0x400);

        let received = Rc::new(RefCell::new(Vec::new()));
        let received_in_callback = Rc::clone(&received);
        connection.channel_mut(local_id).unwrap().events.on_data =
            Some(Box::new(move |data: &[u8]| {
                received_in_callback.borrow_mut().extend_from_slice(data);
            }));

        let data = messages::ChannelData {
            recipient_channel: local_id,
            data: Cow::Owned(vec![0x11; DEFAULT_WINDOW_SIZE as usize / 2 + 1]),
        };
        connection.handle_message(&data.compose_to_vec()).unwrap();

        assert_eq!(received.borrow().len(), DEFAULT_WINDOW_SIZE as usize / 2 + 1);

        // More than half the window was consumed, a replenishment left.
        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        let ParsedValue { value: adjust, .. } =
            messages::ChannelWindowAdjust::parse(&outbox[0]).unwrap();
        assert_eq!(adjust.recipient_channel, 3);
        assert_eq!(adjust.bytes_to_add, DEFAULT_WINDOW_SIZE / 2 + 1);
    }

    #[test]
    fn peer_open_without_handler_is_rejected() {
        let mut connection = Connection::new();

        let open = messages::ChannelOpen {
            channel_type: Cow::Borrowed(b"forwarded-tcpip"),
            sender_channel: 9,
            initial_window_size: 0x1000,
            maximum_packet_size: 0x400,
            type_specific: Cow::Borrowed(b""),
        };
        connection.handle_message(&open.compose_to_vec()).unwrap();

        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        let ParsedValue { value: failure, .. } =
            messages::ChannelOpenFailure::parse(&outbox[0]).unwrap();
        assert_eq!(failure.recipient_channel, 9);
        assert_eq!(
            failure.reason_code,
            open_failure_reason::SSH_OPEN_UNKNOWN_CHANNEL_TYPE
        );
    }

    #[test]
    fn peer_open_with_handler_is_confirmed() {
        let mut connection = Connection::new();

        connection.register_open_handler(b"forwarded-tcpip", |_open| Ok((0x2000, 0x800)));

        let open = messages::ChannelOpen {
            channel_type: Cow::Borrowed(b"forwarded-tcpip"),
            sender_channel: 9,
            initial_window_size: 0x1000,
            maximum_packet_size: 0x400,
            type_specific: Cow::Borrowed(b""),
        };
        connection.handle_message(&open.compose_to_vec()).unwrap();

        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        let ParsedValue {
            value: confirmation,
            ..
        } = messages::ChannelOpenConfirmation::parse(&outbox[0]).unwrap();
        assert_eq!(confirmation.recipient_channel, 9);
        assert_eq!(confirmation.initial_window_size, 0x2000);

        let channel = connection.channel(confirmation.sender_channel).unwrap();
        assert_eq!(channel.state(), ChannelState::Open);
        assert_eq!(channel.remote_id(), 9);
    }

    /// Close is acknowledged and the channel id released once both sides closed.
    #[test]
    fn close_lifecycle() {
        let mut connection = Connection::new();

        let local_id = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, local_id, 3, 0x1000, 0x400);

        let closed = Rc::new(RefCell::new(false));
        let closed_in_callback = Rc::clone(&closed);
        connection.channel_mut(local_id).unwrap().events.on_close =
            Some(Box::new(move || {
                *closed_in_callback.borrow_mut() = true;
            }));

        connection.close_channel(local_id).unwrap();

        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0][0], SSH_MSG_CHANNEL_CLOSE);

        // The channel still exists until the peer acknowledges.
        assert!(connection.channel(local_id).is_some());
        assert!(!*closed.borrow());

        let close = messages::ChannelClose {
            recipient_channel: local_id,
        };
        connection.handle_message(&close.compose_to_vec()).unwrap();

        assert!(connection.channel(local_id).is_none());
        assert!(*closed.borrow());
    }

    /// A peer initiated close is answered and releases the channel.
    #[test]
    fn peer_initiated_close_is_answered() {
        let mut connection = Connection::new();

        let local_id = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, local_id, 3, 0x1000, 0x400);

        let close = messages::ChannelClose {
            recipient_channel: local_id,
        };
        connection.handle_message(&close.compose_to_vec()).unwrap();

        let outbox = connection.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0][0], SSH_MSG_CHANNEL_CLOSE);

        assert!(connection.channel(local_id).is_none());
    }

    /// Messages for unknown channel ids poison the session.
    #[test]
    fn unknown_channel_is_fatal() {
        let mut connection = Connection::new();

        let data = messages::ChannelData {
            recipient_channel: 42,
            data: Cow::Borrowed(b"data"),
        };

        assert!(matches!(
            connection.handle_message(&data.compose_to_vec()),
            Err(ConnectionError::UnknownChannel(42))
        ));
    }

    /// Channel ids increase monotonically and are not reused after a close.
    #[test]
    fn channel_ids_are_not_reused() {
        let mut connection = Connection::new();

        let first = connection.open_channel(b"session", b"", None);
        let _ = connection.take_outbox();
        confirm(&mut connection, first, 3, 0x1000, 0x400);

        connection.close_channel(first).unwrap();
        let close = messages::ChannelClose {
            recipient_channel: first,
        };
        connection.handle_message(&close.compose_to_vec()).unwrap();
        assert!(connection.channel(first).is_none());

        let second = connection.open_channel(b"session", b"", None);
        assert!(second > first);
    }
}
