//! Holds the state of a single logical channel.

use std::{collections::VecDeque, fmt};

/// The lifecycle states of a channel.
///
/// Incoming eof and close are independent signals: eof only means no more data will
/// arrive, while close tears down the channel identifier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChannelState {
    /// The open request was sent, the confirmation is awaited.
    Opening,
    /// The channel is open and may transfer data.
    Open,
    /// A close was sent or received, the channel is shutting down.
    Closing,
    /// Close was both sent and acknowledged; the channel is about to be removed.
    Closed,
}

/// The reply to a channel request with `want_reply` set.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestOutcome {
    /// The peer reported the request as successful.
    Success,
    /// The peer reported the request as failed.
    ///
    /// This is a per-request outcome; the channel and the session stay usable.
    Failure,
}

/// A callback resolving a channel request that awaits a reply.
pub(crate) type ReplyCallback = Box<dyn FnOnce(RequestOutcome)>;

/// The event callbacks of a channel.
///
/// Every slot is optional; events without a handler are dropped silently (except for
/// their flow control bookkeeping, which always happens).
#[derive(Default)]
pub struct ChannelEvents {
    /// Invoked for every received data message.
    pub on_data: Option<Box<dyn FnMut(&[u8])>>,
    /// Invoked for every received extended data message, with its stream code.
    pub on_extended_data: Option<Box<dyn FnMut(u32, &[u8])>>,
    /// Invoked when the peer signals that no more data will arrive.
    pub on_eof: Option<Box<dyn FnMut()>>,
    /// Invoked when the channel is torn down.
    pub on_close: Option<Box<dyn FnMut()>>,
    /// Invoked for channel requests sent by the peer.
    ///
    /// The returned boolean becomes the reply if the peer asked for one. Without a
    /// handler all peer requests fail.
    pub on_request: Option<Box<dyn FnMut(&[u8], &[u8]) -> bool>>,
}

impl fmt::Debug for ChannelEvents {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChannelEvents")
            .field("on_data", &self.on_data.as_ref().map(|_| "..."))
            .field(
                "on_extended_data",
                &self.on_extended_data.as_ref().map(|_| "..."),
            )
            .field("on_eof", &self.on_eof.as_ref().map(|_| "..."))
            .field("on_close", &self.on_close.as_ref().map(|_| "..."))
            .field("on_request", &self.on_request.as_ref().map(|_| "..."))
            .finish()
    }
}

/// The state of one logical channel of a connection.
pub struct Channel {
    /// The channel id on our side, assigned by the multiplexer.
    local_id: u32,
    /// The channel id on the peer side; an opaque value echoed unchanged.
    remote_id: u32,
    /// The lifecycle state of the channel.
    state: ChannelState,
    /// The number of bytes the peer may still send us.
    local_window: u32,
    /// The window size the local side started with, used to decide replenishment.
    local_initial_window: u32,
    /// The largest packet we are willing to receive.
    local_maximum_packet: u32,
    /// The number of bytes we may still send to the peer.
    remote_window: u32,
    /// The largest packet the peer is willing to receive.
    remote_maximum_packet: u32,
    /// Data queued for sending that the flow control has not released yet.
    outgoing: VecDeque<u8>,
    /// Whether an eof should be sent once the outgoing buffer drained.
    eof_queued: bool,
    /// Whether our eof was already sent.
    eof_sent: bool,
    /// Whether the peer signalled eof.
    eof_received: bool,
    /// Whether our close was already sent.
    close_sent: bool,
    /// Whether the peer's close arrived.
    close_received: bool,
    /// Replies to our channel requests are matched in FIFO order through this queue,
    /// because the protocol carries no request identifier.
    pending_replies: VecDeque<ReplyCallback>,
    /// The event callbacks of this channel.
    pub events: ChannelEvents,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Channel")
            .field("local_id", &self.local_id)
            .field("remote_id", &self.remote_id)
            .field("state", &self.state)
            .field("local_window", &self.local_window)
            .field("remote_window", &self.remote_window)
            .field("buffered", &self.outgoing.len())
            .field("pending_replies", &self.pending_replies.len())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Creates a new channel in the opening state.
    pub(crate) fn new(local_id: u32, local_window: u32, local_maximum_packet: u32) -> Channel {
        Channel {
            local_id,
            remote_id: 0,
            state: ChannelState::Opening,
            local_window,
            local_initial_window: local_window,
            local_maximum_packet,
            remote_window: 0,
            remote_maximum_packet: 0,
            outgoing: VecDeque::new(),
            eof_queued: false,
            eof_sent: false,
            eof_received: false,
            close_sent: false,
            close_received: false,
            pending_replies: VecDeque::new(),
            events: ChannelEvents::default(),
        }
    }

    /// Returns the channel id on our side.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// Returns the channel id on the peer side.
    pub fn remote_id(&self) -> u32 {
        self.remote_id
    }

    /// Returns the lifecycle state of the channel.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Returns the number of bytes we may still send before the peer replenishes the
    /// window.
    pub fn remote_window(&self) -> u32 {
        self.remote_window
    }

    /// Returns the number of bytes that are buffered but not yet released by flow
    /// control.
    pub fn buffered_len(&self) -> usize {
        self.outgoing.len()
    }

    /// Returns whether the peer signalled that no more data will arrive.
    pub fn eof_received(&self) -> bool {
        self.eof_received
    }

    /// Marks the channel as open with the parameters from the confirmation.
    pub(crate) fn confirm_open(
        &mut self,
        remote_id: u32,
        remote_window: u32,
        remote_maximum_packet: u32,
    ) {
        self.remote_id = remote_id;
        self.remote_window = remote_window;
        self.remote_maximum_packet = remote_maximum_packet;
        self.state = ChannelState::Open;
    }

    /// Marks a peer initiated channel as open from the start.
    pub(crate) fn accept_open(
        &mut self,
        remote_id: u32,
        remote_window: u32,
        remote_maximum_packet: u32,
    ) {
        self.confirm_open(remote_id, remote_window, remote_maximum_packet);
    }

    /// Queues data for sending.
    ///
    /// The data is released by [`Self::next_outbound_chunk`], clipped to the flow
    /// control limits.
    pub(crate) fn queue_data(&mut self, data: &[u8]) {
        self.outgoing.extend(data);
    }

    /// Queues an eof, sent once the outgoing buffer drained.
    pub(crate) fn queue_eof(&mut self) {
        self.eof_queued = true;
    }

    /// Returns whether a queued eof became ready to send and marks it as sent.
    pub(crate) fn take_ready_eof(&mut self) -> bool {
        if self.eof_queued && !self.eof_sent && self.outgoing.is_empty() {
            self.eof_sent = true;
            true
        } else {
            false
        }
    }

    /// Returns the next chunk of outgoing data released by flow control.
    ///
    /// Sending only ever consumes from the remote window: the chunk is bounded by the
    /// remaining window, the peer's maximum packet size and the buffered amount. Once
    /// the window is exhausted, `None` is returned until a window adjust arrives.
    pub(crate) fn next_outbound_chunk(&mut self) -> Option<Vec<u8>> {
        if self.state != ChannelState::Open {
            return None;
        }

        let len = (self.remote_window as usize)
            .min(self.remote_maximum_packet as usize)
            .min(self.outgoing.len());

        if len == 0 {
            return None;
        }

        let chunk: Vec<u8> = self.outgoing.drain(..len).collect();
        self.remote_window -= len as u32;

        Some(chunk)
    }

    /// Replenishes the remote window.
    pub(crate) fn handle_window_adjust(&mut self, bytes_to_add: u32) {
        self.remote_window = self.remote_window.saturating_add(bytes_to_add);
    }

    /// Accounts for received data and returns the window replenishment to send, if the
    /// consumed half of the local window should be refilled.
    ///
    /// Returns an error description if the peer overran the advertised window, which is
    /// a protocol violation: windows never go negative.
    pub(crate) fn account_received_data(&mut self, len: usize) -> Result<Option<u32>, ()> {
        let len: u32 = len.try_into().map_err(|_| ())?;

        if len > self.local_window {
            return Err(());
        }

        self.local_window -= len;

        // Replenish proactively once more than half of the initial window is consumed,
        // bounding how much either peer is forced to buffer.
        let consumed = self.local_initial_window - self.local_window;
        if consumed > self.local_initial_window / 2 {
            self.local_window += consumed;
            return Ok(Some(consumed));
        }

        Ok(None)
    }

    /// Marks the peer's eof.
    pub(crate) fn handle_eof(&mut self) {
        self.eof_received = true;

        if let Some(on_eof) = self.events.on_eof.as_mut() {
            on_eof();
        }
    }

    /// Marks our close as sent.
    pub(crate) fn mark_close_sent(&mut self) {
        self.close_sent = true;
        self.state = ChannelState::Closing;
    }

    /// Marks the peer's close as received.
    pub(crate) fn mark_close_received(&mut self) {
        self.close_received = true;
        self.state = ChannelState::Closing;
    }

    /// Returns whether our close still has to be sent.
    pub(crate) fn close_pending(&self) -> bool {
        self.close_received && !self.close_sent
    }

    /// Returns whether close was both sent and received, so the id can be released.
    pub(crate) fn fully_closed(&self) -> bool {
        self.close_sent && self.close_received
    }

    /// Queues a reply callback for a request that awaits an answer.
    pub(crate) fn push_pending_reply(&mut self, callback: ReplyCallback) {
        self.pending_replies.push_back(callback);
    }

    /// Resolves the oldest pending request with the given outcome.
    ///
    /// Returns `false` if no request was awaiting a reply, which the caller surfaces as
    /// a protocol anomaly.
    pub(crate) fn resolve_pending_reply(&mut self, outcome: RequestOutcome) -> bool {
        match self.pending_replies.pop_front() {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn open_channel(remote_window: u32, remote_maximum_packet: u32) -> Channel {
        let mut channel = Channel::new(0, 0x100000, 0x8000);
        channel.confirm_open(7, remote_window, remote_maximum_packet);
        channel
    }

    /// A channel with remote window W and more than W bytes buffered emits exactly W
    /// bytes, the rest only after a window adjust.
    #[test]
    fn window_exhaustion() {
        let mut channel = open_channel(100, 100);

        channel.queue_data(&[0x42; 150]);

        let first = channel.next_outbound_chunk().unwrap();
        assert_eq!(first.len(), 100);
        assert_eq!(channel.remote_window(), 0);

        // The window is exhausted, nothing more can leave.
        assert_eq!(channel.next_outbound_chunk(), None);
        assert_eq!(channel.buffered_len(), 50);

        channel.handle_window_adjust(50);

        let second = channel.next_outbound_chunk().unwrap();
        assert_eq!(second.len(), 50);
        assert_eq!(channel.buffered_len(), 0);
    }

    /// Chunks are also clipped to the peer's maximum packet size.
    #[test]
    fn chunks_respect_maximum_packet_size() {
        let mut channel = open_channel(1000, 100);

        channel.queue_data(&[0x13; 250]);

        assert_eq!(channel.next_outbound_chunk().unwrap().len(), 100);
        assert_eq!(channel.next_outbound_chunk().unwrap().len(), 100);
        assert_eq!(channel.next_outbound_chunk().unwrap().len(), 50);
        assert_eq!(channel.next_outbound_chunk(), None);
    }

    /// The local window replenishes once more than half of it was consumed.
    #[test]
    fn local_window_replenishment() {
        let mut channel = Channel::new(0, 100, 0x8000);
        channel.confirm_open(7, 100, 100);

        assert_eq!(channel.account_received_data(40), Ok(None));
        // 70 of 100 consumed, replenish everything consumed so far.
        assert_eq!(channel.account_received_data(30), Ok(Some(70)));
        // The window is back at its initial size.
        assert_eq!(channel.account_received_data(10), Ok(None));
    }

    /// Receiving more data than the advertised window is a protocol violation.
    #[test]
    fn window_overrun_is_rejected() {
        let mut channel = Channel::new(0, 10, 0x8000);
        channel.confirm_open(7, 100, 100);

        assert_eq!(channel.account_received_data(11), Err(()));
    }

    /// Replies resolve the pending requests strictly in FIFO order.
    #[test]
    fn replies_resolve_in_fifo_order() {
        let mut channel = open_channel(100, 100);

        let outcomes = Rc::new(RefCell::new(Vec::new()));

        let first_outcomes = Rc::clone(&outcomes);
        channel.push_pending_reply(Box::new(move |outcome| {
            first_outcomes.borrow_mut().push(("first", outcome));
        }));

        let second_outcomes = Rc::clone(&outcomes);
        channel.push_pending_reply(Box::new(move |outcome| {
            second_outcomes.borrow_mut().push(("second", outcome));
        }));

        assert!(channel.resolve_pending_reply(RequestOutcome::Success));
        assert!(channel.resolve_pending_reply(RequestOutcome::Failure));
        // A third reply has no matching request.
        assert!(!channel.resolve_pending_reply(RequestOutcome::Success));

        assert_eq!(
            &*outcomes.borrow(),
            &[
                ("first", RequestOutcome::Success),
                ("second", RequestOutcome::Failure)
            ]
        );
    }

    /// An eof is only released once the buffered data has drained.
    #[test]
    fn eof_waits_for_drained_buffer() {
        let mut channel = open_channel(1000, 1000);

        channel.queue_data(b"remaining");
        channel.queue_eof();

        assert!(!channel.take_ready_eof());

        let _ = channel.next_outbound_chunk().unwrap();
        assert!(channel.take_ready_eof());
        // It is only sent once.
        assert!(!channel.take_ready_eof());
    }
}
