//! Implements the SSH connection protocol from the client side.
//!
//! A single secured transport session is fanned out into many logical channels with
//! windowed flow control, as described in RFC 4254. The crate splits into a sans-io
//! core ([`Connection`]), which holds all channel state and is driven by feeding it
//! packets, and the [`Multiplexer`], which connects that core to a
//! [`transport::Session`] with a cooperative readiness loop.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

pub use channel::{Channel, ChannelEvents, ChannelState, RequestOutcome};
pub use connection::{
    Anomaly, ChannelOpenFailed, Connection, ConnectionError, OpenRejection,
    DEFAULT_MAXIMUM_PACKET_SIZE, DEFAULT_WINDOW_SIZE,
};
pub use multiplexer::Multiplexer;

mod channel;
mod connection;
pub mod messages;
mod multiplexer;
