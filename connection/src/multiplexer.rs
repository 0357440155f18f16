//! Drives a [`Connection`] over a [`transport::Session`].

use std::{fmt, time::Duration};

use transport::{InputStream, OutputStream, Session};

use crate::connection::{Connection, ConnectionError};

/// The cooperative loop that fans one secured transport session out into channels.
///
/// There is exactly one control flow: each tick drains every fully buffered incoming
/// packet into the [`Connection`], flushes outgoing channel data under flow control and
/// then waits for socket readiness, optionally bounded by a timeout. Channels never
/// touch the socket; everything they send goes through the connection's outbox and this
/// loop, so frames are never interleaved or partially written.
pub struct Multiplexer<Input: InputStream, Output: OutputStream> {
    /// The secured transport below the channels.
    session: Session<Input, Output>,
    /// The channel state machine.
    connection: Connection,
}

impl<Input: InputStream, Output: OutputStream> fmt::Debug for Multiplexer<Input, Output> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Multiplexer")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl<Input: InputStream, Output: OutputStream> Multiplexer<Input, Output> {
    /// Creates a multiplexer over an established transport session.
    pub fn new(session: Session<Input, Output>) -> Multiplexer<Input, Output> {
        Multiplexer {
            session,
            connection: Connection::new(),
        }
    }

    /// Returns access to the channel state machine.
    ///
    /// This is where channels are opened, data is queued and event callbacks are
    /// registered.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Returns access to the underlying transport session.
    ///
    /// This is mainly useful for service requests and explicit re-keys.
    pub fn session(&mut self) -> &mut Session<Input, Output> {
        &mut self.session
    }

    /// Dispatches every fully buffered incoming packet.
    async fn drain_incoming(&mut self) -> Result<(), ConnectionError> {
        while let Some(packet) = self
            .session
            .try_next_packet()
            .await
            .map_err(ConnectionError::Transport)?
        {
            self.connection.handle_message(&packet)?;
        }

        Ok(())
    }

    /// Flushes pending channel data and protocol replies through the transport.
    pub async fn flush(&mut self) -> Result<(), ConnectionError> {
        self.connection.flush_channels();

        for payload in self.connection.take_outbox() {
            self.session
                .send_packet(&payload)
                .await
                .map_err(ConnectionError::Transport)?;
        }

        Ok(())
    }

    /// Runs one tick of the cooperative loop.
    ///
    /// A tick dispatches buffered packets, flushes under flow control, waits for socket
    /// readiness (bounded by `timeout` if given) and dispatches whatever arrived. A
    /// timeout is not an error; the tick simply returns.
    pub async fn tick(&mut self, timeout: Option<Duration>) -> Result<(), ConnectionError> {
        self.drain_incoming().await?;
        self.flush().await?;

        match timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.session.read_more()).await {
                    Ok(result) => {
                        result.map_err(ConnectionError::Transport)?;
                    }
                    Err(_) => return Ok(()),
                }
            }
            None => {
                self.session
                    .read_more()
                    .await
                    .map_err(ConnectionError::Transport)?;
            }
        }

        self.drain_incoming().await?;
        self.flush().await
    }

    /// Runs the loop until the transport fails or the peer disconnects.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.tick(None).await?;
        }
    }
}
