//! Connection Handler
//!
//! Handles individual client connections of the stream transports.

use std::io::BufWriter;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{CalcError, Result};
use crate::protocol::{RingDeserializer, Role};
use crate::service::Calculator;

use super::session::{Session, StreamWriter};
use super::transport::{is_disconnect, is_timeout, StreamConnection};

/// Handles a single client connection
///
/// Owns the connection's deserializer and session; nothing here is shared
/// with other connections.
pub struct Connection<S: StreamConnection> {
    /// Read half of the socket (raw, chunks go straight to the parser)
    reader: S,

    /// Parser state for this connection only
    deserializer: RingDeserializer,

    /// Writes responses through a buffered clone of the socket
    session: Session<StreamWriter<BufWriter<S>>>,

    /// Size of each read
    chunk_size: usize,

    /// Peer address for logging
    peer_addr: String,
}

impl<S: StreamConnection> Connection<S> {
    /// Create a new connection handler
    ///
    /// Clones the socket for writing and applies the configured timeouts
    pub fn new(stream: S, service: Arc<dyn Calculator>, config: &Config) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream.peer_label();

        let timeout = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        stream.set_io_timeouts(timeout(config.read_timeout_ms), timeout(config.write_timeout_ms))?;

        let write_stream = stream.try_clone_conn()?;

        Ok(Self {
            reader: stream,
            deserializer: RingDeserializer::new(Role::Server, config.ring_buffer_size),
            session: Session::new(StreamWriter(BufWriter::new(write_stream)), service),
            chunk_size: config.read_chunk_size.max(1),
            peer_addr,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Feeds every chunk read into the deserializer; responses are written
    /// from inside the session callbacks in the order requests complete.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = match self.reader.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!(
                        "Client {} disconnected after {} requests",
                        self.peer_addr,
                        self.session.requests_handled()
                    );
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(ref e) if is_disconnect(e) => {
                    tracing::debug!("Connection to {} closed: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(ref e) if is_timeout(e) => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            };

            tracing::trace!("Read {} bytes from {}", n, self.peer_addr);

            if let Err(e) = self.deserializer.feed(&buf[..n], &mut self.session) {
                // Peer hung up with responses still pending
                if let CalcError::Io(ref io_err) = e {
                    if is_disconnect(io_err) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Requests answered on this connection so far
    pub fn requests_handled(&self) -> u64 {
        self.session.requests_handled()
    }
}
