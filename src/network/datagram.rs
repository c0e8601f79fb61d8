//! Datagram Server
//!
//! Single-threaded receive loop for UDP and UNIX datagram sockets. Each
//! packet carries one complete request and is answered with one packet sent
//! back to its originator. No retransmission or duplicate suppression is
//! performed: a lost packet is simply lost.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{Response, RingDeserializer, Role, Status};
use crate::service::{CalcService, Calculator};

use super::session::{ResponseWriter, Session};
use super::transport::{is_disconnect, is_timeout, DatagramSocket};

/// Replies to the sender of the packet being processed
pub struct DatagramReply<'a, S: DatagramSocket> {
    socket: &'a S,
    peer: S::Addr,
}

impl<'a, S: DatagramSocket> DatagramReply<'a, S> {
    pub fn new(socket: &'a S, peer: S::Addr) -> Self {
        Self { socket, peer }
    }

    pub fn peer(&self) -> &S::Addr {
        &self.peer
    }
}

impl<S: DatagramSocket> ResponseWriter for DatagramReply<'_, S> {
    fn send_response(&mut self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_packet(frame, &self.peer)?;
        if sent < frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }
}

/// Receive loop for connectionless transports
pub struct DatagramServer<S: DatagramSocket> {
    socket: S,

    config: Config,

    /// One parser for the whole process; packets never interleave
    deserializer: RingDeserializer,

    service: Arc<dyn Calculator>,

    shutdown: Arc<AtomicBool>,

    packets_received: u64,
}

impl<S: DatagramSocket> DatagramServer<S> {
    pub fn new(socket: S, config: Config, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            socket,
            deserializer: RingDeserializer::new(Role::Server, config.ring_buffer_size),
            config,
            service: Arc::new(CalcService::new()),
            shutdown,
            packets_received: 0,
        }
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Serve packets until shutdown is requested (blocking)
    pub fn run(&mut self) -> Result<()> {
        let poll = Duration::from_millis(self.config.accept_poll_ms);
        self.socket.set_recv_timeout(Some(poll))?;

        tracing::info!("Serving datagrams on {}", self.socket.local_label());
        let mut buf = vec![0u8; self.config.datagram_buffer_size.max(1)];

        while !self.shutdown.load(Ordering::Relaxed) {
            let (n, peer) = match self.socket.recv_packet(&mut buf) {
                Ok(received) => received,
                Err(ref e) if is_timeout(e) => continue,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if is_disconnect(e) || e.kind() == io::ErrorKind::ConnectionRefused => {
                    // ICMP feedback about an earlier reply; not fatal
                    tracing::debug!("Ignoring receive error: {}", e);
                    continue;
                }
                Err(e) => {
                    tracing::error!("Could not read from datagram socket: {}", e);
                    return Err(e.into());
                }
            };

            self.packets_received += 1;
            tracing::trace!("Received {} bytes from {:?}", n, peer);

            if let Err(e) = self.handle_packet(&buf[..n], peer) {
                tracing::warn!("Could not answer datagram: {}", e);
            }
        }

        tracing::info!(
            "Datagram server stopped after {} packets",
            self.packets_received
        );
        Ok(())
    }

    /// Parse one packet and answer its sender
    ///
    /// A packet that contains no terminated message gets an
    /// unattributed INVALID_REQUEST reply.
    pub fn handle_packet(&mut self, packet: &[u8], peer: S::Addr) -> Result<()> {
        let reply = DatagramReply::new(&self.socket, peer);
        let mut session = Session::new(reply, Arc::clone(&self.service));

        let fed = self.deserializer.feed(packet, &mut session);

        // Packets are self-contained: never carry a fragment into the next one
        if !self.deserializer.is_idle() {
            tracing::debug!("Datagram ended inside a message, dropping the fragment");
            self.deserializer.reset();
        }
        let found = fed?;

        if found == 0 && session.errors_reported() == 0 {
            session.send(Response::error(
                Response::UNATTRIBUTED_ID,
                Status::InvalidRequest,
            ))?;
        }
        Ok(())
    }
}
