//! Client Module
//!
//! Connects to a calcwire server over any transport and correlates
//! responses with requests by id.
//!
//! ## Architecture
//! - The caller's thread serializes and sends requests
//! - A reader thread owns the response deserializer and forwards decoded
//!   responses (and decode errors) over a channel
//! - [`Client::call`] waits on that channel for the response carrying the
//!   id it just sent

mod input;
mod socket;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::config::ClientConfig;
use crate::error::{CalcError, Result};
use crate::network::{is_disconnect, is_timeout};
use crate::protocol::{
    serialize_request, MessageHandler, Method, ParseError, Request, Response, RingDeserializer,
    Role, MESSAGE_DELIMITER,
};

pub use input::{parse_expression, Expression, InputError};

use socket::ClientSocket;

/// Something the reader thread decoded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientEvent {
    Response(Response),

    /// A response frame from the server was malformed
    Error { request_id: i32, error: ParseError },
}

/// Forwards decoded responses to the client's channel
struct EventForwarder {
    tx: Sender<ClientEvent>,
}

impl MessageHandler for EventForwarder {
    fn on_response(&mut self, response: Response) -> Result<()> {
        self.tx
            .send(ClientEvent::Response(response))
            .map_err(|_| CalcError::Disconnected)
    }

    fn on_error(&mut self, request_id: i32, error: ParseError) -> Result<()> {
        tracing::warn!(request_id, code = error.code(), "malformed response: {}", error);
        self.tx
            .send(ClientEvent::Error { request_id, error })
            .map_err(|_| CalcError::Disconnected)
    }
}

/// Calculator client
pub struct Client {
    socket: ClientSocket,
    events: Receiver<ClientEvent>,
    reader: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
    next_id: i32,
    /// Frames sent whose response has not been received yet
    outstanding: AtomicUsize,
    response_timeout: Duration,
    /// Socket file this client bound (UNIX datagram only)
    local_path: Option<PathBuf>,
}

impl Client {
    /// Connect to the server described by the config
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let (socket, local_path) = ClientSocket::connect(config)?;

        let reader_socket = socket.try_clone()?;
        reader_socket.set_recv_timeout(Some(Duration::from_millis(
            config.poll_interval_ms.max(1),
        )))?;

        let (tx, rx) = channel::unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = Arc::clone(&closed);
        let deserializer = RingDeserializer::new(Role::Client, config.ring_buffer_size);

        let reader = thread::Builder::new()
            .name("calc-client-reader".to_string())
            .spawn(move || read_responses(reader_socket, deserializer, tx, reader_closed))?;

        tracing::debug!("Connected over {}", config.transport);

        Ok(Self {
            socket,
            events: rx,
            reader: Some(reader),
            closed,
            next_id: 0,
            outstanding: AtomicUsize::new(0),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            local_path,
        })
    }

    /// Send a request with the next id; returns that id
    pub fn send(&mut self, method: Method, operand1: f64, operand2: f64) -> Result<i32> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.send_request(&Request::new(id, method, operand1, operand2))?;
        Ok(id)
    }

    /// Send a request with a caller-chosen id
    pub fn send_request(&self, request: &Request) -> Result<()> {
        let frame = serialize_request(request)?;
        self.send_raw(&frame)?;
        tracing::trace!("Sent request {}", request.id);
        Ok(())
    }

    /// Send bytes as-is (they need not be a valid frame)
    pub fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        self.socket.send_frame(bytes).map_err(|e| {
            if is_disconnect(&e) {
                CalcError::Disconnected
            } else {
                CalcError::from(e)
            }
        })?;

        // The server answers once per terminator; a datagram without one
        // still gets a single rejection
        let mut replies = bytes.iter().filter(|&&b| b == MESSAGE_DELIMITER).count();
        if self.socket.is_datagram() {
            replies = replies.max(1);
        }
        self.outstanding.fetch_add(replies, Ordering::AcqRel);
        Ok(())
    }

    /// Wait for the next decoded event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ClientEvent> {
        let event = self.events.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => CalcError::Timeout,
            RecvTimeoutError::Disconnected => CalcError::Disconnected,
        })?;
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        Ok(event)
    }

    /// Frames sent that have not been answered yet
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Send a request and wait for its response
    ///
    /// Responses for other ids are discarded. An unattributed (-1) response
    /// is the server rejecting a frame; it is taken as the answer only when
    /// this request is the sole one still awaiting a reply, otherwise it
    /// belongs to an earlier frame and is discarded too.
    pub fn call(&mut self, method: Method, operand1: f64, operand2: f64) -> Result<Response> {
        let id = self.send(method, operand1, operand2)?;
        let deadline = Instant::now() + self.response_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CalcError::Timeout);
            }

            // Counted before this event is consumed
            let sole_pending = self.outstanding() <= 1;

            match self.recv_timeout(remaining)? {
                ClientEvent::Response(response)
                    if response.request_id == id
                        || (response.request_id == Response::UNATTRIBUTED_ID && sole_pending) =>
                {
                    return Ok(response);
                }
                ClientEvent::Response(response) => {
                    tracing::debug!("Discarding stale response for request {}", response.request_id);
                }
                ClientEvent::Error { request_id, error }
                    if request_id == id
                        || (request_id == Response::UNATTRIBUTED_ID && sole_pending) =>
                {
                    return Err(CalcError::Protocol(format!(
                        "malformed response to request {}: {}",
                        id, error
                    )));
                }
                ClientEvent::Error { .. } => {}
            }
        }
    }

    /// Id the next `send` will use
    pub fn next_id(&self) -> i32 {
        self.next_id
    }

    /// Close the socket and stop the reader thread
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.socket.close();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::error!("Client reader thread panicked");
            }
        }
        if let Some(path) = self.local_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader thread body: decode everything the server sends
fn read_responses(
    socket: ClientSocket,
    mut deserializer: RingDeserializer,
    tx: Sender<ClientEvent>,
    closed: Arc<AtomicBool>,
) {
    let datagram = socket.is_datagram();
    let mut forwarder = EventForwarder { tx };
    let mut buf = [0u8; 512];

    while !closed.load(Ordering::Acquire) {
        let n = match socket.recv_chunk(&mut buf) {
            Ok(0) if !datagram => {
                tracing::debug!("Server closed the connection");
                break;
            }
            Ok(n) => n,
            Err(ref e) if is_timeout(e) || e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if !closed.load(Ordering::Acquire) {
                    tracing::warn!("Read error: {}", e);
                }
                break;
            }
        };

        if let Err(e) = deserializer.feed(&buf[..n], &mut forwarder) {
            tracing::debug!("Stopping response reader: {}", e);
            break;
        }
        if datagram && !deserializer.is_idle() {
            deserializer.reset();
        }
    }
}
