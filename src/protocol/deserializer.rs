//! Ring-buffer deserializer
//!
//! Turns arbitrary byte chunks into complete, validated messages.
//!
//! ## Responsibilities
//! - Accumulate partial messages across `feed` calls in a bounded ring
//! - Locate message boundaries (`$`) and split fields (`#`)
//! - Report every framing/field error to the handler, never drop a peer's
//!   message silently
//! - Recover from an oversized message without losing the bytes that follow
//!   it in the same chunk
//!
//! ## State Machine
//! ```text
//!            non-'$' byte                 '$' (dispatch span)
//!   Idle ─────────────────▶ Accumulating ───────────────────▶ Idle
//!                               │
//!                               │ span reached capacity - 1 (on_error Overflow)
//!                               ▼
//!                           Discarding ──── '$' ────▶ Idle
//! ```
//!
//! One instance belongs to exactly one reader; all mutation goes through
//! `&mut self`, so no locking is needed.

use tracing::{debug, trace, warn};

use super::codec::{parse_request_span, parse_response_span, FrameError, MESSAGE_DELIMITER};
use super::{ParseError, Request, Response};
use crate::error::Result;

/// Which kind of message an instance decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Decodes requests (server side)
    Server,

    /// Decodes responses (client side)
    Client,
}

/// Receives the outcome of every delimited message
///
/// Only one of `on_request` / `on_response` is called by a given
/// deserializer, depending on its [`Role`]. Returning an error aborts the
/// current `feed` call; this is how transport failures surface.
pub trait MessageHandler {
    fn on_request(&mut self, request: Request) -> Result<()> {
        warn!(id = request.id, "request received but no request handler is installed");
        Ok(())
    }

    fn on_response(&mut self, response: Response) -> Result<()> {
        warn!(
            id = response.request_id,
            "response received but no response handler is installed"
        );
        Ok(())
    }

    /// `request_id` is -1 when the message could not be attributed
    fn on_error(&mut self, request_id: i32, error: ParseError) -> Result<()>;
}

/// Observable parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeserializerState {
    /// No partial message
    Idle,

    /// A message began at `start` and has `len` bytes so far
    Accumulating { start: usize, len: usize },

    /// Skipping the tail of an oversized message
    Discarding,
}

/// Incremental, chunk-boundary-safe message parser
pub struct RingDeserializer {
    role: Role,

    /// Fixed-size storage for the message in flight
    ring: Box<[u8]>,

    /// Next slot to write
    write_idx: usize,

    /// Where the message in flight began; `None` while idle
    logical_start: Option<usize>,

    /// Bytes accumulated since `logical_start`
    span_len: usize,

    /// Set after an overflow until the oversized message's terminator
    discarding: bool,

    /// Contiguous copy of a wrapped span, reused between messages
    scratch: Vec<u8>,
}

impl RingDeserializer {
    /// Create a deserializer with a ring of `capacity` bytes
    ///
    /// The longest accepted message body is `capacity - 1` bytes, leaving
    /// one slot for the terminator.
    pub fn new(role: Role, capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            role,
            ring: vec![0u8; capacity].into_boxed_slice(),
            write_idx: 0,
            logical_start: None,
            span_len: 0,
            discarding: false,
            scratch: Vec::with_capacity(capacity),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Bytes of the message currently being accumulated
    pub fn buffered_len(&self) -> usize {
        self.span_len
    }

    pub fn is_idle(&self) -> bool {
        self.logical_start.is_none() && !self.discarding
    }

    pub fn state(&self) -> DeserializerState {
        match self.logical_start {
            Some(start) => DeserializerState::Accumulating {
                start,
                len: self.span_len,
            },
            None if self.discarding => DeserializerState::Discarding,
            None => DeserializerState::Idle,
        }
    }

    /// Drop any partial message and return to idle
    pub fn reset(&mut self) {
        self.logical_start = None;
        self.span_len = 0;
        self.discarding = false;
        self.write_idx = 0;
    }

    /// Feed a chunk of bytes
    ///
    /// Calls the handler once for every message completed by this chunk
    /// (including one begun by an earlier chunk) and once per overflow.
    /// Returns the number of terminated messages seen.
    pub fn feed<H: MessageHandler + ?Sized>(
        &mut self,
        bytes: &[u8],
        handler: &mut H,
    ) -> Result<usize> {
        let mut found = 0;

        for &byte in bytes {
            if self.discarding {
                if byte == MESSAGE_DELIMITER {
                    trace!("end of oversized message reached");
                    self.discarding = false;
                }
                continue;
            }

            if byte == MESSAGE_DELIMITER {
                // A terminator with nothing accumulated is noise
                if let Some(start) = self.logical_start.take() {
                    let len = std::mem::replace(&mut self.span_len, 0);
                    found += 1;
                    self.dispatch(start, len, handler)?;
                }
                continue;
            }

            match self.logical_start {
                None => {
                    self.logical_start = Some(self.write_idx);
                }
                Some(_) if self.span_len + 1 >= self.capacity() => {
                    debug!(
                        capacity = self.capacity(),
                        "message overflowed the ring buffer, discarding it"
                    );
                    self.logical_start = None;
                    self.span_len = 0;
                    self.discarding = true;
                    handler.on_error(Response::UNATTRIBUTED_ID, ParseError::Overflow)?;
                    continue;
                }
                Some(_) => {}
            }

            self.ring[self.write_idx] = byte;
            self.write_idx = (self.write_idx + 1) % self.capacity();
            self.span_len += 1;
        }

        Ok(found)
    }

    /// Parse the span `[start, start + len)` and notify the handler
    fn dispatch<H: MessageHandler + ?Sized>(
        &mut self,
        start: usize,
        len: usize,
        handler: &mut H,
    ) -> Result<()> {
        let capacity = self.ring.len();
        self.scratch.clear();
        if start + len <= capacity {
            self.scratch.extend_from_slice(&self.ring[start..start + len]);
        } else {
            self.scratch.extend_from_slice(&self.ring[start..]);
            self.scratch
                .extend_from_slice(&self.ring[..start + len - capacity]);
        }

        match self.role {
            Role::Server => match parse_request_span(&self.scratch) {
                Ok(request) => {
                    trace!(?request, "request decoded");
                    handler.on_request(request)
                }
                Err(FrameError { request_id, error }) => {
                    debug!(request_id, code = error.code(), %error, "invalid request");
                    handler.on_error(request_id, error)
                }
            },
            Role::Client => match parse_response_span(&self.scratch) {
                Ok(response) => {
                    trace!(?response, "response decoded");
                    handler.on_response(response)
                }
                Err(FrameError { request_id, error }) => {
                    debug!(request_id, code = error.code(), %error, "invalid response");
                    handler.on_error(request_id, error)
                }
            },
        }
    }
}
