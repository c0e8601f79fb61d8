//! Session
//!
//! Server-side handler bound to one transport endpoint: turns decoded
//! requests and parse errors into responses and sends them back.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{CalcError, Result};
use crate::protocol::{
    serialize_response, MessageHandler, Method, ParseError, Request, Response, Status,
};
use crate::service::Calculator;

/// Sends an encoded response frame over a transport
pub trait ResponseWriter {
    fn send_response(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Writer for connection-oriented transports
pub struct StreamWriter<W: Write>(pub W);

impl<W: Write> ResponseWriter for StreamWriter<W> {
    fn send_response(&mut self, frame: &[u8]) -> io::Result<()> {
        self.0.write_all(frame)?;
        self.0.flush()
    }
}

/// Per-connection (or per-packet) request handling context
pub struct Session<W: ResponseWriter> {
    writer: W,
    service: Arc<dyn Calculator>,
    requests_handled: u64,
    errors_reported: u64,
}

impl<W: ResponseWriter> Session<W> {
    pub fn new(writer: W, service: Arc<dyn Calculator>) -> Self {
        Self {
            writer,
            service,
            requests_handled: 0,
            errors_reported: 0,
        }
    }

    /// Compute the response for a request without sending it
    pub fn handle_request(&self, request: &Request) -> Response {
        let svc = &self.service;
        let (a, b) = (request.operand1, request.operand2);

        let outcome = match request.method {
            Method::GetMemory => Ok(svc.get_memory()),
            Method::ResetMemory => {
                svc.reset_memory();
                Ok(0.0)
            }
            Method::Add | Method::AddMem => Ok(svc.add(a, b, request.method == Method::AddMem)),
            Method::Sub | Method::SubMem => Ok(svc.sub(a, b, request.method == Method::SubMem)),
            Method::Mul | Method::MulMem => Ok(svc.mul(a, b, request.method == Method::MulMem)),
            Method::Div => svc.div(a, b).map_err(|e| match e {
                CalcError::DivisionByZero => Status::DivByZero,
                _ => Status::InternalError,
            }),
            Method::None => Err(Status::InvalidMethod),
        };

        match outcome {
            Ok(result) => Response::ok(request.id, result),
            Err(status) => Response::error(request.id, status),
        }
    }

    /// Serialize and write a response
    ///
    /// A response whose result is too wide to encode is replaced by an
    /// INTERNAL_ERROR response for the same request.
    pub fn send(&mut self, response: Response) -> Result<()> {
        let frame = match serialize_response(&response) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(id = response.request_id, "could not serialize response: {}", e);
                serialize_response(&Response::error(response.request_id, Status::InternalError))?
            }
        };

        self.writer.send_response(&frame)?;
        Ok(())
    }

    /// Requests answered so far
    pub fn requests_handled(&self) -> u64 {
        self.requests_handled
    }

    /// Parse errors answered so far
    pub fn errors_reported(&self) -> u64 {
        self.errors_reported
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: ResponseWriter> MessageHandler for Session<W> {
    fn on_request(&mut self, request: Request) -> Result<()> {
        let response = self.handle_request(&request);
        trace!(?request, status = %response.status, result = response.result, "request handled");
        self.requests_handled += 1;
        self.send(response)
    }

    fn on_error(&mut self, request_id: i32, error: ParseError) -> Result<()> {
        debug!(request_id, code = error.code(), "replying to malformed message: {}", error);
        self.errors_reported += 1;
        self.send(Response::error(request_id, error.status()))
    }
}
