//! Protocol codec
//!
//! Encoding of requests/responses into delimited text frames, and decoding
//! of a single delimited span back into records.
//!
//! ## Wire Format
//!
//! ```text
//! Request:   <id>#<method>#<operand1>#<operand2>$     e.g. 1620#MUL#16#20$
//! Response:  <request_id>#<status>#<result>$          e.g. 1620#0#320$
//! ```
//!
//! Floating point fields use the shortest text that reads back to the same
//! value (`20.5`, `320`). Values whose exact text would be too wide fall back
//! to six decimals with trailing zeros and a trailing decimal point stripped.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{Method, Request, Response, Status};
use crate::error::{CalcError, Result};

/// Separates fields inside a message
pub const FIELD_DELIMITER: u8 = b'#';

/// Terminates a message
pub const MESSAGE_DELIMITER: u8 = b'$';

/// Number of fields in a request frame
pub const REQUEST_FIELD_COUNT: usize = 4;

/// Number of fields in a response frame
pub const RESPONSE_FIELD_COUNT: usize = 3;

/// Upper bound on the printed width of a single numeric field
pub const MAX_NUMERIC_FIELD_LEN: usize = 64;

// =============================================================================
// Parse Errors
// =============================================================================

/// Framing and field errors found while decoding a message
///
/// These are never fatal to a connection: the server turns each of them into
/// a response with a matching [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("message exceeded the ring buffer before a terminator was found")]
    Overflow,

    #[error("malformed request frame")]
    InvalidRequest,

    #[error("invalid request id")]
    InvalidRequestId,

    #[error("unknown request method")]
    InvalidRequestMethod,

    #[error("invalid first operand")]
    InvalidRequestOperand1,

    #[error("invalid second operand")]
    InvalidRequestOperand2,

    #[error("malformed response frame")]
    InvalidResponse,

    #[error("invalid response request id")]
    InvalidResponseId,

    #[error("invalid response status")]
    InvalidResponseStatus,

    #[error("invalid response result")]
    InvalidResponseResult,
}

impl ParseError {
    /// Stable internal error code (used in logs)
    pub fn code(self) -> i32 {
        match self {
            ParseError::Overflow => 100,
            ParseError::InvalidRequest => 101,
            ParseError::InvalidRequestId => 102,
            ParseError::InvalidRequestMethod => 103,
            ParseError::InvalidRequestOperand1 => 104,
            ParseError::InvalidRequestOperand2 => 105,
            ParseError::InvalidResponse => 201,
            ParseError::InvalidResponseId => 202,
            ParseError::InvalidResponseStatus => 203,
            ParseError::InvalidResponseResult => 204,
        }
    }

    /// Public status reported to the peer for this error
    pub fn status(self) -> Status {
        match self {
            ParseError::Overflow | ParseError::InvalidRequest | ParseError::InvalidRequestId => {
                Status::InvalidRequest
            }
            ParseError::InvalidRequestMethod => Status::InvalidMethod,
            ParseError::InvalidRequestOperand1 | ParseError::InvalidRequestOperand2 => {
                Status::InvalidOperand
            }
            ParseError::InvalidResponse
            | ParseError::InvalidResponseId
            | ParseError::InvalidResponseStatus
            | ParseError::InvalidResponseResult => Status::InternalError,
        }
    }
}

/// A parse error together with the request id it could be attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{error} (request {request_id})")]
pub struct FrameError {
    /// Id parsed from the frame, or -1 if the id itself was unreadable
    pub request_id: i32,

    pub error: ParseError,
}

impl FrameError {
    pub fn new(request_id: i32, error: ParseError) -> Self {
        Self { request_id, error }
    }

    pub fn unattributed(error: ParseError) -> Self {
        Self::new(Response::UNATTRIBUTED_ID, error)
    }
}

// =============================================================================
// Serialization
// =============================================================================

/// Format a double the way the protocol expects
///
/// Prefers the shortest exact form; otherwise six decimals with trailing
/// zeros and a trailing point removed. Fails if even that would be wider
/// than [`MAX_NUMERIC_FIELD_LEN`].
pub fn format_double(value: f64) -> Result<String> {
    let exact = value.to_string();
    if exact.len() <= MAX_NUMERIC_FIELD_LEN {
        return Ok(exact);
    }

    let mut text = format!("{:.6}", value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }

    if text.len() > MAX_NUMERIC_FIELD_LEN {
        return Err(CalcError::Serialization(format!(
            "numeric field too wide: {} bytes (max {})",
            text.len(),
            MAX_NUMERIC_FIELD_LEN
        )));
    }
    Ok(text)
}

/// Encode a request to bytes
///
/// Format: id # method # operand1 # operand2 $
pub fn serialize_request(request: &Request) -> Result<Bytes> {
    let id = request.id.to_string();
    let method = request.method.as_wire();
    let operand1 = format_double(request.operand1)?;
    let operand2 = format_double(request.operand2)?;

    let mut buf = BytesMut::with_capacity(
        id.len() + method.len() + operand1.len() + operand2.len() + REQUEST_FIELD_COUNT,
    );
    buf.put_slice(id.as_bytes());
    buf.put_u8(FIELD_DELIMITER);
    buf.put_slice(method.as_bytes());
    buf.put_u8(FIELD_DELIMITER);
    buf.put_slice(operand1.as_bytes());
    buf.put_u8(FIELD_DELIMITER);
    buf.put_slice(operand2.as_bytes());
    buf.put_u8(MESSAGE_DELIMITER);

    Ok(buf.freeze())
}

/// Encode a response to bytes
///
/// Format: request_id # status # result $
pub fn serialize_response(response: &Response) -> Result<Bytes> {
    let id = response.request_id.to_string();
    let status = response.status.code().to_string();
    let result = format_double(response.result)?;

    let mut buf =
        BytesMut::with_capacity(id.len() + status.len() + result.len() + RESPONSE_FIELD_COUNT);
    buf.put_slice(id.as_bytes());
    buf.put_u8(FIELD_DELIMITER);
    buf.put_slice(status.as_bytes());
    buf.put_u8(FIELD_DELIMITER);
    buf.put_slice(result.as_bytes());
    buf.put_u8(MESSAGE_DELIMITER);

    Ok(buf.freeze())
}

// =============================================================================
// Field Parsing
// =============================================================================

fn field_str(field: &[u8]) -> Option<&str> {
    std::str::from_utf8(field).ok().map(str::trim)
}

fn parse_int(field: &[u8]) -> Option<i32> {
    field_str(field)?.parse().ok()
}

fn parse_double(field: &[u8]) -> Option<f64> {
    field_str(field)?.parse().ok()
}

/// Best-effort id of a frame whose field layout is wrong
fn leading_id(span: &[u8]) -> i32 {
    span.split(|&b| b == FIELD_DELIMITER)
        .next()
        .and_then(parse_int)
        .unwrap_or(Response::UNATTRIBUTED_ID)
}

/// Split a span into exactly `N` fields
fn split_fields<const N: usize>(
    span: &[u8],
    error: ParseError,
) -> std::result::Result<[&[u8]; N], FrameError> {
    let mut fields: [&[u8]; N] = [&span[..0]; N];
    let mut count = 0;

    for field in span.split(|&b| b == FIELD_DELIMITER) {
        if count == N {
            return Err(FrameError::new(leading_id(span), error));
        }
        fields[count] = field;
        count += 1;
    }

    if count != N {
        return Err(FrameError::new(leading_id(span), error));
    }
    Ok(fields)
}

/// Parse a request span (without its terminator)
pub fn parse_request_span(span: &[u8]) -> std::result::Result<Request, FrameError> {
    let [id, method, operand1, operand2] =
        split_fields::<REQUEST_FIELD_COUNT>(span, ParseError::InvalidRequest)?;

    let id = parse_int(id).ok_or(FrameError::unattributed(ParseError::InvalidRequestId))?;

    let method = field_str(method).map(Method::from_wire).unwrap_or_default();
    if method == Method::None {
        return Err(FrameError::new(id, ParseError::InvalidRequestMethod));
    }

    let operand1 =
        parse_double(operand1).ok_or(FrameError::new(id, ParseError::InvalidRequestOperand1))?;
    let operand2 =
        parse_double(operand2).ok_or(FrameError::new(id, ParseError::InvalidRequestOperand2))?;

    Ok(Request {
        id,
        method,
        operand1,
        operand2,
    })
}

/// Parse a response span (without its terminator)
pub fn parse_response_span(span: &[u8]) -> std::result::Result<Response, FrameError> {
    let [id, status, result] =
        split_fields::<RESPONSE_FIELD_COUNT>(span, ParseError::InvalidResponse)?;

    let request_id =
        parse_int(id).ok_or(FrameError::unattributed(ParseError::InvalidResponseId))?;

    let status = parse_int(status)
        .and_then(Status::from_code)
        .ok_or(FrameError::new(request_id, ParseError::InvalidResponseStatus))?;

    let result = parse_double(result)
        .ok_or(FrameError::new(request_id, ParseError::InvalidResponseResult))?;

    Ok(Response {
        request_id,
        status,
        result,
    })
}

/// Strip the terminator from a single complete frame
fn frame_body(frame: &[u8], error: ParseError) -> std::result::Result<&[u8], FrameError> {
    match frame.split_last() {
        Some((&MESSAGE_DELIMITER, body)) if !body.contains(&MESSAGE_DELIMITER) => Ok(body),
        _ => Err(FrameError::new(leading_id(frame), error)),
    }
}

/// Decode one complete request frame, terminator included
pub fn decode_request(frame: &[u8]) -> std::result::Result<Request, FrameError> {
    parse_request_span(frame_body(frame, ParseError::InvalidRequest)?)
}

/// Decode one complete response frame, terminator included
pub fn decode_response(frame: &[u8]) -> std::result::Result<Response, FrameError> {
    parse_response_span(frame_body(frame, ParseError::InvalidResponse)?)
}
