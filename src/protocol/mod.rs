//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (Delimited Text)
//!
//! Every message is ASCII text: fields are separated by `#` and the message
//! is terminated by `$`. Both characters are reserved.
//!
//! ### Request Format
//! ```text
//! ┌──────┬───┬──────────┬───┬──────────┬───┬──────────┬───┐
//! │  id  │ # │  method  │ # │ operand1 │ # │ operand2 │ $ │
//! └──────┴───┴──────────┴───┴──────────┴───┴──────────┴───┘
//! ```
//!
//! ### Methods
//! - GETMEM, RESMEM: memory access (operands ignored)
//! - ADD, SUB, MUL, DIV: plain arithmetic
//! - ADDM, SUBM, MULM: arithmetic folded into memory
//!
//! ### Response Format
//! ```text
//! ┌────────────┬───┬──────────┬───┬──────────┬───┐
//! │ request_id │ # │  status  │ # │  result  │ $ │
//! └────────────┴───┴──────────┴───┴──────────┴───┘
//! ```
//!
//! ### Status Codes
//! - 0: OK
//! - 1: INVALID_REQUEST
//! - 2: INVALID_METHOD
//! - 3: INVALID_OPERAND
//! - 4: DIV_BY_ZERO
//! - 20: INTERNAL_ERROR

mod request;
mod response;
mod codec;
mod deserializer;

pub use request::{Method, Request};
pub use response::{Response, Status};
pub use codec::{
    decode_request, decode_response, format_double, parse_request_span, parse_response_span,
    serialize_request, serialize_response, FrameError, ParseError, FIELD_DELIMITER,
    MAX_NUMERIC_FIELD_LEN, MESSAGE_DELIMITER, REQUEST_FIELD_COUNT, RESPONSE_FIELD_COUNT,
};
pub use deserializer::{DeserializerState, MessageHandler, RingDeserializer, Role};
