//! Response definitions
//!
//! Represents responses to clients.

use std::fmt;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidRequest = 1,
    InvalidMethod = 2,
    InvalidOperand = 3,
    DivByZero = 4,
    InternalError = 20,
}

impl Status {
    /// Numeric code written on the wire
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a wire code back to a status
    pub fn from_code(code: i32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::InvalidRequest),
            2 => Some(Status::InvalidMethod),
            3 => Some(Status::InvalidOperand),
            4 => Some(Status::DivByZero),
            20 => Some(Status::InternalError),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::InvalidRequest => "INVALID_REQUEST",
            Status::InvalidMethod => "INVALID_METHOD",
            Status::InvalidOperand => "INVALID_OPERAND",
            Status::DivByZero => "DIV_BY_ZERO",
            Status::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response to send to client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    /// Id of the request being answered, or -1 if it could not be identified
    pub request_id: i32,

    /// Status code
    pub status: Status,

    /// Result of the calculation (0 on error)
    pub result: f64,
}

impl Response {
    /// Id used when a response cannot be attributed to a specific request
    pub const UNATTRIBUTED_ID: i32 = -1;

    /// Create an OK response carrying a result
    pub fn ok(request_id: i32, result: f64) -> Self {
        Self {
            request_id,
            status: Status::Ok,
            result,
        }
    }

    /// Create an error response; the result is always zero
    pub fn error(request_id: i32, status: Status) -> Self {
        Self {
            request_id,
            status,
            result: 0.0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
