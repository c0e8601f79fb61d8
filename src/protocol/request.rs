//! Request definitions
//!
//! Represents calculation requests from clients.

use std::fmt;

/// Calculator operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// No operation; never produced by a successful parse
    #[default]
    None,
    /// Read the value held in memory
    GetMemory,
    /// Reset memory to zero
    ResetMemory,
    Add,
    /// Add, then fold the sum into memory
    AddMem,
    Sub,
    /// Subtract, then fold the difference into memory
    SubMem,
    Mul,
    /// Multiply, then fold the product into memory
    MulMem,
    Div,
}

impl Method {
    /// Every method that can appear on the wire
    pub const ALL: [Method; 9] = [
        Method::GetMemory,
        Method::ResetMemory,
        Method::Add,
        Method::AddMem,
        Method::Sub,
        Method::SubMem,
        Method::Mul,
        Method::MulMem,
        Method::Div,
    ];

    /// Wire name of the method
    pub fn as_wire(self) -> &'static str {
        match self {
            Method::None => "NONE",
            Method::GetMemory => "GETMEM",
            Method::ResetMemory => "RESMEM",
            Method::Add => "ADD",
            Method::AddMem => "ADDM",
            Method::Sub => "SUB",
            Method::SubMem => "SUBM",
            Method::Mul => "MUL",
            Method::MulMem => "MULM",
            Method::Div => "DIV",
        }
    }

    /// Parse a wire name (exact, case-sensitive). Unknown names map to `None`.
    pub fn from_wire(text: &str) -> Method {
        match text {
            "GETMEM" => Method::GetMemory,
            "RESMEM" => Method::ResetMemory,
            "ADD" => Method::Add,
            "ADDM" => Method::AddMem,
            "SUB" => Method::Sub,
            "SUBM" => Method::SubMem,
            "MUL" => Method::Mul,
            "MULM" => Method::MulMem,
            "DIV" => Method::Div,
            _ => Method::None,
        }
    }

    /// Whether the operation reads or writes calculator memory
    pub fn uses_memory(self) -> bool {
        matches!(
            self,
            Method::GetMemory
                | Method::ResetMemory
                | Method::AddMem
                | Method::SubMem
                | Method::MulMem
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A parsed calculation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
    /// Caller-chosen correlation id, echoed in the response
    pub id: i32,

    pub method: Method,

    pub operand1: f64,

    pub operand2: f64,
}

impl Request {
    /// Create a new request
    pub fn new(id: i32, method: Method, operand1: f64, operand2: f64) -> Self {
        Self {
            id,
            method,
            operand1,
            operand2,
        }
    }
}
