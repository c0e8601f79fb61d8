//! Expression input
//!
//! Parses the calculator REPL syntax into a method and operands.
//!
//! ```text
//! quit        leave the REPL
//! mem         GETMEM
//! reset       RESMEM
//! a++b        ADDM       a+b   ADD
//! a--b        SUBM       a-b   SUB
//! a**b        MULM       a*b   MUL
//! a/b         DIV
//! ```

use thiserror::Error;

use crate::protocol::Method;

/// A parsed line of input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expression {
    Quit,
    Call {
        method: Method,
        operand1: f64,
        operand2: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Invalid input: '{0}'")]
    Unrecognized(String),

    #[error("Invalid operands: '{0}'")]
    InvalidOperands(String),
}

/// Operators in match priority: doubled forms before their single form
const OPERATORS: [(&str, Method); 7] = [
    ("++", Method::AddMem),
    ("+", Method::Add),
    ("--", Method::SubMem),
    ("-", Method::Sub),
    ("**", Method::MulMem),
    ("*", Method::Mul),
    ("/", Method::Div),
];

/// Parse one line of REPL input
pub fn parse_expression(line: &str) -> Result<Expression, InputError> {
    let line = line.trim();

    match line {
        "quit" => return Ok(Expression::Quit),
        "mem" => return Ok(call(Method::GetMemory, 0.0, 0.0)),
        "reset" => return Ok(call(Method::ResetMemory, 0.0, 0.0)),
        _ => {}
    }

    // Operators are searched after the first character so `-5+3` works
    let skip = line.chars().next().map_or(0, char::len_utf8);
    let mut saw_operator = false;

    for (op, method) in OPERATORS {
        let Some(pos) = line[skip..].find(op).map(|p| p + skip) else {
            continue;
        };
        saw_operator = true;

        let lhs = line[..pos].trim().parse::<f64>();
        let rhs = line[pos + op.len()..].trim().parse::<f64>();
        if let (Ok(operand1), Ok(operand2)) = (lhs, rhs) {
            return Ok(call(method, operand1, operand2));
        }
    }

    if saw_operator {
        Err(InputError::InvalidOperands(line.to_string()))
    } else {
        Err(InputError::Unrecognized(line.to_string()))
    }
}

fn call(method: Method, operand1: f64, operand2: f64) -> Expression {
    Expression::Call {
        method,
        operand1,
        operand2,
    }
}
