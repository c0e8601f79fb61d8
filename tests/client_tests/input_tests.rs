//! Input Tests
//!
//! Tests for parsing calculator expressions typed at the CLI prompt.

use calcwire::client::{parse_expression, Expression, InputError};
use calcwire::protocol::Method;

fn call(method: Method, operand1: f64, operand2: f64) -> Expression {
    Expression::Call {
        method,
        operand1,
        operand2,
    }
}

// =============================================================================
// Keyword Tests
// =============================================================================

#[test]
fn test_keywords() {
    assert_eq!(parse_expression("quit"), Ok(Expression::Quit));
    assert_eq!(parse_expression("  mem\n"), Ok(call(Method::GetMemory, 0.0, 0.0)));
    assert_eq!(parse_expression("reset"), Ok(call(Method::ResetMemory, 0.0, 0.0)));
}

// =============================================================================
// Operator Tests
// =============================================================================

#[test]
fn test_plain_operators() {
    assert_eq!(parse_expression("5+3"), Ok(call(Method::Add, 5.0, 3.0)));
    assert_eq!(parse_expression("5-3"), Ok(call(Method::Sub, 5.0, 3.0)));
    assert_eq!(parse_expression("16*20"), Ok(call(Method::Mul, 16.0, 20.0)));
    assert_eq!(parse_expression("9/2"), Ok(call(Method::Div, 9.0, 2.0)));
}

#[test]
fn test_memory_operators_take_priority() {
    assert_eq!(parse_expression("5++5"), Ok(call(Method::AddMem, 5.0, 5.0)));
    assert_eq!(parse_expression("5--5"), Ok(call(Method::SubMem, 5.0, 5.0)));
    assert_eq!(parse_expression("5**5"), Ok(call(Method::MulMem, 5.0, 5.0)));
}

#[test]
fn test_spaces_and_decimals() {
    assert_eq!(
        parse_expression(" 1.5 * 2.25 "),
        Ok(call(Method::Mul, 1.5, 2.25))
    );
}

#[test]
fn test_negative_operands() {
    assert_eq!(parse_expression("-5+3"), Ok(call(Method::Add, -5.0, 3.0)));
    assert_eq!(parse_expression("5+-3"), Ok(call(Method::Add, 5.0, -3.0)));
    assert_eq!(parse_expression("4*-2"), Ok(call(Method::Mul, 4.0, -2.0)));
}

#[test]
fn test_exponent_notation_operand() {
    assert_eq!(parse_expression("1e-3+1"), Ok(call(Method::Add, 0.001, 1.0)));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_unrecognized_input() {
    assert!(matches!(
        parse_expression("hello"),
        Err(InputError::Unrecognized(_))
    ));
    assert!(matches!(parse_expression(""), Err(InputError::Unrecognized(_))));
}

#[test]
fn test_invalid_operands() {
    assert_eq!(
        parse_expression("a+b"),
        Err(InputError::InvalidOperands("a+b".to_string()))
    );
    assert!(matches!(
        parse_expression("5/"),
        Err(InputError::InvalidOperands(_))
    ));
}
