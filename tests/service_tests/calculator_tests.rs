//! Calculator Tests
//!
//! Tests for the arithmetic service and its memory cell.

use std::sync::Arc;
use std::thread;

use calcwire::{CalcError, CalcService, Calculator};

// =============================================================================
// Arithmetic Tests
// =============================================================================

#[test]
fn test_plain_arithmetic() {
    let calc = CalcService::new();

    assert_eq!(calc.add(2.0, 3.0, false), 5.0);
    assert_eq!(calc.sub(2.0, 3.0, false), -1.0);
    assert_eq!(calc.mul(16.0, 20.0, false), 320.0);
    assert_eq!(calc.div(9.0, 2.0).unwrap(), 4.5);

    // Plain operations leave memory alone
    assert_eq!(calc.get_memory(), 0.0);
}

#[test]
fn test_division_by_zero() {
    let calc = CalcService::new();

    assert!(matches!(calc.div(5.0, 0.0), Err(CalcError::DivisionByZero)));
    assert!(matches!(calc.div(5.0, -0.0), Err(CalcError::DivisionByZero)));
    assert_eq!(calc.div(0.0, 5.0).unwrap(), 0.0);
}

// =============================================================================
// Memory Tests
// =============================================================================

#[test]
fn test_add_to_memory() {
    let calc = CalcService::new();

    assert_eq!(calc.add(5.0, 5.0, true), 10.0);
    assert_eq!(calc.get_memory(), 10.0);

    assert_eq!(calc.add(1.0, 2.0, true), 13.0);
    assert_eq!(calc.get_memory(), 13.0);
}

#[test]
fn test_sub_from_memory() {
    let calc = CalcService::new();
    calc.add(4.0, 0.0, true);

    // memory = (a - b) - memory
    assert_eq!(calc.sub(10.0, 1.0, true), 5.0);
    assert_eq!(calc.get_memory(), 5.0);
}

#[test]
fn test_mul_into_memory() {
    let calc = CalcService::new();

    // Memory starts at zero, so the product is absorbed
    assert_eq!(calc.mul(3.0, 4.0, true), 0.0);

    calc.add(2.0, 0.0, true);
    assert_eq!(calc.mul(3.0, 4.0, true), 24.0);
    assert_eq!(calc.get_memory(), 24.0);
}

#[test]
fn test_reset_memory() {
    let calc = CalcService::new();
    calc.add(7.0, 1.0, true);

    calc.reset_memory();
    assert_eq!(calc.get_memory(), 0.0);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_shared_memory_updates_are_not_lost() {
    let calc: Arc<dyn Calculator> = Arc::new(CalcService::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let calc = Arc::clone(&calc);
            thread::spawn(move || {
                for _ in 0..1000 {
                    calc.add(1.0, 0.0, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calc.get_memory(), 8000.0);
}
