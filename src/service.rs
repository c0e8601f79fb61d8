//! Service Module
//!
//! The arithmetic service that fulfils calculation requests.
//!
//! ## Responsibilities
//! - Plain add/sub/mul/div
//! - A single memory cell folded into by the `*M` operations
//! - Divide-by-zero detection
//!
//! ## Concurrency Model
//! All operations take `&self`. The memory cell sits behind a
//! `parking_lot::Mutex`, so one instance can be shared by every connection
//! when the server runs with shared memory; the protocol core itself never
//! locks.

use parking_lot::Mutex;

use crate::error::{CalcError, Result};

/// Operations the server delegates to
pub trait Calculator: Send + Sync {
    /// `a + b`; with `use_memory` the sum is added to memory and the new
    /// memory value is returned
    fn add(&self, a: f64, b: f64, use_memory: bool) -> f64;

    /// `a - b`; with `use_memory` memory becomes `(a - b) - memory`
    fn sub(&self, a: f64, b: f64, use_memory: bool) -> f64;

    /// `a * b`; with `use_memory` memory becomes `(a * b) * memory`
    fn mul(&self, a: f64, b: f64, use_memory: bool) -> f64;

    /// `a / b`, or [`CalcError::DivisionByZero`]
    fn div(&self, a: f64, b: f64) -> Result<f64>;

    fn get_memory(&self) -> f64;

    fn reset_memory(&self);
}

/// Default calculator with one memory cell
#[derive(Debug, Default)]
pub struct CalcService {
    memory: Mutex<f64>,
}

impl CalcService {
    /// Create a service with memory set to zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `fold` to memory and return the new value
    fn fold_into_memory(&self, fold: impl FnOnce(f64) -> f64) -> f64 {
        let mut memory = self.memory.lock();
        *memory = fold(*memory);
        *memory
    }
}

impl Calculator for CalcService {
    fn add(&self, a: f64, b: f64, use_memory: bool) -> f64 {
        let result = a + b;
        if !use_memory {
            return result;
        }
        self.fold_into_memory(|memory| result + memory)
    }

    fn sub(&self, a: f64, b: f64, use_memory: bool) -> f64 {
        let result = a - b;
        if !use_memory {
            return result;
        }
        self.fold_into_memory(|memory| result - memory)
    }

    fn mul(&self, a: f64, b: f64, use_memory: bool) -> f64 {
        let result = a * b;
        if !use_memory {
            return result;
        }
        self.fold_into_memory(|memory| result * memory)
    }

    fn div(&self, a: f64, b: f64) -> Result<f64> {
        if b == 0.0 {
            return Err(CalcError::DivisionByZero);
        }
        Ok(a / b)
    }

    fn get_memory(&self) -> f64 {
        *self.memory.lock()
    }

    fn reset_memory(&self) {
        *self.memory.lock() = 0.0;
    }
}
