//! Iteration budget shared by nested simulations

use crate::{CombatError, Result};
use std::cell::Cell;

/// Default ceiling for a standalone counter
pub const DEFAULT_MAX_ITERATIONS: u64 = 100_000;

/// Default ceiling used by the blocking searches
pub const DEFAULT_SEARCH_ITERATIONS: u64 = 1_000_000;

/// Counts full combat simulations and enforces a maximum
///
/// One counter is shared (usually behind an `Rc`) by the search, the
/// evaluator and the optimal damage-order strategy, so every nested
/// simulation draws from the same budget.
#[derive(Debug)]
pub struct IterationCounter {
    max_iterations: u64,
    count: Cell<u64>,
}

impl IterationCounter {
    pub fn new(max_iterations: u64) -> Self {
        IterationCounter {
            max_iterations,
            count: Cell::new(0),
        }
    }

    /// Record one simulation; fails once the count exceeds the maximum
    pub fn increment(&self) -> Result<()> {
        let count = self.count.get() + 1;
        self.count.set(count);
        if count > self.max_iterations {
            return Err(CombatError::IterationLimitExceeded {
                limit: self.max_iterations,
            });
        }
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count.get()
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn remaining(&self) -> u64 {
        self.max_iterations.saturating_sub(self.count.get())
    }
}

impl Default for IterationCounter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}
