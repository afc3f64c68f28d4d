//! CPU budget accounting
//!
//! Every thread carries a [`CpuBudget`]. The scheduler tick charges the
//! executing thread one tick; what happens when the budget runs out depends
//! on the algorithm chosen from the thread's scheduling policy.

use crate::types::Ticks;

/// How a thread's CPU budget is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetAlgorithm {
    /// No enforcement (FIFO)
    #[default]
    None,
    /// Timeslice reloaded on every dispatch (OTHER)
    ResetTimeslice,
    /// Timeslice reloaded only when used up (RR)
    ExhaustTimeslice,
    /// Sporadic server budget, reloaded by replenishment
    Sporadic,
}

/// What the tick did to the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Budget charged, nothing else to do
    Charged,
    /// Timeslice used up; the thread should give up the processor
    Yield,
    /// Sporadic budget just ran out; the demotion callout must run
    Exhausted,
}

/// Per-thread CPU budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuBudget {
    algorithm: BudgetAlgorithm,
    available: Ticks,
}

impl CpuBudget {
    pub fn new(algorithm: BudgetAlgorithm, initial: Ticks) -> Self {
        Self {
            algorithm,
            available: initial,
        }
    }

    pub fn algorithm(&self) -> BudgetAlgorithm {
        self.algorithm
    }

    pub fn available(&self) -> Ticks {
        self.available
    }

    /// Reload the budget (timeslice expiry or sporadic replenishment)
    pub fn reload(&mut self, ticks: Ticks) {
        self.available = ticks;
    }

    /// Called when the thread is dispatched
    pub fn at_context_switch(&mut self, timeslice: Ticks) {
        if self.algorithm == BudgetAlgorithm::ResetTimeslice {
            self.available = timeslice;
        }
    }

    /// Charge one tick
    ///
    /// The sporadic budget is pinned at zero once exhausted: it never
    /// underflows and only a replenishment can raise it again.
    pub fn consume(&mut self, timeslice: Ticks) -> TickOutcome {
        match self.algorithm {
            BudgetAlgorithm::None => TickOutcome::Charged,
            BudgetAlgorithm::ResetTimeslice | BudgetAlgorithm::ExhaustTimeslice => {
                if self.available <= 1 {
                    self.available = timeslice;
                    TickOutcome::Yield
                } else {
                    self.available -= 1;
                    TickOutcome::Charged
                }
            }
            BudgetAlgorithm::Sporadic => match self.available {
                0 => TickOutcome::Charged,
                1 => {
                    self.available = 0;
                    TickOutcome::Exhausted
                }
                n => {
                    self.available = n - 1;
                    TickOutcome::Charged
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_never_yields() {
        let mut budget = CpuBudget::new(BudgetAlgorithm::None, 0);
        for _ in 0..100 {
            assert_eq!(budget.consume(5), TickOutcome::Charged);
        }
    }

    #[test]
    fn test_timeslice_expiry() {
        let mut budget = CpuBudget::new(BudgetAlgorithm::ExhaustTimeslice, 3);
        assert_eq!(budget.consume(3), TickOutcome::Charged);
        assert_eq!(budget.consume(3), TickOutcome::Charged);
        assert_eq!(budget.consume(3), TickOutcome::Yield);
        assert_eq!(budget.available(), 3);
    }

    #[test]
    fn test_reset_on_context_switch() {
        let mut other = CpuBudget::new(BudgetAlgorithm::ResetTimeslice, 3);
        other.consume(3);
        other.at_context_switch(3);
        assert_eq!(other.available(), 3);

        let mut rr = CpuBudget::new(BudgetAlgorithm::ExhaustTimeslice, 3);
        rr.consume(3);
        rr.at_context_switch(3);
        assert_eq!(rr.available(), 2);
    }

    #[test]
    fn test_sporadic_pins_at_zero() {
        let mut budget = CpuBudget::new(BudgetAlgorithm::Sporadic, 2);
        assert_eq!(budget.consume(0), TickOutcome::Charged);
        assert_eq!(budget.consume(0), TickOutcome::Exhausted);
        assert_eq!(budget.available(), 0);
        assert_eq!(budget.consume(0), TickOutcome::Charged);
        assert_eq!(budget.available(), 0);

        budget.reload(2);
        assert_eq!(budget.available(), 2);
    }
}
