//! Budgets and interrupt polling.

/// Resource counters, caller supplied budgets and the interrupt callback.
///
/// The counters are cumulative over the lifetime of the solver; budgets are
/// applied per `solve` call relative to a baseline recorded when the call
/// starts.
pub struct Limits<'a> {
    pub propagations: u64,
    pub decisions: u64,
    pub conflicts: u64,
    propagation_budget: Option<u64>,
    decision_budget: Option<u64>,
    propagation_base: u64,
    decision_base: u64,
    interrupt: Option<Box<dyn FnMut() -> bool + 'a>>,
}

impl<'a> Default for Limits<'a> {
    fn default() -> Limits<'a> {
        Limits {
            propagations: 0,
            decisions: 0,
            conflicts: 0,
            propagation_budget: None,
            decision_budget: None,
            propagation_base: 0,
            decision_base: 0,
            interrupt: None,
        }
    }
}

impl<'a> Limits<'a> {
    /// Set the per-call propagation and decision budgets.
    ///
    /// `None` removes the corresponding budget.
    pub fn set_budget(&mut self, propagations: Option<u64>, decisions: Option<u64>) {
        self.propagation_budget = propagations;
        self.decision_budget = decisions;
    }

    /// Install the interrupt callback polled at decision boundaries.
    pub fn set_interrupt(&mut self, callback: impl FnMut() -> bool + 'a) {
        self.interrupt = Some(Box::new(callback));
    }

    /// Remove the interrupt callback.
    pub fn clear_interrupt(&mut self) {
        self.interrupt = None;
    }

    /// Record the budget baseline for a starting `solve` call.
    pub fn start_solve(&mut self) {
        self.propagation_base = self.propagations;
        self.decision_base = self.decisions;
    }

    /// Whether a budget of the current call is used up.
    pub fn budget_exhausted(&self) -> bool {
        if let Some(budget) = self.propagation_budget {
            if self.propagations - self.propagation_base >= budget {
                return true;
            }
        }
        if let Some(budget) = self.decision_budget {
            if self.decisions - self.decision_base >= budget {
                return true;
            }
        }
        false
    }

    /// Poll the interrupt callback.
    pub fn interrupted(&mut self) -> bool {
        match &mut self.interrupt {
            Some(callback) => callback(),
            None => false,
        }
    }

    /// Whether search has to stop at the next safe point.
    pub fn should_stop(&mut self) -> bool {
        self.budget_exhausted() || self.interrupted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_are_relative_to_solve_start() {
        let mut limits = Limits::default();
        limits.propagations = 1000;
        limits.set_budget(Some(10), None);
        limits.start_solve();
        assert!(!limits.budget_exhausted());
        limits.propagations += 10;
        assert!(limits.budget_exhausted());

        // A new call gets a fresh allowance.
        limits.start_solve();
        assert!(!limits.budget_exhausted());
    }

    #[test]
    fn interrupt_callback_is_polled() {
        let mut limits = Limits::default();
        assert!(!limits.should_stop());

        let mut calls = 0;
        limits.set_interrupt(move || {
            calls += 1;
            calls > 1
        });
        assert!(!limits.should_stop());
        assert!(limits.should_stop());
    }
}
