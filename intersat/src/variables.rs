//! Per-variable metadata.
use intersat_formula::{Lit, Var};

/// Metadata of a single variable.
#[derive(Clone)]
pub struct VarData {
    /// Removed by bounded variable elimination.
    pub eliminated: bool,
    /// Must not be eliminated (currently used as an assumption).
    pub frozen: bool,
    /// Eligible as a decision variable.
    pub decision: bool,
    /// User supplied fixed phase for decisions.
    pub pinned_phase: Option<bool>,
}

impl Default for VarData {
    fn default() -> VarData {
        VarData {
            eliminated: false,
            frozen: false,
            decision: true,
            pinned_phase: None,
        }
    }
}

/// Per-variable metadata and Jeroslow-Wang literal scores.
#[derive(Default)]
pub struct Variables {
    var_data: Vec<VarData>,
    /// One score per literal, indexed by the literal code.
    jwh: Vec<f64>,
    /// Number of variables created by the user.
    count: usize,
}

impl Variables {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_data.resize(count, VarData::default());
        self.jwh.resize(count * 2, 0.0);
    }

    /// Number of variables created so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Create a fresh variable.
    pub fn new_var(&mut self) -> Var {
        let var = Var::from_index(self.count);
        self.count += 1;
        var
    }

    /// Make sure at least `count` variables exist.
    pub fn ensure_count(&mut self, count: usize) {
        if count > self.count {
            self.count = count;
        }
    }

    /// Whether the variable was created by the user.
    pub fn exists(&self, var: Var) -> bool {
        var.index() < self.count
    }

    pub fn var_data(&self, var: Var) -> &VarData {
        &self.var_data[var.index()]
    }

    pub fn var_data_mut(&mut self, var: Var) -> &mut VarData {
        &mut self.var_data[var.index()]
    }

    /// Add the Jeroslow-Wang weight of a clause of length `len` containing
    /// `lit` to the literal's score.
    pub fn bump_jwh(&mut self, lit: Lit, len: usize) {
        self.jwh[lit.code()] += (len.min(64) as f64).exp2().recip();
    }

    /// Jeroslow-Wang score of a literal.
    pub fn jwh(&self, lit: Lit) -> f64 {
        self.jwh[lit.code()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_var_is_sequential() {
        let mut variables = Variables::default();
        assert_eq!(variables.new_var(), Var::from_index(0));
        assert_eq!(variables.new_var(), Var::from_index(1));
        assert_eq!(variables.count(), 2);
        assert!(variables.exists(Var::from_index(1)));
        assert!(!variables.exists(Var::from_index(2)));
    }

    #[test]
    fn jwh_prefers_short_clauses() {
        let mut variables = Variables::default();
        variables.set_var_count(2);
        let a = Var::from_index(0).positive();
        let b = Var::from_index(1).positive();
        variables.bump_jwh(a, 2);
        variables.bump_jwh(b, 5);
        assert!(variables.jwh(a) > variables.jwh(b));
        assert_eq!(variables.jwh(!a), 0.0);
    }
}
