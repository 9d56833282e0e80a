//! The VSIDS branching heuristic.
//!
//! VSIDS (Variable State Independent Decaying Sum) keeps an activity value
//! per variable. For each conflict the variables involved in the analysis
//! are bumped, i.e. their activity is increased by a constant, and the
//! activity of all variables decays by a constant factor. Decisions branch
//! on the unassigned variable with the highest activity.
//!
//! Instead of decaying all activities each conflict, the bump value is
//! divided by the decay factor each conflict. When a value would overflow,
//! all activities and the bump value are scaled down. Apart from a scaling
//! factor that is the same for all involved values, this is equivalent to
//! the naive implementation, and only the order of activities matters.
use ordered_float::OrderedFloat;

use intersat_formula::Var;

use crate::config::SolverConfig;

/// The VSIDS branching heuristic.
pub struct Vsids {
    /// The activity of each variable.
    activity: Vec<OrderedFloat<f32>>,
    /// A binary max-heap of the variables.
    heap: Vec<Var>,
    /// The position in the binary heap for each variable.
    position: Vec<Option<usize>>,
    /// The value to add on bumping.
    bump: f32,
    /// The inverse of the decay factor.
    inv_decay: f32,
}

impl Default for Vsids {
    fn default() -> Vsids {
        Vsids {
            activity: vec![],
            heap: vec![],
            position: vec![],
            bump: 1.0,
            inv_decay: 1.0 / SolverConfig::default().vsids_decay,
        }
    }
}

impl Vsids {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.activity.len();
        debug_assert!(!self.heap.iter().any(|&v| v.index() >= count));
        self.activity.resize(count, OrderedFloat(0.0));
        self.position.resize(count, None);

        for i in old_count..count {
            self.make_available(Var::from_index(i));
        }
    }

    /// Rescale activities if any value exceeds this value.
    fn rescale_limit() -> f32 {
        std::f32::MAX / 16.0
    }

    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f32) {
        assert!(decay < 1.0);
        assert!(decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }

    /// Current activity of a variable.
    pub fn activity(&self, var: Var) -> f32 {
        self.activity[var.index()].0
    }

    /// Bump a variable by increasing its activity.
    pub fn bump(&mut self, var: Var) {
        let rescale = {
            let value = &mut self.activity[var.index()];
            value.0 += self.bump;
            value.0 >= Self::rescale_limit()
        };
        if rescale {
            self.rescale();
        }
        if let Some(pos) = self.position[var.index()] {
            self.sift_up(pos);
        }
    }

    /// Decay all variable activities.
    pub fn decay(&mut self) {
        self.bump *= self.inv_decay;
        if self.bump >= Self::rescale_limit() {
            self.rescale();
        }
    }

    /// Rescale all values to avoid an overflow.
    fn rescale(&mut self) {
        let rescale_factor = 1.0 / Self::rescale_limit();
        for activity in &mut self.activity {
            activity.0 *= rescale_factor;
        }
        self.bump *= rescale_factor;
    }

    /// Insert a variable into the heap if not already present.
    pub fn make_available(&mut self, var: Var) {
        if self.position[var.index()].is_none() {
            let position = self.heap.len();
            self.position[var.index()] = Some(position);
            self.heap.push(var);
            self.sift_up(position);
        }
    }

    /// Remove and return the variable with the highest activity.
    pub fn pop(&mut self) -> Option<Var> {
        if self.heap.is_empty() {
            return None;
        }
        let var = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            let top_var = self.heap[0];
            self.position[top_var.index()] = Some(0);
            self.sift_down(0);
        }
        self.position[var.index()] = None;
        Some(var)
    }

    /// Heap entry at a relative position in `[0, 1)`, used for random
    /// decisions. The entry stays in the heap.
    pub fn peek_at(&self, fraction: f64) -> Option<Var> {
        if self.heap.is_empty() {
            return None;
        }
        let index = ((self.heap.len() as f64) * fraction) as usize;
        self.heap.get(index.min(self.heap.len() - 1)).cloned()
    }

    /// Move a variable closer to the root until the heap property is
    /// satisfied.
    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            if pos == 0 {
                return;
            }
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if self.activity[parent_var.index()] >= self.activity[var.index()] {
                return;
            }
            self.position[var.index()] = Some(parent_pos);
            self.heap[parent_pos] = var;
            self.position[parent_var.index()] = Some(pos);
            self.heap[pos] = parent_var;
            pos = parent_pos;
        }
    }

    /// Move a variable away from the root until the heap property is
    /// satisfied.
    fn sift_down(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            let mut largest_pos = pos;
            let mut largest_var = var;

            let left_pos = pos * 2 + 1;
            if left_pos < self.heap.len() {
                let left_var = self.heap[left_pos];

                if self.activity[largest_var.index()] < self.activity[left_var.index()] {
                    largest_pos = left_pos;
                    largest_var = left_var;
                }
            }

            let right_pos = pos * 2 + 2;
            if right_pos < self.heap.len() {
                let right_var = self.heap[right_pos];

                if self.activity[largest_var.index()] < self.activity[right_var.index()] {
                    largest_pos = right_pos;
                    largest_var = right_var;
                }
            }

            if largest_pos == pos {
                return;
            }

            self.position[var.index()] = Some(largest_pos);
            self.heap[largest_pos] = var;
            self.position[largest_var.index()] = Some(pos);
            self.heap[pos] = largest_var;
            pos = largest_pos;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_pops_by_activity() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(8);

        while vsids.pop().is_some() {}

        for i in 0..8 {
            for _ in 0..i {
                vsids.bump(Var::from_index(i));
            }
        }

        for i in 0..8 {
            vsids.make_available(Var::from_index((i * 5) % 8));
        }

        for i in (0..8).rev() {
            assert_eq!(vsids.pop(), Some(Var::from_index(i)));
        }
        assert_eq!(vsids.pop(), None);
    }

    #[test]
    fn bumps_reorder_present_entries() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(4);
        vsids.set_decay(0.5);

        vsids.bump(Var::from_index(2));
        vsids.decay();
        vsids.bump(Var::from_index(1));

        // After one decay the second bump is larger.
        assert_eq!(vsids.pop(), Some(Var::from_index(1)));
        assert_eq!(vsids.pop(), Some(Var::from_index(2)));
    }

    #[test]
    fn rescale_preserves_order() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(4);
        vsids.set_decay(1.0 / 8.0);

        for i in 0..4 {
            for _ in 0..i {
                vsids.bump(Var::from_index(i));
            }
        }

        // Enough decays to force a rescale of the bump value.
        for _ in 0..60 {
            vsids.decay();
        }
        vsids.bump(Var::from_index(0));

        assert_eq!(vsids.pop(), Some(Var::from_index(0)));
        assert_eq!(vsids.pop(), Some(Var::from_index(3)));
        assert_eq!(vsids.pop(), Some(Var::from_index(2)));
        assert_eq!(vsids.pop(), Some(Var::from_index(1)));
    }

    #[test]
    fn peek_at_covers_the_heap() {
        let mut vsids = Vsids::default();
        vsids.set_var_count(3);

        assert!(vsids.peek_at(0.0).is_some());
        assert!(vsids.peek_at(0.999).is_some());

        while vsids.pop().is_some() {}
        assert_eq!(vsids.peek_at(0.5), None);
    }
}
