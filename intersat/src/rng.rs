//! Deterministic random numbers.

/// Multiply-with-carry style generator as used by MiniSat.
///
/// Only used for decision jitter and random phases, so quality does not
/// matter, but determinism for a fixed seed does.
pub struct SolverRng {
    seed: f64,
}

impl Default for SolverRng {
    fn default() -> SolverRng {
        SolverRng { seed: 91_648_253.0 }
    }
}

impl SolverRng {
    /// Reseed the generator. The internal seed is kept nonzero.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = (seed % 2_147_483_646) as f64 + 1.0;
    }

    /// A random float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.seed *= 1_389_796.0;
        let q = (self.seed / 2_147_483_647.0) as i64;
        self.seed -= (q as f64) * 2_147_483_647.0;
        self.seed / 2_147_483_647.0
    }

    /// A random integer in `[0, size)`. `size` must be nonzero.
    pub fn next_index(&mut self, size: usize) -> usize {
        (self.next_f64() * (size as f64)) as usize
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SolverRng::default();
        let mut b = SolverRng::default();
        a.set_seed(42);
        b.set_seed(42);
        for _ in 0..100 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn index_stays_in_range() {
        let mut rng = SolverRng::default();
        for size in 1..50 {
            for _ in 0..20 {
                assert!(rng.next_index(size) < size);
            }
        }
    }
}
