//! Decision oracles. The symbolic executor asks an oracle for every input
//! the partial world leaves open, chiefly the turtle's starting cell and
//! heading.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait DecisionOracle {
    fn binary(&mut self) -> bool;

    /// A uniform pick from `lo..hi`.
    fn pick_int(&mut self, lo: usize, hi: usize) -> usize;
}

/// Reproducible random decisions from a seeded generator. Workers derive
/// their seeds from the pipeline seed so runs are repeatable.
#[derive(Debug, Clone)]
pub struct RandomOracle {
    rng: StdRng,
}

impl RandomOracle {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DecisionOracle for RandomOracle {
    fn binary(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    fn pick_int(&mut self, lo: usize, hi: usize) -> usize {
        self.rng.gen_range(lo..hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_decisions() {
        let mut a = RandomOracle::from_seed(7);
        let mut b = RandomOracle::from_seed(7);
        for _ in 0..32 {
            assert_eq!(a.pick_int(0, 100), b.pick_int(0, 100));
            assert_eq!(a.binary(), b.binary());
        }
    }

    #[test]
    fn picks_stay_in_range() {
        let mut oracle = RandomOracle::from_seed(1);
        for _ in 0..64 {
            let pick = oracle.pick_int(2, 5);
            assert!((2..5).contains(&pick));
        }
    }
}
