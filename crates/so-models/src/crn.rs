//! Common random numbers across solutions.
//!
//! A [`StreamProgenitor`] owns one checkpoint stream per model rng and
//! hands every new [`Solution`] its own copy. With CRN on, every solution
//! starts from the identical checkpoint, so replication `k` at two
//! different points consumes the same random numbers. With CRN off, the
//! checkpoint moves to its next substream after each hand-out.

use crate::{problem::Problem, solution::Solution};
use so_core::errors::{Error, Result};
use so_math::{Array, RandomStream, StreamIndex};

/// Source of per-solution model streams.
#[derive(Debug, Clone)]
pub struct StreamProgenitor {
    checkpoint: Vec<RandomStream>,
    crn_across_solutions: bool,
}

impl StreamProgenitor {
    /// Checkpoint for `n_rngs` model streams: rng `i` lives on stream
    /// `i + 1` (stream 0 is reserved for solver-internal randomness).
    pub fn new(seed: u64, n_rngs: usize, crn_across_solutions: bool) -> Self {
        let checkpoint = (0..n_rngs as u64)
            .map(|i| RandomStream::new(seed, StreamIndex::new(i + 1, 0, 0)))
            .collect();
        Self {
            checkpoint,
            crn_across_solutions,
        }
    }

    /// Whether solutions share random numbers.
    pub fn crn_across_solutions(&self) -> bool {
        self.crn_across_solutions
    }

    /// Streams for the next solution.
    pub fn spawn(&mut self) -> Vec<RandomStream> {
        let streams = self.checkpoint.clone();
        if !self.crn_across_solutions {
            self.checkpoint
                .iter_mut()
                .for_each(RandomStream::advance_substream);
        }
        streams
    }

    /// A fresh, unsimulated solution of `problem` at `x`.
    pub fn create_solution(&mut self, x: Array, problem: &dyn Problem) -> Result<Solution> {
        if x.size() != problem.dim() {
            return Err(Error::DimensionMismatch {
                expected: problem.dim(),
                found: x.size(),
            });
        }
        if self.checkpoint.len() != problem.n_rngs() {
            return Err(Error::DimensionMismatch {
                expected: problem.n_rngs(),
                found: self.checkpoint.len(),
            });
        }
        Ok(Solution::new(
            x,
            self.spawn(),
            problem.n_objectives(),
            problem.n_stochastic_constraints(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn first_draws(streams: &mut [RandomStream]) -> Vec<u64> {
        streams.iter_mut().map(|s| s.next_u64()).collect()
    }

    #[test]
    fn crn_hands_out_identical_streams() {
        let mut p = StreamProgenitor::new(11, 2, true);
        let mut a = p.spawn();
        let mut b = p.spawn();
        assert_eq!(first_draws(&mut a), first_draws(&mut b));
        assert_eq!(a[1].index(), StreamIndex::new(2, 0, 0));
    }

    #[test]
    fn without_crn_each_solution_gets_a_new_substream() {
        let mut p = StreamProgenitor::new(11, 1, false);
        let mut a = p.spawn();
        let mut b = p.spawn();
        assert_eq!(b[0].index(), StreamIndex::new(1, 1, 0));
        assert_ne!(first_draws(&mut a), first_draws(&mut b));
    }
}
