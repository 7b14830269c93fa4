//! Addressable pseudo-random streams.
//!
//! A [`RandomStream`] is a Mersenne Twister (MT19937-64) whose state is
//! keyed by a base seed and a three-level index
//! `(stream, substream, subsubstream)`. Two streams with the same seed and
//! index produce the same sequence; moving to another index gives an
//! independent sequence. This is what common random numbers are built on:
//! a model stream's subsubstream counts replications, its substream counts
//! solutions, and the stream number separates purposes.
//!
//! `RandomStream` implements [`rand::RngCore`], so any `rand` / `rand_distr`
//! distribution samples from it directly.

use rand::{Rng, RngCore};
use rand_distr::{Exp1, StandardNormal};
use rand_mt::Mt19937GenRand64;
use so_core::Real;

/// Position of a stream in the three-level index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamIndex {
    /// Coarsest level: separates purposes (model rng `i` is stream `i + 1`).
    pub stream: u64,
    /// Middle level: separates solutions when CRN is off.
    pub substream: u64,
    /// Finest level: separates replications.
    pub subsubstream: u64,
}

impl StreamIndex {
    /// Index `(stream, substream, subsubstream)`.
    pub const fn new(stream: u64, substream: u64, subsubstream: u64) -> Self {
        Self {
            stream,
            substream,
            subsubstream,
        }
    }
}

/// A seeded, addressable MT19937-64 generator.
#[derive(Clone)]
pub struct RandomStream {
    seed: u64,
    index: StreamIndex,
    rng: Mt19937GenRand64,
}

impl std::fmt::Debug for RandomStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomStream")
            .field("seed", &self.seed)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl RandomStream {
    /// Create a stream positioned at the start of `index` under `seed`.
    pub fn new(seed: u64, index: StreamIndex) -> Self {
        Self {
            seed,
            index,
            rng: Self::keyed(seed, index),
        }
    }

    fn keyed(seed: u64, index: StreamIndex) -> Mt19937GenRand64 {
        Mt19937GenRand64::new_with_key([
            seed,
            index.stream,
            index.substream,
            index.subsubstream,
        ])
    }

    fn rekey(&mut self) {
        self.rng = Self::keyed(self.seed, self.index);
    }

    /// Base seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current `(stream, substream, subsubstream)` position.
    pub fn index(&self) -> StreamIndex {
        self.index
    }

    /// Move to the start of the next stream; finer levels reset to 0.
    pub fn advance_stream(&mut self) {
        self.index = StreamIndex::new(self.index.stream + 1, 0, 0);
        self.rekey();
    }

    /// Move to the start of the next substream; the subsubstream resets to 0.
    pub fn advance_substream(&mut self) {
        self.index = StreamIndex::new(self.index.stream, self.index.substream + 1, 0);
        self.rekey();
    }

    /// Move to the start of the next subsubstream.
    pub fn advance_subsubstream(&mut self) {
        self.index.subsubstream += 1;
        self.rekey();
    }

    /// Rewind to the start of the current stream.
    pub fn reset_stream(&mut self) {
        self.index = StreamIndex::new(self.index.stream, 0, 0);
        self.rekey();
    }

    /// Rewind to the start of the current substream.
    pub fn reset_substream(&mut self) {
        self.index.subsubstream = 0;
        self.rekey();
    }

    /// Rewind to the start of the current subsubstream.
    pub fn reset_subsubstream(&mut self) {
        self.rekey();
    }

    /// Uniform deviate on `[a, b)`.
    pub fn uniform(&mut self, a: Real, b: Real) -> Real {
        let u: Real = self.gen();
        a + (b - a) * u
    }

    /// Normal deviate with the given mean and standard deviation.
    pub fn normal(&mut self, mean: Real, sd: Real) -> Real {
        let z: Real = self.sample(StandardNormal);
        mean + sd * z
    }

    /// Exponential deviate with the given rate (mean `1 / rate`).
    pub fn exponential(&mut self, rate: Real) -> Real {
        let e: Real = self.sample(Exp1);
        e / rate
    }

    /// Derive the base seed of macroreplication `m` from `base`.
    ///
    /// Uses the splitmix64 finalizer so neighbouring `m` give unrelated seeds.
    pub fn macroreplication_seed(base: u64, m: u64) -> u64 {
        let mut z = base.wrapping_add(m.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.fill_bytes(dest);
        Ok(())
    }
}
