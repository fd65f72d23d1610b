//! Seeded input generation per rank

use qconv_common::{ConvRank, DEFAULT_INPUT_SEED, HostTensor, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decimal digits inputs are rounded to.
pub const INPUT_DECIMALS: i32 = 4;

/// Input shape of the 2-D sweep: `(N, C, H, W)`.
pub const CONV2D_INPUT_SHAPE: [usize; 4] = [2, 3, 25, 25];

/// Input shape of the 1-D sweep: `(N, C, L)`.
pub const CONV1D_INPUT_SHAPE: [usize; 3] = [2, 3, 50];

/// Owns the seed and input shape of one rank.
///
/// Each call to [`RankFixture::rng`] returns a generator freshly seeded from
/// the fixture seed, so every case sees the same input regardless of which
/// cases ran before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankFixture {
    rank: ConvRank,
    seed: u64,
    shape: Vec<usize>,
}

impl RankFixture {
    pub fn new(rank: ConvRank, seed: u64) -> Self {
        let shape = match rank {
            ConvRank::One => CONV1D_INPUT_SHAPE.to_vec(),
            ConvRank::Two => CONV2D_INPUT_SHAPE.to_vec(),
        };
        Self { rank, seed, shape }
    }

    pub fn conv1d() -> Self {
        Self::new(ConvRank::One, DEFAULT_INPUT_SEED)
    }

    pub fn conv2d() -> Self {
        Self::new(ConvRank::Two, DEFAULT_INPUT_SEED)
    }

    /// Same fixture with a different input shape.
    pub fn with_shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.shape = shape.into();
        self
    }

    pub fn rank(&self) -> ConvRank {
        self.rank
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Uniform `[0, 1)` values rounded to four decimals, drawn from `rng`.
    pub fn prepare_input(&self, rng: &mut StdRng) -> Result<HostTensor> {
        let numel: usize = self.shape.iter().product();
        let data: Vec<f32> = (0..numel).map(|_| rng.r#gen::<f32>()).collect();
        HostTensor::from_vec(data, &self.shape)?.round_decimals(INPUT_DECIMALS)
    }

    /// Input for one case.
    pub fn next_input(&self) -> Result<HostTensor> {
        self.prepare_input(&mut self.rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shapes() {
        assert_eq!(RankFixture::conv2d().shape(), &[2, 3, 25, 25]);
        assert_eq!(RankFixture::conv1d().shape(), &[2, 3, 50]);
        assert_eq!(RankFixture::conv1d().seed(), 123);
    }

    #[test]
    fn inputs_are_reproducible() {
        let f = RankFixture::conv1d();
        assert_eq!(f.next_input().unwrap().to_vec().unwrap(), f.next_input().unwrap().to_vec().unwrap());
    }

    #[test]
    fn inputs_are_in_unit_interval_with_four_decimals() {
        let data = RankFixture::conv2d().next_input().unwrap().to_vec().unwrap();
        for v in data {
            assert!((0.0..=1.0).contains(&v));
            let scaled = v * 1e4;
            assert!((scaled - scaled.round()).abs() < 1e-2, "{v}");
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = RankFixture::new(ConvRank::One, 1).next_input().unwrap().to_vec().unwrap();
        let b = RankFixture::new(ConvRank::One, 2).next_input().unwrap().to_vec().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unbatched_shape_override() {
        let f = RankFixture::conv1d().with_shape([3, 50]);
        assert_eq!(f.next_input().unwrap().dims(), &[3, 50]);
    }
}
