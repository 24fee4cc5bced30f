use rand::prelude::*;
use rand::seq::index;

/// Turns an index set of any size into exactly `num_points` indices.
#[derive(Clone, Copy, Debug)]
pub struct PointResampler {
    num_points: usize,
}

impl PointResampler {
    pub fn new(num_points: usize) -> Self {
        Self { num_points }
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Without replacement when `indices` holds enough points; otherwise every index
    /// once plus uniform draws with replacement, shuffled.
    ///
    /// `indices` must not be empty: there is nothing to draw from, and the result is
    /// then empty instead of `num_points` long. Registries never hold empty rooms, so
    /// blocks carved from them always have a point.
    pub fn resample<R: Rng + ?Sized>(&self, indices: &[usize], rng: &mut R) -> Vec<usize> {
        debug_assert!(!indices.is_empty(), "resampling an empty block");
        if indices.is_empty() {
            return Vec::new();
        }
        if indices.len() >= self.num_points {
            return index::sample(rng, indices.len(), self.num_points)
                .into_iter()
                .map(|i| indices[i])
                .collect();
        }

        let mut out = Vec::with_capacity(self.num_points);
        out.extend_from_slice(indices);
        out.extend((indices.len()..self.num_points).map(|_| indices[rng.random_range(0..indices.len())]));
        out.shuffle(rng);
        out
    }
}
