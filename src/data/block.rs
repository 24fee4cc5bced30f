use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::index::SceneIndex;
use super::room::Room;
use crate::config::BlockSamplerConfig;

/// How the class of a block's seed point is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedClassPolicy {
    /// Any point of the room, so classes are drawn in proportion to their point counts.
    UniformPoint,
    /// Every class present in the room is equally likely.
    UniformClass,
    /// Present classes weighted by the inverse of their point count in the room.
    InverseFrequency,
}

/// Where a block came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Column around a seed point, accepted on this (zero-based) attempt.
    Seeded { attempt: usize },
    /// Every candidate was too sparse; the block is the whole room.
    WholeRoom,
}

/// A full-height square column of one room.
#[derive(Clone, Debug)]
pub struct Block {
    pub center: [f32; 2],
    pub half_extent: f32,
    pub indices: Vec<usize>,
    pub origin: BlockOrigin,
}

impl Block {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains_xy(&self, x: f32, y: f32) -> bool {
        (x - self.center[0]).abs() <= self.half_extent
            && (y - self.center[1]).abs() <= self.half_extent
    }
}

/// Carves class-aware blocks out of a room.
#[derive(Clone, Debug)]
pub struct BlockSampler {
    half_extent: f32,
    min_block_points: usize,
    max_attempts: usize,
    seed_class: SeedClassPolicy,
}

impl BlockSampler {
    pub fn new(config: &BlockSamplerConfig) -> Self {
        Self {
            half_extent: config.block_size / 2.0,
            min_block_points: config.min_block_points,
            max_attempts: config.max_attempts,
            seed_class: config.seed_class,
        }
    }

    pub fn seed_class(&self) -> SeedClassPolicy {
        self.seed_class
    }

    /// Draws up to `max_attempts` seeded columns and returns the first holding at least
    /// `min_block_points` points, or the whole room when none does.
    pub fn sample_block<R: Rng + ?Sized>(
        &self,
        room: &Room,
        index: &SceneIndex,
        rng: &mut R,
    ) -> Block {
        if room.len() >= self.min_block_points {
            for attempt in 0..self.max_attempts {
                let Some(seed) = self.choose_seed(room, index, rng) else {
                    break;
                };
                let p = room.position(seed);
                let mut block = Block {
                    center: [p.x, p.y],
                    half_extent: self.half_extent,
                    indices: Vec::new(),
                    origin: BlockOrigin::Seeded { attempt },
                };
                block.indices = (0..room.len())
                    .filter(|&i| {
                        let q = room.position(i);
                        block.contains_xy(q.x, q.y)
                    })
                    .collect();
                if block.len() >= self.min_block_points {
                    return block;
                }
            }
        }

        log::debug!(
            "room {} ({} points): no block reached {} points, using the whole room",
            room.id(),
            room.len(),
            self.min_block_points
        );
        whole_room(room, index)
    }

    fn choose_seed<R: Rng + ?Sized>(
        &self,
        room: &Room,
        index: &SceneIndex,
        rng: &mut R,
    ) -> Option<usize> {
        if room.is_empty() {
            return None;
        }
        let class = match self.seed_class {
            SeedClassPolicy::UniformPoint => return Some(rng.random_range(0..room.len())),
            SeedClassPolicy::UniformClass => {
                let present: Vec<usize> = index.present_classes().collect();
                *present.choose(rng)?
            }
            SeedClassPolicy::InverseFrequency => {
                let present: Vec<usize> = index.present_classes().collect();
                let weights = present.iter().map(|&c| 1.0 / index.class_count(c) as f64);
                let dist = WeightedIndex::new(weights).ok()?;
                present[dist.sample(rng)]
            }
        };
        index.class_indices(class).choose(rng).copied()
    }
}

/// Block spanning the whole room, centered on its horizontal bounds.
fn whole_room(room: &Room, index: &SceneIndex) -> Block {
    let bounds = index.bounds();
    let center = bounds.center();
    let half_extent = [
        (bounds.min.x - center.x).abs(),
        (bounds.max.x - center.x).abs(),
        (bounds.min.y - center.y).abs(),
        (bounds.max.y - center.y).abs(),
    ]
    .into_iter()
    .fold(0.0f32, f32::max);

    Block {
        center: [center.x, center.y],
        half_extent,
        indices: (0..room.len()).collect(),
        origin: BlockOrigin::WholeRoom,
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::data::fixtures::uniform_room;
    use crate::data::room::{AreaId, RoomId};

    fn sampler(block_size: f32, min_block_points: usize, policy: SeedClassPolicy) -> BlockSampler {
        BlockSampler::new(
            &BlockSamplerConfig::new()
                .with_block_size(block_size)
                .with_min_block_points(min_block_points)
                .with_seed_class(policy),
        )
    }

    #[test]
    fn block_points_lie_inside_the_column() {
        let mut rng = StdRng::seed_from_u64(11);
        let room = uniform_room("office_1", 1, 5_000, [5.0, 4.0], &[0, 1, 2, 8], &mut rng);
        let index = SceneIndex::build(&room, 13);

        for policy in [
            SeedClassPolicy::UniformPoint,
            SeedClassPolicy::UniformClass,
            SeedClassPolicy::InverseFrequency,
        ] {
            let sampler = sampler(1.0, 10, policy);
            for _ in 0..20 {
                let block = sampler.sample_block(&room, &index, &mut rng);
                assert!(!block.is_empty());
                assert!(matches!(block.origin, BlockOrigin::Seeded { .. }));
                assert_eq!(block.half_extent, 0.5);
                for &i in &block.indices {
                    let p = room.position(i);
                    assert!((p.x - block.center[0]).abs() <= 0.5);
                    assert!((p.y - block.center[1]).abs() <= 0.5);
                }
                // Every point inside the column is collected.
                let inside = (0..room.len())
                    .filter(|&i| {
                        let p = room.position(i);
                        block.contains_xy(p.x, p.y)
                    })
                    .count();
                assert_eq!(inside, block.len());
            }
        }
    }

    #[test]
    fn sparse_room_falls_back_to_whole_room() {
        let mut rng = StdRng::seed_from_u64(5);
        let room = uniform_room("storage_1", 1, 200, [20.0, 20.0], &[0, 1], &mut rng);
        let index = SceneIndex::build(&room, 2);
        let block = sampler(1.0, 150, SeedClassPolicy::UniformPoint).sample_block(&room, &index, &mut rng);

        assert_eq!(block.origin, BlockOrigin::WholeRoom);
        assert_eq!(block.indices, (0..200).collect::<Vec<_>>());
        for i in 0..room.len() {
            let p = room.position(i);
            assert!(block.contains_xy(p.x, p.y));
        }
    }

    #[test]
    fn room_smaller_than_threshold_uses_whole_room_without_retrying() {
        let mut rng = StdRng::seed_from_u64(5);
        let room = uniform_room("wc_1", 1, 50, [1.0, 1.0], &[4], &mut rng);
        let index = SceneIndex::build(&room, 13);
        let block = sampler(1.0, 1024, SeedClassPolicy::InverseFrequency).sample_block(&room, &index, &mut rng);
        assert_eq!(block.origin, BlockOrigin::WholeRoom);
        assert_eq!(block.len(), 50);
    }

    #[test]
    fn empty_room_gives_empty_block() {
        let room = Room::new(RoomId::new(AreaId(1), "void"), Array2::zeros((0, 6)), Vec::new());
        let index = SceneIndex::build(&room, 13);
        let mut rng = StdRng::seed_from_u64(0);
        let block = sampler(1.0, 1, SeedClassPolicy::UniformClass).sample_block(&room, &index, &mut rng);
        assert!(block.is_empty());
        assert_eq!(block.origin, BlockOrigin::WholeRoom);
    }

    #[test]
    fn same_seed_gives_same_block() {
        let mut rng = StdRng::seed_from_u64(2);
        let room = uniform_room("office_3", 1, 2_000, [3.0, 3.0], &[0, 1, 7], &mut rng);
        let index = SceneIndex::build(&room, 13);
        let sampler = sampler(1.0, 50, SeedClassPolicy::InverseFrequency);

        let a = sampler.sample_block(&room, &index, &mut StdRng::seed_from_u64(99));
        let b = sampler.sample_block(&room, &index, &mut StdRng::seed_from_u64(99));
        assert_eq!(a.center, b.center);
        assert_eq!(a.indices, b.indices);
    }

    /// A room where one class holds 1% of the points.
    fn imbalanced_room() -> (Room, SceneIndex) {
        let mut rng = StdRng::seed_from_u64(13);
        let mut labels = vec![0u8; 9_900];
        labels.extend(std::iter::repeat_n(1u8, 100));
        let room = uniform_room("office_4", 1, 10_000, [4.0, 4.0], &[0], &mut rng);
        let room = Room::new(room.id().clone(), room.points().clone(), labels);
        let index = SceneIndex::build(&room, 2);
        (room, index)
    }

    fn rare_seed_share(policy: SeedClassPolicy) -> f64 {
        let (room, index) = imbalanced_room();
        let sampler = sampler(1.0, 1, policy);
        let mut rng = StdRng::seed_from_u64(21);
        let draws = 2_000;
        let rare = (0..draws)
            .filter_map(|_| sampler.choose_seed(&room, &index, &mut rng))
            .filter(|&i| room.label(i) == 1)
            .count();
        rare as f64 / draws as f64
    }

    #[test]
    fn seed_class_policy_controls_rare_class_coverage() {
        let uniform_point = rare_seed_share(SeedClassPolicy::UniformPoint);
        let uniform_class = rare_seed_share(SeedClassPolicy::UniformClass);
        let inverse = rare_seed_share(SeedClassPolicy::InverseFrequency);

        // 1% of points, 1 of 2 classes, weight 99x the majority's.
        assert!(uniform_point < 0.05, "{uniform_point}");
        assert!((0.4..0.6).contains(&uniform_class), "{uniform_class}");
        assert!(inverse > 0.95, "{inverse}");
    }
}
