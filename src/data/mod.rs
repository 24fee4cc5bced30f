mod augment;
mod block;
mod cache;
mod features;
mod index;
mod labels;
mod raw;
mod registry;
mod resample;
mod room;
mod weights;

use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

pub use augment::Augmenter;
pub use block::{Block, BlockOrigin, BlockSampler, SeedClassPolicy};
pub use cache::RoomCache;
pub use features::{FeatureNormalizer, Sample};
pub use index::{Bounds, SceneIndex};
pub use labels::{LabelMapper, S3DIS_CLASSES};
pub use raw::RawSceneParser;
pub use registry::{IndexedRoom, RoomRegistry};
pub use resample::PointResampler;
pub use room::{AreaId, POINT_DIM, Room, RoomId};
pub use weights::{LabelWeightCalculator, WeightScheme, WeightTable};

use crate::config::DatasetConfig;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
}

/// How the room of the next block is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomSelection {
    /// Proportional to the room's point count.
    PointCount,
    Uniform,
}

/// Room indices of the train and test splits: rooms of `test_area` go to test, the rest
/// to train.
pub fn split_rooms(registry: &RoomRegistry, test_area: AreaId) -> Result<(Vec<usize>, Vec<usize>)> {
    if !registry.areas().contains(&test_area) {
        return Err(Error::Config(format!(
            "test area {test_area} matches none of the {} rooms",
            registry.len()
        )));
    }
    Ok((0..registry.len()).partition(|&i| registry.room(i).room.area() != test_area))
}

/// Independent generator for one sampling worker.
pub fn worker_rng(seed: u64, worker: usize) -> StdRng {
    StdRng::seed_from_u64(mix_seed(seed, worker as u64))
}

/// splitmix64 finalizer over `seed ^ stream`.
fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One split of the rooms, sampled block by block.
///
/// Item `i` is drawn with a generator seeded from `(seed, split, i)`, so a given index
/// always yields the same sample no matter which loader worker asks for it.
pub struct BlockDataset {
    registry: Arc<RoomRegistry>,
    split: Split,
    rooms: Vec<usize>,
    room_weights: Option<WeightedIndex<u64>>,
    sampler: BlockSampler,
    resampler: PointResampler,
    normalizer: FeatureNormalizer,
    augmenter: Option<Augmenter>,
    seed: u64,
    num_blocks: usize,
}

impl BlockDataset {
    pub fn new(registry: Arc<RoomRegistry>, split: Split, config: &DatasetConfig) -> Result<Self> {
        if config.num_points == 0 {
            return Err(Error::Config("num_points must be positive".into()));
        }
        let (train, test) = split_rooms(&registry, AreaId(config.test_area))?;
        let rooms = match split {
            Split::Train => train,
            Split::Test => test,
        };
        if rooms.is_empty() {
            return Err(Error::Config(format!(
                "{split:?} split is empty with test area {}",
                AreaId(config.test_area)
            )));
        }

        let counts: Vec<u64> = rooms.iter().map(|&i| registry.room(i).room.len() as u64).collect();
        let room_weights = match config.room_selection {
            RoomSelection::PointCount => Some(
                WeightedIndex::new(&counts).map_err(|e| Error::Config(format!("room weights: {e}")))?,
            ),
            RoomSelection::Uniform => None,
        };
        let total: u64 = counts.iter().sum();
        let num_blocks = ((total as f64 * config.sample_rate) / config.num_points as f64).ceil() as usize;

        let augmenter = match split {
            Split::Train => Augmenter::from_config(&config.augment)?,
            Split::Test => None,
        };

        log::info!(
            "{split:?} split: {} rooms, {total} points, {} blocks per epoch",
            rooms.len(),
            num_blocks.max(1)
        );
        Ok(Self {
            registry,
            split,
            rooms,
            room_weights,
            sampler: BlockSampler::new(&config.sampler),
            resampler: PointResampler::new(config.num_points),
            normalizer: FeatureNormalizer::new(&config.features),
            augmenter,
            seed: config.seed,
            num_blocks: num_blocks.max(1),
        })
    }

    pub fn train_test(registry: Arc<RoomRegistry>, config: &DatasetConfig) -> Result<(Self, Self)> {
        let train = Self::new(registry.clone(), Split::Train, config)?;
        let test = Self::new(registry, Split::Test, config)?;
        Ok((train, test))
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.iter().map(|&i| self.registry.room(i).room.id())
    }

    pub fn num_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn num_points(&self) -> usize {
        self.resampler.num_points()
    }

    pub fn feature_dim(&self) -> usize {
        self.normalizer.feature_dim()
    }

    /// Draws a room, carves a block, resamples it to `num_points` and builds features.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Sample {
        let slot = match &self.room_weights {
            Some(weights) => weights.sample(rng),
            None => rng.random_range(0..self.rooms.len()),
        };
        self.sample_room(self.registry.room(self.rooms[slot]), rng)
    }

    pub fn sample_room<R: Rng + ?Sized>(&self, entry: &IndexedRoom, rng: &mut R) -> Sample {
        let block = self.sampler.sample_block(&entry.room, &entry.index, rng);
        let picked = self.resampler.resample(&block.indices, rng);
        let mut sample = self.normalizer.normalize(&entry.room, &entry.index, &block, &picked);
        if let Some(augmenter) = &self.augmenter {
            augmenter.apply(&mut sample, rng);
        }
        sample
    }

    /// Class weights over every point of this split's rooms.
    pub fn label_weights(&self, scheme: WeightScheme) -> Result<WeightTable> {
        self.weight_calculator(scheme).compute(self.split_rooms())
    }

    /// The weights stored under `key` when they were computed with `scheme` over exactly
    /// this split's rooms and label counts; otherwise fresh weights, which replace them.
    pub fn cached_label_weights(
        &self,
        cache: &RoomCache,
        key: AreaId,
        scheme: WeightScheme,
    ) -> Result<WeightTable> {
        match cache.load_weights(key) {
            Ok(table) if self.weights_match(&table, scheme) => return Ok(table),
            Ok(_) => log::info!("stored weights for {key} are stale, recomputing"),
            Err(Error::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("{err}; recomputing weights"),
        }
        let table = self.label_weights(scheme)?;
        cache.store_weights(key, &table)?;
        Ok(table)
    }

    fn weights_match(&self, table: &WeightTable, scheme: WeightScheme) -> bool {
        table.scheme == scheme
            && table.rooms.iter().eq(self.room_ids())
            && table.counts == self.weight_calculator(scheme).histogram(self.split_rooms())
    }

    fn weight_calculator(&self, scheme: WeightScheme) -> LabelWeightCalculator {
        LabelWeightCalculator::new(self.registry.num_classes(), scheme)
            .with_class_names(self.registry.class_names())
    }

    fn split_rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter().map(|&i| &self.registry.room(i).room)
    }

    fn item_rng(&self, index: usize) -> StdRng {
        let stream = match self.split {
            Split::Train => 0,
            Split::Test => 1,
        };
        StdRng::seed_from_u64(mix_seed(mix_seed(self.seed, stream), index as u64))
    }
}

impl Dataset<Sample> for BlockDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        (index < self.num_blocks).then(|| self.sample(&mut self.item_rng(index)))
    }

    fn len(&self) -> usize {
        self.num_blocks
    }
}

#[derive(Clone, Debug)]
pub struct BlockBatch<B: Backend> {
    pub points: Tensor<B, 3>,      // shape: [batch_size, num_points, feature_dim]
    pub labels: Tensor<B, 2, Int>, // shape: [batch_size, num_points]
}

/// Batcher that stacks Samples into tensors
#[derive(Clone)]
pub struct BlockBatcher {
    num_points: usize,
    feature_dim: usize,
}

impl BlockBatcher {
    pub fn new(num_points: usize, feature_dim: usize) -> Self {
        Self {
            num_points,
            feature_dim,
        }
    }
}

impl<B: Backend> Batcher<B, Sample, BlockBatch<B>> for BlockBatcher {
    fn batch(&self, items: Vec<Sample>, device: &B::Device) -> BlockBatch<B> {
        let batch_size = items.len();

        let mut all_points = Vec::with_capacity(batch_size * self.num_points * self.feature_dim);
        let mut all_labels = Vec::with_capacity(batch_size * self.num_points);
        for item in items {
            all_points.extend(item.points.iter().copied());
            all_labels.extend(item.labels.iter().map(|&l| i64::from(l)));
        }
        let points = TensorData::new(all_points, [batch_size, self.num_points, self.feature_dim]);
        let labels = TensorData::new(all_labels, [batch_size, self.num_points]);

        BlockBatch {
            points: Tensor::from_data(points, device),
            labels: Tensor::from_data(labels, device),
        }
    }
}

/// Multi-worker loader over a split; workers share the dataset read-only.
pub fn block_loader<B: Backend>(
    dataset: BlockDataset,
    batch_size: usize,
    num_workers: usize,
    seed: u64,
) -> Arc<dyn DataLoader<B, BlockBatch<B>>> {
    let batcher = BlockBatcher::new(dataset.num_points(), dataset.feature_dim());
    DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .shuffle(seed)
        .num_workers(num_workers)
        .build(dataset)
}
