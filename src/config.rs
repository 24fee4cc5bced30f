use burn::config::Config;

use crate::data::{RoomSelection, SeedClassPolicy, WeightScheme};

/// How blocks are carved out of a room.
#[derive(Config, Debug)]
pub struct BlockSamplerConfig {
    /// Horizontal edge length of the square column, in room units (meters for S3DIS).
    #[config(default = 1.0)]
    pub block_size: f32,
    /// Candidates with fewer points are rejected and re-drawn.
    #[config(default = 1024)]
    pub min_block_points: usize,
    #[config(default = 10)]
    pub max_attempts: usize,
    #[config(default = "SeedClassPolicy::InverseFrequency")]
    pub seed_class: SeedClassPolicy,
}

#[derive(Config, Debug)]
pub struct FeatureConfig {
    /// Center local z on the room's vertical midpoint instead of keeping the room frame.
    #[config(default = false)]
    pub center_z: bool,
    /// Append room-global normalized xyz (9 features instead of 6).
    #[config(default = true)]
    pub global_coords: bool,
}

/// Random rotation about z and clipped jitter of block-local coordinates.
#[derive(Config, Debug)]
pub struct AugmentConfig {
    #[config(default = false)]
    pub enabled: bool,
    #[config(default = true)]
    pub rotate_z: bool,
    #[config(default = 0.01)]
    pub jitter_sigma: f32,
    #[config(default = 0.05)]
    pub jitter_clip: f32,
}

#[derive(Config, Debug)]
pub struct DatasetConfig {
    /// Root directory holding one `Area_<n>` directory per area.
    pub data_path: String,
    /// Directory for per-room cache files and weight files.
    pub cache_path: String,
    #[config(default = 4096)]
    pub num_points: usize,
    /// Rooms of this area form the test split.
    #[config(default = 5)]
    pub test_area: u8,
    #[config(default = 13)]
    pub num_classes: usize,
    #[config(default = 1)]
    pub threads: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Scales the number of blocks drawn per epoch relative to the split's point count.
    #[config(default = 1.0)]
    pub sample_rate: f64,
    #[config(default = "RoomSelection::PointCount")]
    pub room_selection: RoomSelection,
    #[config(default = "WeightScheme::InverseFrequency")]
    pub weight_scheme: WeightScheme,
    #[config(default = "BlockSamplerConfig::new()")]
    pub sampler: BlockSamplerConfig,
    #[config(default = "FeatureConfig::new()")]
    pub features: FeatureConfig,
    #[config(default = "AugmentConfig::new()")]
    pub augment: AugmentConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_setup() {
        let config = DatasetConfig::new("s3dis".into(), "cache".into());
        assert_eq!(config.num_points, 4096);
        assert_eq!(config.test_area, 5);
        assert_eq!(config.num_classes, 13);
        assert_eq!(config.sampler.block_size, 1.0);
        assert_eq!(config.sampler.seed_class, SeedClassPolicy::InverseFrequency);
        assert!(!config.augment.enabled);
        assert!(config.features.global_coords);
    }

    #[test]
    fn config_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = DatasetConfig::new("s3dis".into(), "cache".into())
            .with_test_area(2)
            .with_room_selection(RoomSelection::Uniform)
            .with_sampler(BlockSamplerConfig::new().with_seed_class(SeedClassPolicy::UniformClass));
        config.save(&path).unwrap();

        let loaded = DatasetConfig::load(&path).unwrap();
        assert_eq!(loaded.test_area, 2);
        assert_eq!(loaded.room_selection, RoomSelection::Uniform);
        assert_eq!(loaded.sampler.seed_class, SeedClassPolicy::UniformClass);
        assert_eq!(loaded.data_path, "s3dis");
    }
}
