use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use burn::backend::NdArray;
use burn::config::Config;
use clap::{Args, Parser, Subcommand};
use s3dis_blocks::config::{AugmentConfig, BlockSamplerConfig, DatasetConfig};
use s3dis_blocks::data::{
    AreaId, BlockDataset, LabelMapper, RoomCache, RoomRegistry, WeightTable, block_loader,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    dataset: DatasetArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatasetArgs {
    /// Load the dataset configuration from a JSON file instead of the flags below.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "s3dis_data")]
    data_path: String,
    #[arg(long, default_value = "cache")]
    cache_path: String,
    #[arg(long, default_value_t = 4096)]
    num_points: usize,
    #[arg(long, default_value_t = 5)]
    test_area: u8,
    #[arg(long, default_value_t = 1.0)]
    block_size: f32,
    #[arg(long, default_value_t = 13)]
    num_classes: usize,
    /// Comma-separated class vocabulary; the S3DIS classes when omitted.
    #[arg(long, value_delimiter = ',')]
    classes: Vec<String>,
    #[arg(long, default_value_t = 1)]
    threads: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Randomly rotate and jitter training blocks.
    #[arg(long)]
    transform: bool,
}

impl DatasetArgs {
    fn resolve(&self) -> anyhow::Result<DatasetConfig> {
        if let Some(path) = &self.config {
            return DatasetConfig::load(path)
                .map_err(|e| anyhow::anyhow!("cannot load {}: {e}", path.display()));
        }
        Ok(DatasetConfig::new(self.data_path.clone(), self.cache_path.clone())
            .with_num_points(self.num_points)
            .with_test_area(self.test_area)
            .with_num_classes(self.num_classes)
            .with_threads(self.threads)
            .with_seed(self.seed)
            .with_sampler(BlockSamplerConfig::new().with_block_size(self.block_size))
            .with_augment(AugmentConfig::new().with_enabled(self.transform)))
    }

    fn mapper(&self) -> anyhow::Result<LabelMapper> {
        if self.classes.is_empty() {
            Ok(LabelMapper::s3dis())
        } else {
            Ok(LabelMapper::new(self.classes.iter().cloned())?)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse raw rooms into the cache and store the class weights of the train split.
    Prepare,
    /// Print the class weights of the train split, recomputing them if needed.
    Weights,
    /// Draw batches through the multi-worker loader and report their shapes.
    Sample {
        #[arg(short, long, default_value_t = 4)]
        batches: usize,
        #[arg(short = 's', long, default_value_t = 2)]
        batch_size: usize,
    },
    /// Write the resolved dataset configuration as JSON.
    Config {
        #[arg(short, long, default_value = "dataset.json")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.dataset.resolve()?;
    let mapper = cli.dataset.mapper()?;

    match cli.command {
        Commands::Config { out } => {
            config
                .save(&out)
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!("Configuration written to {}", out.display());
        }
        Commands::Prepare => {
            let start = std::time::Instant::now();
            let (train, _, cache) = open_splits(&config, &mapper)?;
            let table = train.label_weights(config.weight_scheme)?;
            cache.store_weights(AreaId(config.test_area), &table)?;
            print_weights(&mapper, &table);
            let duration = start.elapsed();
            println!("Preparation time: {duration:?}");
        }
        Commands::Weights => {
            let (train, _, cache) = open_splits(&config, &mapper)?;
            let table = train.cached_label_weights(
                &cache,
                AreaId(config.test_area),
                config.weight_scheme,
            )?;
            print_weights(&mapper, &table);
        }
        Commands::Sample {
            batches,
            batch_size,
        } => {
            let start = std::time::Instant::now();
            let (train, test, _) = open_splits(&config, &mapper)?;
            println!(
                "train: {} rooms, test: {} rooms",
                train.num_rooms(),
                test.num_rooms()
            );
            let loader = block_loader::<NdArray<f32>>(train, batch_size, config.threads, config.seed);
            for (i, batch) in loader.iter().take(batches).enumerate() {
                println!(
                    "batch {i}: points {:?}, labels {:?}",
                    batch.points.dims(),
                    batch.labels.dims()
                );
            }
            let duration = start.elapsed();
            println!("Sampling time: {duration:?}");
        }
    }
    Ok(())
}

fn open_splits(
    config: &DatasetConfig,
    mapper: &LabelMapper,
) -> anyhow::Result<(BlockDataset, BlockDataset, RoomCache)> {
    let registry = Arc::new(RoomRegistry::prepare(config, mapper)?);
    let (train, test) = BlockDataset::train_test(registry, config)
        .with_context(|| format!("cannot split on Area_{}", config.test_area))?;
    let cache = RoomCache::new(&config.cache_path, mapper)?;
    Ok((train, test, cache))
}

fn print_weights(mapper: &LabelMapper, table: &WeightTable) {
    for (class, (weight, count)) in table.weights.iter().zip(&table.counts).enumerate() {
        let name = mapper.class_name(class).unwrap_or("?");
        println!("{class:>3} {name:<12} {count:>12} points  weight {weight:.4}");
    }
}
