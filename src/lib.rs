//! Room caching and class-aware block sampling of indoor point clouds for semantic
//! segmentation training.
//!
//! Raw rooms are parsed once into a per-room cache ([`data::RoomCache`]), indexed at
//! startup ([`data::RoomRegistry`]), split by held-out area and sampled as fixed-size
//! blocks through burn's [`Dataset`](burn::data::dataset::Dataset) and
//! [`Batcher`](burn::data::dataloader::batcher::Batcher) traits.

pub mod config;
pub mod data;
pub mod error;

pub use error::{Error, Result};
