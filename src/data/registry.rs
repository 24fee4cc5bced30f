use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rayon::prelude::*;

use super::cache::RoomCache;
use super::index::SceneIndex;
use super::labels::LabelMapper;
use super::raw::RawSceneParser;
use super::room::{AreaId, Room, RoomId};
use crate::config::DatasetConfig;
use crate::error::{Error, Result};

/// A cached room together with its sampling index.
#[derive(Clone, Debug)]
pub struct IndexedRoom {
    pub room: Room,
    pub index: SceneIndex,
}

/// Every usable room of the dataset, keyed by id. Built once at startup and shared
/// read-only by the splits.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Vec<IndexedRoom>,
    by_id: BTreeMap<RoomId, usize>,
    num_classes: usize,
    class_names: Vec<String>,
}

impl RoomRegistry {
    /// Indexes `rooms`, dropping empty rooms and repeated ids (first one wins).
    pub fn from_rooms(rooms: impl IntoIterator<Item = Room>, num_classes: usize) -> Self {
        let mut rooms: Vec<Room> = rooms.into_iter().filter(|r| !r.is_empty()).collect();
        rooms.sort_by(|a, b| a.id().cmp(b.id()));
        rooms.dedup_by(|b, a| a.id() == b.id());

        let rooms: Vec<IndexedRoom> = rooms
            .into_iter()
            .map(|room| {
                let index = SceneIndex::build(&room, num_classes);
                IndexedRoom { room, index }
            })
            .collect();
        let by_id = rooms
            .iter()
            .enumerate()
            .map(|(i, r)| (r.room.id().clone(), i))
            .collect();
        Self {
            rooms,
            by_id,
            num_classes,
            class_names: Vec::new(),
        }
    }

    pub fn with_class_names(mut self, names: &[String]) -> Self {
        self.class_names = names.to_vec();
        self
    }

    /// Parses (or loads from the cache) every room under `config.data_path` on a pool of
    /// `config.threads` workers. Rooms that fail to parse are skipped with a warning.
    pub fn prepare(config: &DatasetConfig, mapper: &LabelMapper) -> Result<Self> {
        if mapper.num_classes() != config.num_classes {
            return Err(Error::Config(format!(
                "num_classes is {} but the label vocabulary has {} classes",
                config.num_classes,
                mapper.num_classes()
            )));
        }
        let cache = RoomCache::new(&config.cache_path, mapper)?;
        let parser = RawSceneParser::new(mapper.clone());
        let entries = RawSceneParser::discover_rooms(Path::new(&config.data_path))?;
        log::info!("found {} rooms under {}", entries.len(), config.data_path);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .build()
            .map_err(|e| Error::Config(format!("thread pool: {e}")))?;
        let rooms: Vec<Room> = pool.install(|| {
            entries
                .par_iter()
                .filter_map(|(id, dir)| match cache.load_or_parse(id, dir, &parser) {
                    Ok(Some(room)) => Some(room),
                    Ok(None) => {
                        log::info!("room {id} has no points, excluded");
                        None
                    }
                    Err(err) => {
                        log::warn!("skipping room {id}: {err}");
                        None
                    }
                })
                .collect()
        });

        let registry = Self::from_rooms(rooms, config.num_classes).with_class_names(mapper.classes());
        log::info!(
            "prepared {} of {} rooms ({} points) in {}",
            registry.len(),
            entries.len(),
            registry.total_points(),
            cache.dir().display()
        );
        Ok(registry)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Empty unless the registry was built from a vocabulary.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn rooms(&self) -> &[IndexedRoom] {
        &self.rooms
    }

    pub fn room(&self, i: usize) -> &IndexedRoom {
        &self.rooms[i]
    }

    pub fn get(&self, id: &RoomId) -> Option<&IndexedRoom> {
        self.by_id.get(id).map(|&i| &self.rooms[i])
    }

    pub fn areas(&self) -> BTreeSet<AreaId> {
        self.rooms.iter().map(|r| r.room.area()).collect()
    }

    pub fn total_points(&self) -> usize {
        self.rooms.iter().map(|r| r.room.len()).sum()
    }
}
