use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::labels::LabelMapper;
use super::raw::RawSceneParser;
use super::room::{AreaId, POINT_DIM, Room, RoomId};
use super::weights::WeightTable;
use crate::error::{Error, Result};

const CACHE_VERSION: u32 = 2;

#[derive(Serialize)]
struct CachedRoomRef<'a> {
    version: u32,
    id: &'a RoomId,
    vocabulary: &'a [(String, u8)],
    points: Vec<f32>,
    labels: &'a [u8],
}

#[derive(Deserialize)]
struct CachedRoom {
    version: u32,
    id: RoomId,
    vocabulary: Vec<(String, u8)>,
    points: Vec<f32>,
    labels: Vec<u8>,
}

/// One bincode file per parsed, label-mapped room, plus JSON weight tables.
///
/// Each room entry records the vocabulary that labelled it; entries written under
/// another vocabulary are reported as corrupt.
#[derive(Clone, Debug)]
pub struct RoomCache {
    dir: PathBuf,
    num_classes: usize,
    vocabulary: Vec<(String, u8)>,
}

impl RoomCache {
    pub fn new(dir: impl Into<PathBuf>, mapper: &LabelMapper) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(Error::io(&dir))?;
        Ok(Self {
            dir,
            num_classes: mapper.num_classes(),
            vocabulary: mapper.vocabulary(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &RoomId) -> PathBuf {
        self.dir.join(id.cache_file_name())
    }

    pub fn contains(&self, id: &RoomId) -> bool {
        self.path_for(id).is_file()
    }

    pub fn load(&self, id: &RoomId) -> Result<Room> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(Error::CacheMiss { room: id.clone() });
        }
        let bytes = fs::read(&path).map_err(Error::io(&path))?;
        let cached: CachedRoom =
            bincode::deserialize(&bytes).map_err(|e| Error::corrupt(&path, e.to_string()))?;

        if cached.version != CACHE_VERSION {
            return Err(Error::corrupt(&path, format!("cache version {}", cached.version)));
        }
        if &cached.id != id {
            return Err(Error::corrupt(&path, format!("holds room {}", cached.id)));
        }
        if cached.vocabulary != self.vocabulary {
            return Err(Error::corrupt(&path, "labelled with a different class vocabulary"));
        }
        if cached.labels.is_empty() || cached.points.len() != cached.labels.len() * POINT_DIM {
            return Err(Error::corrupt(
                &path,
                format!("{} values for {} labels", cached.points.len(), cached.labels.len()),
            ));
        }
        if let Some(&label) = cached.labels.iter().find(|&&l| usize::from(l) >= self.num_classes) {
            return Err(Error::corrupt(&path, format!("label {label} out of range")));
        }
        if !cached.points.iter().all(|v| v.is_finite()) {
            return Err(Error::corrupt(&path, "non-finite coordinate"));
        }

        let points = Array2::from_shape_vec((cached.labels.len(), POINT_DIM), cached.points)
            .map_err(|e| Error::corrupt(&path, e.to_string()))?;
        Ok(Room::new(cached.id, points, cached.labels))
    }

    /// Persists `room`. Returns `false` when an identical entry was already present.
    pub fn store(&self, room: &Room) -> Result<bool> {
        let record = CachedRoomRef {
            version: CACHE_VERSION,
            id: room.id(),
            vocabulary: &self.vocabulary,
            points: room.points().iter().copied().collect(),
            labels: room.labels(),
        };
        let bytes = bincode::serialize(&record).map_err(|e| Error::corrupt(&self.dir, e.to_string()))?;

        let path = self.path_for(room.id());
        if fs::read(&path).is_ok_and(|existing| existing == bytes) {
            return Ok(false);
        }
        write_replacing(&path, &bytes)?;
        Ok(true)
    }

    /// Cached room if present and sound; otherwise parses `room_dir` and caches the result.
    /// `Ok(None)` means the room has no points.
    pub fn load_or_parse(
        &self,
        id: &RoomId,
        room_dir: &Path,
        parser: &RawSceneParser,
    ) -> Result<Option<Room>> {
        match self.load(id) {
            Ok(room) => return Ok(Some(room)),
            Err(Error::CacheMiss { .. }) => {}
            Err(err @ Error::CacheCorruption { .. }) => {
                log::warn!("{err}; re-parsing {id}");
            }
            Err(err) => return Err(err),
        }

        let Some(room) = parser.parse_room(id.clone(), room_dir)? else {
            return Ok(None);
        };
        self.store(&room)?;
        Ok(Some(room))
    }

    pub fn weights_path(&self, test_area: AreaId) -> PathBuf {
        self.dir.join(format!("weights_area{}.json", test_area.0))
    }

    pub fn store_weights(&self, test_area: AreaId, table: &WeightTable) -> Result<()> {
        let path = self.weights_path(test_area);
        let bytes = serde_json::to_vec_pretty(table).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?;
        write_replacing(&path, &bytes)
    }

    pub fn load_weights(&self, test_area: AreaId) -> Result<WeightTable> {
        let path = self.weights_path(test_area);
        let reader = BufReader::new(File::open(&path).map_err(Error::io(&path))?);
        let table: WeightTable =
            serde_json::from_reader(reader).map_err(|e| Error::corrupt(&path, e.to_string()))?;
        if table.weights.len() != self.num_classes || table.counts.len() != self.num_classes {
            return Err(Error::corrupt(
                &path,
                format!("{} weights for {} classes", table.weights.len(), self.num_classes),
            ));
        }
        if !table.weights.iter().all(|w| w.is_finite() && *w > 0.0) {
            return Err(Error::corrupt(&path, "non-positive weight"));
        }
        Ok(table)
    }
}

/// Writes next to `path` and renames over it, so readers never see a partial file.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(Error::io(&tmp))?;
    fs::rename(&tmp, path).map_err(Error::io(path))
}
