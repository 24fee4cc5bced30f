use std::fmt;

use nalgebra::Point3;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Columns of a room row: x y z r g b.
pub const POINT_DIM: usize = 6;

/// Area group a room belongs to (`Area_<n>` on disk).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AreaId(pub u8);

impl AreaId {
    /// Parses a directory name such as `Area_5`.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        name.strip_prefix("Area_")?.parse().ok().map(Self)
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Area_{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId {
    pub area: AreaId,
    pub name: String,
}

impl RoomId {
    pub fn new(area: AreaId, name: impl Into<String>) -> Self {
        Self {
            area,
            name: name.into(),
        }
    }

    pub fn cache_file_name(&self) -> String {
        format!("{}_{}.bin", self.area, self.name)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.area, self.name)
    }
}

/// One scanned room: an `[N, 6]` array of xyz + rgb rows and one class index per row.
///
/// Rooms are built once during preparation and only read afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Room {
    id: RoomId,
    points: Array2<f32>,
    labels: Vec<u8>,
}

impl Room {
    pub fn new(id: RoomId, points: Array2<f32>, labels: Vec<u8>) -> Self {
        assert_eq!(points.ncols(), POINT_DIM);
        assert_eq!(points.nrows(), labels.len());
        Self { id, points, labels }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn area(&self) -> AreaId {
        self.id.area
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn points(&self) -> &Array2<f32> {
        &self.points
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn label(&self, i: usize) -> u8 {
        self.labels[i]
    }

    pub fn position(&self, i: usize) -> Point3<f32> {
        let row = self.points.row(i);
        Point3::new(row[0], row[1], row[2])
    }

    /// Raw color in `[0, 255]`.
    pub fn color(&self, i: usize) -> [f32; 3] {
        let row = self.points.row(i);
        [row[3], row[4], row[5]]
    }

    /// Shifts xyz so the room's minimum corner sits at the origin.
    pub fn translated_to_origin(mut self) -> Self {
        if self.is_empty() {
            return self;
        }
        let mut xyz = self.points.slice_mut(ndarray::s![.., 0..3]);
        let min = xyz.fold_axis(Axis(0), f32::INFINITY, |acc, &v| acc.min(v));
        xyz -= &min;
        self
    }
}
