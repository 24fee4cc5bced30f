use ndarray::Array2;

use super::block::Block;
use super::index::SceneIndex;
use super::room::Room;
use crate::config::FeatureConfig;

/// Fixed-size training sample.
///
/// Feature columns: block-local xyz, rgb in `[0, 1]`, then (optionally) room-global
/// xyz scaled to `[0, 1]` by the room bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub points: Array2<f32>,
    pub labels: Vec<u8>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_dim(&self) -> usize {
        self.points.ncols()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FeatureNormalizer {
    center_z: bool,
    global_coords: bool,
}

impl FeatureNormalizer {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            center_z: config.center_z,
            global_coords: config.global_coords,
        }
    }

    pub fn feature_dim(&self) -> usize {
        if self.global_coords { 9 } else { 6 }
    }

    pub fn normalize(
        &self,
        room: &Room,
        index: &SceneIndex,
        block: &Block,
        indices: &[usize],
    ) -> Sample {
        let bounds = index.bounds();
        let extent = bounds.extent();
        let z_offset = if self.center_z { bounds.center().z } else { 0.0 };

        let mut points = Array2::zeros((indices.len(), self.feature_dim()));
        let mut labels = Vec::with_capacity(indices.len());
        for (mut row, &i) in points.rows_mut().into_iter().zip(indices) {
            let p = room.position(i);
            let [r, g, b] = room.color(i);
            row[0] = p.x - block.center[0];
            row[1] = p.y - block.center[1];
            row[2] = p.z - z_offset;
            row[3] = r / 255.0;
            row[4] = g / 255.0;
            row[5] = b / 255.0;
            if self.global_coords {
                for (axis, (value, min)) in [p.x, p.y, p.z].into_iter().zip(bounds.min.iter()).enumerate() {
                    row[6 + axis] = if extent[axis] > 0.0 {
                        (value - min) / extent[axis]
                    } else {
                        0.0
                    };
                }
            }
            labels.push(room.label(i));
        }
        Sample { points, labels }
    }
}
