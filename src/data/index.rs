use nalgebra::Point3;

use super::room::Room;

/// Axis-aligned bounds of a room.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    pub fn extent(&self) -> [f32; 3] {
        let d = self.max - self.min;
        [d.x, d.y, d.z]
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }
}

/// Per-room statistics used by the block sampler.
///
/// `class_indices[c]` lists the points labelled `c` in ascending order; together
/// the lists partition `0..room.len()`.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneIndex {
    bounds: Bounds,
    class_indices: Vec<Vec<usize>>,
}

impl SceneIndex {
    /// Room labels must be below `num_classes`.
    pub fn build(room: &Room, num_classes: usize) -> Self {
        let mut class_indices = vec![Vec::new(); num_classes];
        let mut min = Point3::origin();
        let mut max = Point3::origin();

        for i in 0..room.len() {
            let p = room.position(i);
            if i == 0 {
                min = p;
                max = p;
            } else {
                min = min.inf(&p);
                max = max.sup(&p);
            }
            class_indices[usize::from(room.label(i))].push(i);
        }

        Self {
            bounds: Bounds { min, max },
            class_indices,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn num_classes(&self) -> usize {
        self.class_indices.len()
    }

    pub fn class_indices(&self, class: usize) -> &[usize] {
        &self.class_indices[class]
    }

    pub fn class_count(&self, class: usize) -> usize {
        self.class_indices[class].len()
    }

    /// Classes with at least one point, ascending.
    pub fn present_classes(&self) -> impl Iterator<Item = usize> + '_ {
        self.class_indices
            .iter()
            .enumerate()
            .filter(|(_, idx)| !idx.is_empty())
            .map(|(c, _)| c)
    }
}
