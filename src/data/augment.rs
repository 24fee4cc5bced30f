use std::f32::consts::TAU;

use nalgebra::{Rotation3, Vector3};
use rand::prelude::*;
use rand_distr::Normal;

use super::features::Sample;
use crate::config::AugmentConfig;
use crate::error::{Error, Result};

/// Perturbs block-local coordinates of a sample; color, global coordinates and labels
/// are left alone.
#[derive(Clone, Debug)]
pub struct Augmenter {
    rotate_z: bool,
    jitter: Option<Normal<f32>>,
    jitter_clip: f32,
}

impl Augmenter {
    /// `None` when augmentation is disabled.
    pub fn from_config(config: &AugmentConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let jitter = if config.jitter_sigma > 0.0 {
            let normal = Normal::new(0.0, config.jitter_sigma)
                .map_err(|e| Error::Config(format!("jitter_sigma: {e}")))?;
            Some(normal)
        } else {
            None
        };
        Ok(Some(Self {
            rotate_z: config.rotate_z,
            jitter,
            jitter_clip: config.jitter_clip.abs(),
        }))
    }

    pub fn apply<R: Rng + ?Sized>(&self, sample: &mut Sample, rng: &mut R) {
        let rotation = self
            .rotate_z
            .then(|| Rotation3::from_axis_angle(&Vector3::z_axis(), rng.random_range(0.0..TAU)));

        for mut row in sample.points.rows_mut() {
            let mut local = Vector3::new(row[0], row[1], row[2]);
            if let Some(rotation) = &rotation {
                local = rotation * local;
            }
            if let Some(jitter) = &self.jitter {
                local.apply(|v| *v += jitter.sample(&mut *rng).clamp(-self.jitter_clip, self.jitter_clip));
            }
            row[0] = local.x;
            row[1] = local.y;
            row[2] = local.z;
        }
    }
}
