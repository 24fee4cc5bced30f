use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::room::{Room, RoomId};
use crate::error::{Error, Result};

/// How class frequencies become loss weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// `w_c = (1 / f_c) / mean_k(1 / f_k)`; the weights average to 1.
    InverseFrequency,
    /// `w_c = (max_k f_k / f_c)^(1/3)`; the most frequent class gets 1.
    CubeRootMaxRatio,
}

/// One strictly positive weight per class, plus the rooms and counts it was derived from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub scheme: WeightScheme,
    #[serde(default)]
    pub rooms: Vec<RoomId>,
    pub counts: Vec<u64>,
    pub weights: Vec<f32>,
}

impl WeightTable {
    pub fn num_classes(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Weight vector for a weighted cross-entropy loss: `[num_classes]`.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        Tensor::from_data(TensorData::new(self.weights.clone(), [self.weights.len()]), device)
    }
}

#[derive(Clone, Debug)]
pub struct LabelWeightCalculator {
    num_classes: usize,
    scheme: WeightScheme,
    class_names: Vec<String>,
}

impl LabelWeightCalculator {
    pub fn new(num_classes: usize, scheme: WeightScheme) -> Self {
        Self {
            num_classes,
            scheme,
            class_names: Vec::new(),
        }
    }

    /// Names used when reporting an empty class.
    pub fn with_class_names(mut self, names: &[String]) -> Self {
        self.class_names = names.to_vec();
        self
    }

    /// Label occurrences over every point of every room.
    pub fn histogram<'a>(&self, rooms: impl IntoIterator<Item = &'a Room>) -> Vec<u64> {
        let mut counts = vec![0u64; self.num_classes];
        for room in rooms {
            for &label in room.labels() {
                counts[usize::from(label)] += 1;
            }
        }
        counts
    }

    /// Fails with [`Error::EmptyClass`] for the first class that never occurs.
    pub fn compute<'a>(&self, rooms: impl IntoIterator<Item = &'a Room>) -> Result<WeightTable> {
        let rooms: Vec<&Room> = rooms.into_iter().collect();
        let counts = self.histogram(rooms.iter().copied());
        if let Some(class) = counts.iter().position(|&n| n == 0) {
            let name = self
                .class_names
                .get(class)
                .cloned()
                .unwrap_or_else(|| format!("class_{class}"));
            return Err(Error::EmptyClass { class, name });
        }

        let total = counts.iter().sum::<u64>() as f64;
        let freqs: Vec<f64> = counts.iter().map(|&n| n as f64 / total).collect();
        let weights: Vec<f64> = match self.scheme {
            WeightScheme::InverseFrequency => {
                let inverse: Vec<f64> = freqs.iter().map(|f| 1.0 / f).collect();
                let mean = inverse.iter().sum::<f64>() / inverse.len() as f64;
                inverse.iter().map(|w| w / mean).collect()
            }
            WeightScheme::CubeRootMaxRatio => {
                let max = freqs.iter().copied().fold(0.0, f64::max);
                freqs.iter().map(|f| (max / f).cbrt()).collect()
            }
        };

        Ok(WeightTable {
            scheme: self.scheme,
            rooms: rooms.iter().map(|r| r.id().clone()).collect(),
            counts,
            weights: weights.into_iter().map(|w| w as f32).collect(),
        })
    }
}
