use std::collections::HashMap;

use crate::error::{Error, Result};

/// The 13 semantic classes of the S3DIS indoor benchmark, in index order.
pub const S3DIS_CLASSES: [&str; 13] = [
    "ceiling", "floor", "wall", "beam", "column", "window", "door", "table", "chair", "sofa",
    "bookcase", "board", "clutter",
];

/// Maps raw category strings onto a fixed class vocabulary.
#[derive(Clone, Debug)]
pub struct LabelMapper {
    classes: Vec<String>,
    lookup: HashMap<String, u8>,
}

impl LabelMapper {
    /// Vocabulary of at most 256 distinct, non-empty class names.
    pub fn new<I, S>(classes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = classes
            .into_iter()
            .map(|c| c.into().trim().to_ascii_lowercase())
            .collect();
        if classes.is_empty() || classes.len() > usize::from(u8::MAX) + 1 {
            return Err(Error::Config(format!(
                "class vocabulary must hold 1..=256 names, got {}",
                classes.len()
            )));
        }

        let mut lookup = HashMap::with_capacity(classes.len());
        for (i, class) in classes.iter().enumerate() {
            if class.is_empty() {
                return Err(Error::Config(format!("class {i} has an empty name")));
            }
            if lookup.insert(class.clone(), i as u8).is_some() {
                return Err(Error::Config(format!("duplicate class `{class}`")));
            }
        }
        Ok(Self { classes, lookup })
    }

    /// S3DIS vocabulary; raw `stairs` objects are folded into `clutter`.
    pub fn s3dis() -> Self {
        let mut lookup: HashMap<String, u8> = S3DIS_CLASSES
            .iter()
            .enumerate()
            .map(|(i, c)| (c.to_string(), i as u8))
            .collect();
        lookup.insert("stairs".into(), 12);
        Self {
            classes: S3DIS_CLASSES.iter().map(|c| c.to_string()).collect(),
            lookup,
        }
    }

    /// Routes an extra raw category onto an existing class.
    pub fn with_alias(mut self, raw: &str, class: &str) -> Result<Self> {
        let target = self.map(class)?;
        self.lookup.insert(raw.trim().to_ascii_lowercase(), target);
        Ok(self)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn class_name(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }

    /// Every accepted raw name with its class index, sorted by name. Two mappers
    /// with equal vocabularies label every category identically.
    pub fn vocabulary(&self) -> Vec<(String, u8)> {
        let mut entries: Vec<(String, u8)> =
            self.lookup.iter().map(|(name, &class)| (name.clone(), class)).collect();
        entries.sort();
        entries
    }

    pub fn map(&self, category: &str) -> Result<u8> {
        let key = category.trim().to_ascii_lowercase();
        self.lookup
            .get(&key)
            .copied()
            .ok_or(Error::LabelMapping {
                category: key,
                path: None,
            })
    }
}
