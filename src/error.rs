//! Error types for room preparation and block sampling.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::data::RoomId;

/// Errors raised while preparing, caching or splitting rooms.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw category has no entry in the class vocabulary.
    #[error("unmapped category `{category}`{}", located(.path))]
    LabelMapping {
        category: String,
        path: Option<PathBuf>,
    },

    /// A raw annotation file could not be understood.
    #[error("malformed raw data at {path}:{line}: {message}")]
    RawFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted room or weight file is unreadable or inconsistent.
    #[error("corrupt cache entry {path}: {message}")]
    CacheCorruption { path: PathBuf, message: String },

    #[error("room {room} is not cached")]
    CacheMiss { room: RoomId },

    /// A class never occurs in the rooms the weights were computed over.
    #[error("class {class} ({name}) has no points in the training split")]
    EmptyClass { class: usize, name: String },

    /// Cross-referential configuration inconsistency.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Attaches the file an unmapped category was read from.
    pub(crate) fn in_file(self, file: &Path) -> Self {
        match self {
            Self::LabelMapping { category, .. } => Self::LabelMapping {
                category,
                path: Some(file.to_path_buf()),
            },
            other => other,
        }
    }

    pub(crate) fn corrupt(path: &Path, message: impl Into<String>) -> Self {
        Self::CacheCorruption {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
