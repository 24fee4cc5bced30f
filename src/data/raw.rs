use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use ndarray::Array2;

use super::labels::LabelMapper;
use super::room::{AreaId, POINT_DIM, Room, RoomId};
use crate::error::{Error, Result};

const ANNOTATIONS_DIR: &str = "Annotations";

/// Reads raw room scans and maps their categories to class indices.
///
/// Two layouts are understood inside a room directory:
/// * `Annotations/<category>_<k>.txt`, one file per object, lines `x y z r g b`
/// * `<room>.txt`, lines `x y z r g b <category>`
///
/// When both exist the per-object annotations win.
#[derive(Clone, Debug)]
pub struct RawSceneParser {
    mapper: LabelMapper,
}

impl RawSceneParser {
    pub fn new(mapper: LabelMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &LabelMapper {
        &self.mapper
    }

    /// Lists every `Area_<n>/<room>` directory under `data_path`, sorted by room id.
    pub fn discover_rooms(data_path: &Path) -> Result<Vec<(RoomId, PathBuf)>> {
        let mut rooms = Vec::new();
        for area_dir in sorted_entries(data_path)? {
            let Some(area) = file_name(&area_dir).and_then(AreaId::from_dir_name) else {
                continue;
            };
            if !area_dir.is_dir() {
                continue;
            }
            for room_dir in sorted_entries(&area_dir)? {
                if !room_dir.is_dir() {
                    continue;
                }
                if let Some(name) = file_name(&room_dir) {
                    rooms.push((RoomId::new(area, name), room_dir.clone()));
                }
            }
        }
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rooms)
    }

    /// Parses one room. Returns `Ok(None)` for a room without any points.
    pub fn parse_room(&self, id: RoomId, room_dir: &Path) -> Result<Option<Room>> {
        let mut rows = Vec::new();
        let mut labels = Vec::new();

        let annotations = room_dir.join(ANNOTATIONS_DIR);
        let labelled = room_dir.join(format!("{}.txt", id.name));
        if annotations.is_dir() {
            for path in sorted_entries(&annotations)? {
                if path.extension().and_then(|s| s.to_str()) != Some("txt") {
                    continue;
                }
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                let label = self
                    .mapper
                    .map(category_from_stem(stem))
                    .map_err(|e| e.in_file(&path))?;
                read_rows(&path, POINT_DIM, |values, _| {
                    rows.extend_from_slice(values);
                    labels.push(label);
                    Ok(())
                })?;
            }
        } else if labelled.is_file() {
            read_rows(&labelled, POINT_DIM + 1, |values, category| {
                let category = category.unwrap_or_default();
                labels.push(self.mapper.map(category).map_err(|e| e.in_file(&labelled))?);
                rows.extend_from_slice(values);
                Ok(())
            })?;
        } else {
            return Err(Error::RawFormat {
                path: room_dir.to_path_buf(),
                line: 0,
                message: format!("neither {ANNOTATIONS_DIR}/ nor {}.txt found", id.name),
            });
        }

        if labels.is_empty() {
            return Ok(None);
        }
        let points = Array2::from_shape_vec((labels.len(), POINT_DIM), rows).map_err(|e| {
            Error::RawFormat {
                path: room_dir.to_path_buf(),
                line: 0,
                message: e.to_string(),
            }
        })?;
        Ok(Some(Room::new(id, points, labels).translated_to_origin()))
    }
}

/// `chair_12` -> `chair`, `table` -> `table`.
fn category_from_stem(stem: &str) -> &str {
    match stem.rsplit_once('_') {
        Some((category, suffix)) if suffix.chars().all(|c| c.is_ascii_digit()) => category,
        _ => stem,
    }
}

/// Calls `on_row` with the six numeric columns of each non-blank line and, when
/// `columns` is 7, the trailing category token.
fn read_rows<F>(path: &Path, columns: usize, mut on_row: F) -> Result<()>
where
    F: FnMut(&[f32; POINT_DIM], Option<&str>) -> Result<()>,
{
    let reader = BufReader::new(File::open(path).map_err(Error::io(path))?);
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::io(path))?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let malformed = |message: String| Error::RawFormat {
            path: path.to_path_buf(),
            line: n + 1,
            message,
        };
        if tokens.len() != columns {
            return Err(malformed(format!(
                "expected {columns} columns, found {}",
                tokens.len()
            )));
        }

        let mut values = [0.0f32; POINT_DIM];
        for (value, token) in values.iter_mut().zip(&tokens) {
            *value = token
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(format!("invalid number `{token}`")))?;
        }
        for channel in &mut values[3..] {
            *channel = channel.clamp(0.0, 255.0);
        }
        on_row(&values, tokens.get(POINT_DIM).copied())?;
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .map_err(Error::io(dir))?
        .map(|entry| entry.map(|e| e.path()).map_err(Error::io(dir)))
        .collect::<Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|s| s.to_str())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;

    use super::*;

    /// Writes one object file per `(category, rows)` entry under `Area_<area>/<room>/Annotations`.
    pub(crate) fn write_annotated_room(
        root: &Path,
        area: u8,
        room: &str,
        objects: &[(&str, &[[f32; 6]])],
    ) -> PathBuf {
        let dir = root.join(format!("Area_{area}")).join(room);
        fs::create_dir_all(dir.join(ANNOTATIONS_DIR)).unwrap();
        for (k, (category, rows)) in objects.iter().enumerate() {
            let text: String = rows
                .iter()
                .map(|r| format!("{} {} {} {} {} {}\n", r[0], r[1], r[2], r[3], r[4], r[5]))
                .collect();
            fs::write(dir.join(ANNOTATIONS_DIR).join(format!("{category}_{k}.txt")), text).unwrap();
        }
        dir
    }

    fn parser() -> RawSceneParser {
        RawSceneParser::new(LabelMapper::s3dis())
    }

    #[test]
    fn category_is_the_stem_without_instance_suffix() {
        assert_eq!(category_from_stem("chair_12"), "chair");
        assert_eq!(category_from_stem("table"), "table");
        assert_eq!(category_from_stem("my_board_3"), "my_board");
        assert_eq!(category_from_stem("door_x"), "door_x");
    }

    #[test]
    fn per_object_annotations_become_labelled_points() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_annotated_room(
            root.path(),
            1,
            "office_1",
            &[
                ("floor", &[[1.0, 1.0, 0.0, 10.0, 10.0, 10.0], [2.0, 1.0, 0.0, 10.0, 10.0, 10.0]]),
                ("chair", &[[1.5, 2.0, 0.4, 300.0, 0.0, 0.0]]),
            ],
        );

        let room = parser()
            .parse_room(RoomId::new(AreaId(1), "office_1"), &dir)
            .unwrap()
            .unwrap();
        assert_eq!(room.len(), 3);
        // Files are read in name order: chair_1 before floor_0.
        assert_eq!(room.labels(), &[8, 1, 1]);
        // Translated so the minimum corner is the origin; colors clamped.
        assert_eq!(room.position(0).coords.as_slice(), &[0.5, 1.0, 0.4]);
        assert_eq!(room.color(0), [255.0, 0.0, 0.0]);
    }

    #[test]
    fn per_point_labels_are_read_from_room_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("Area_2").join("hallway_1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("hallway_1.txt"),
            "0 0 0 1 2 3 wall\n\n1 0 0 4 5 6 door\n",
        )
        .unwrap();

        let room = parser()
            .parse_room(RoomId::new(AreaId(2), "hallway_1"), &dir)
            .unwrap()
            .unwrap();
        assert_eq!(room.labels(), &[2, 6]);
    }

    #[test]
    fn unmapped_category_aborts_the_room() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_annotated_room(
            root.path(),
            1,
            "lounge_1",
            &[("piano", &[[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]])],
        );
        let err = parser()
            .parse_room(RoomId::new(AreaId(1), "lounge_1"), &dir)
            .unwrap_err();
        match err {
            Error::LabelMapping { category, path } => {
                assert_eq!(category, "piano");
                assert!(path.unwrap().ends_with("Annotations/piano_0.txt"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn malformed_line_reports_its_position() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_annotated_room(root.path(), 3, "wc_1", &[]);
        fs::write(
            dir.join(ANNOTATIONS_DIR).join("wall_1.txt"),
            "0 0 0 1 1 1\n0 0 0 1 1\x10 1\n",
        )
        .unwrap();
        let err = parser()
            .parse_room(RoomId::new(AreaId(3), "wc_1"), &dir)
            .unwrap_err();
        assert!(matches!(err, Error::RawFormat { line: 2, .. }));
    }

    #[test]
    fn room_without_points_is_excluded() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_annotated_room(root.path(), 4, "storage_1", &[("wall", &[])]);
        let room = parser()
            .parse_room(RoomId::new(AreaId(4), "storage_1"), &dir)
            .unwrap();
        assert!(room.is_none());
    }

    #[test]
    fn discovery_walks_areas_and_ignores_other_entries() {
        let root = tempfile::tempdir().unwrap();
        write_annotated_room(root.path(), 2, "office_2", &[]);
        write_annotated_room(root.path(), 1, "office_1", &[]);
        fs::create_dir_all(root.path().join("notes")).unwrap();
        fs::write(root.path().join("Area_1").join("readme.txt"), "x").unwrap();

        let rooms = RawSceneParser::discover_rooms(root.path()).unwrap();
        let ids: Vec<String> = rooms.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, ["Area_1/office_1", "Area_2/office_2"]);
    }
}
