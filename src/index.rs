//! Grid index built from the dataset's hierarchy file.
//!
//! The injector needs each grid's spatial extent, active dimensions and the
//! container file its fields live in; all of that is in the hierarchy text.

use {
    anyhow::{bail, ensure, Context, Result},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

use crate::patch::{classify, Line};

/// One grid's metadata, as read from its hierarchy entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GridEntry {
    /// 1-indexed grid ordinal
    pub id: usize,
    pub left_edge: [f64; 3],
    pub right_edge: [f64; 3],
    pub start_index: [usize; 3],
    pub end_index: [usize; 3],
    /// Container file holding this grid's field arrays
    pub baryon_file: PathBuf,
}

impl GridEntry {
    /// Name of the grid's group inside its container, zero-padded to eight
    /// digits. Datasets with wider padding are not supported.
    pub fn group_name(&self) -> String {
        format!("Grid{:08}", self.id)
    }

    /// Full dataset name of one of this grid's fields.
    pub fn field_name(&self, field: &str) -> String {
        format!("{}/{}", self.group_name(), field)
    }

    /// Cell counts excluding ghost zones.
    pub fn active_dimensions(&self) -> [usize; 3] {
        [
            self.end_index[0] - self.start_index[0] + 1,
            self.end_index[1] - self.start_index[1] + 1,
            self.end_index[2] - self.start_index[2] + 1,
        ]
    }

    /// Cell width along each axis.
    pub fn cell_widths(&self) -> [f64; 3] {
        let dims = self.active_dimensions();
        [
            (self.right_edge[0] - self.left_edge[0]) / dims[0] as f64,
            (self.right_edge[1] - self.left_edge[1]) / dims[1] as f64,
            (self.right_edge[2] - self.left_edge[2]) / dims[2] as f64,
        ]
    }
}

#[derive(Debug, Default)]
struct Builder {
    id: usize,
    left_edge: Option<[f64; 3]>,
    right_edge: Option<[f64; 3]>,
    start_index: Option<[usize; 3]>,
    end_index: Option<[usize; 3]>,
    baryon_file: Option<PathBuf>,
}

impl Builder {
    fn finish(self) -> Result<GridEntry> {
        let id = self.id;
        let missing = |what| format!("grid {} has no {} line", id, what);

        Ok(GridEntry {
            id,
            left_edge: self.left_edge.with_context(|| missing("GridLeftEdge"))?,
            right_edge: self.right_edge.with_context(|| missing("GridRightEdge"))?,
            start_index: self.start_index.with_context(|| missing("GridStartIndex"))?,
            end_index: self.end_index.with_context(|| missing("GridEndIndex"))?,
            baryon_file: self.baryon_file.with_context(|| missing("BaryonFileName"))?,
        })
    }
}

fn parse3<T: std::str::FromStr>(tokens: &[&str]) -> Result<[T; 3]>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    ensure!(tokens.len() >= 5, "malformed {} line: {:?}", tokens[0], tokens);
    Ok([
        tokens[2].parse()?,
        tokens[3].parse()?,
        tokens[4].parse()?,
    ])
}

/// Reads the hierarchy file into grid entries, in file order. Container
/// paths are resolved into the dataset directory regardless of where the
/// simulation originally ran.
pub fn read_hierarchy<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    dataset_directory: Q,
) -> Result<Vec<GridEntry>> {
    let path = path.as_ref();
    let input = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut grids = Vec::new();
    let mut current: Option<Builder> = None;

    for raw in input.lines() {
        let tokens = match classify(raw) {
            Line::Keyed(tokens) => tokens,
            Line::Passthrough => continue,
        };

        if tokens[0] == "Grid" {
            if let Some(builder) = current.take() {
                grids.push(builder.finish()?);
            }
            ensure!(tokens.len() >= 3, "malformed Grid line: {:?}", tokens);
            current = Some(Builder {
                id: tokens[2].parse()?,
                ..Builder::default()
            });
            continue;
        }

        let builder = match current.as_mut() {
            Some(builder) => builder,
            None => continue,
        };

        match tokens[0] {
            "GridLeftEdge" => builder.left_edge = Some(parse3(&tokens)?),
            "GridRightEdge" => builder.right_edge = Some(parse3(&tokens)?),
            "GridStartIndex" => builder.start_index = Some(parse3(&tokens)?),
            "GridEndIndex" => builder.end_index = Some(parse3(&tokens)?),
            "BaryonFileName" => {
                ensure!(tokens.len() >= 3, "malformed BaryonFileName line: {:?}", tokens);
                let file_name = match Path::new(tokens[2]).file_name() {
                    Some(name) => name.to_owned(),
                    None => bail!("grid {} has an empty BaryonFileName", builder.id),
                };
                builder.baryon_file = Some(dataset_directory.as_ref().join(file_name));
            }
            _ => {}
        }
    }

    if let Some(builder) = current.take() {
        grids.push(builder.finish()?);
    }

    ensure!(!grids.is_empty(), "no grid entries found in {}", path.display());

    Ok(grids)
}
