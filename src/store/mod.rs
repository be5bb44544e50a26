// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A simple store of views, read from and written to "views files".
//!
//! [`ViewStore`] is both a [`DataTask`] (it produces copies of its views) and
//! a [`FlagSetter`] (it applies flag operations to its views), which makes it
//! possible to run the [`Flagger`](crate::Flagger) end-to-end on views that
//! were reduced elsewhere. Handles are cheap to clone and share the same
//! views.

mod error;
mod file;
#[cfg(test)]
mod tests;

pub use error::StoreError;
pub use file::{AxisSpec, Values, ViewSpec, ViewsFile};

use std::{
    cell::RefCell,
    fmt::Display,
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
    rc::Rc,
    str::FromStr,
};

use itertools::Itertools;
use log::{debug, trace};
use ndarray::Dimension;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use crate::{
    flagging::{DataTask, FlagOp, FlagSetter, FlagTarget},
    view::View,
};

#[derive(Debug, Clone, Copy, StrumDisplay, EnumIter, EnumString)]
enum ViewsFileType {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

impl ViewsFileType {
    fn from_path(path: &Path) -> Result<ViewsFileType, StoreError> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ViewsFileType::from_str(&e).ok())
            .ok_or_else(|| StoreError::UnknownExtension {
                file: path.to_path_buf(),
                valid: ViewsFileType::iter().join(", "),
            })
    }
}

/// How many cells are flagged. Cells that are "nodata" aren't counted at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCounts {
    pub flagged: usize,
    pub total: usize,
}

impl FlagCounts {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.flagged as f64 / self.total as f64
        }
    }
}

impl Display for FlagCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({:.2}%)",
            self.flagged,
            self.total,
            self.fraction() * 100.0
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    views: Rc<RefCell<Vec<View>>>,
}

impl ViewStore {
    pub fn new(views: Vec<View>) -> ViewStore {
        ViewStore {
            views: Rc::new(RefCell::new(views)),
        }
    }

    /// Read views from a json or toml file. The file type is determined by
    /// the extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ViewStore, StoreError> {
        let path = path.as_ref();
        let file_type = ViewsFileType::from_path(path)?;
        debug!("Reading {file_type} views file {}", path.display());

        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        let views_file: ViewsFile = match file_type {
            ViewsFileType::Toml => toml::from_str(&contents).map_err(|err| StoreError::TomlDe {
                file: path.to_path_buf(),
                err,
            })?,
            ViewsFileType::Json => {
                serde_json::from_str(&contents).map_err(|err| StoreError::Json {
                    file: path.to_path_buf(),
                    err,
                })?
            }
        };
        ViewStore::from_views_file(views_file)
    }

    pub fn from_views_file(views_file: ViewsFile) -> Result<ViewStore, StoreError> {
        let views = views_file
            .views
            .into_iter()
            .enumerate()
            .map(|(index, spec)| View::try_from(spec).map_err(|err| StoreError::View { index, err }))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Got {} views", views.len());
        Ok(ViewStore::new(views))
    }

    /// Write the views, with their current flags, to a json or toml file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        let file_type = ViewsFileType::from_path(path)?;
        let views_file = self.to_views_file();

        let mut writer = BufWriter::new(File::create(path)?);
        match file_type {
            ViewsFileType::Toml => writer.write_all(toml::to_string(&views_file)?.as_bytes())?,
            ViewsFileType::Json => serde_json::to_writer_pretty(&mut writer, &views_file)?,
        }
        writer.flush()?;
        debug!("Wrote views to {}", path.display());
        Ok(())
    }

    pub fn to_views_file(&self) -> ViewsFile {
        ViewsFile {
            views: self.views.borrow().iter().map(ViewSpec::from).collect(),
        }
    }

    /// Copies of the views, with all flags applied so far.
    pub fn views(&self) -> Vec<View> {
        self.views.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.views.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.borrow().is_empty()
    }

    pub fn counts(&self) -> FlagCounts {
        self.views
            .borrow()
            .iter()
            .fold(FlagCounts::default(), |acc, view| FlagCounts {
                flagged: acc.flagged + view.num_flagged(),
                total: acc.total + view.num_cells_with_data(),
            })
    }
}

impl DataTask for ViewStore {
    type Error = StoreError;

    fn produce(&mut self) -> Result<Vec<View>, StoreError> {
        Ok(self.views())
    }
}

impl FlagSetter for ViewStore {
    type Summary = FlagCounts;
    type Error = StoreError;

    fn summarise(&mut self) -> Result<FlagCounts, StoreError> {
        Ok(self.counts())
    }

    fn apply(&mut self, flagops: &[FlagOp]) -> Result<FlagCounts, StoreError> {
        {
            let mut views = self.views.borrow_mut();
            for flagop in flagops {
                let num_flagged = apply_flagop(&mut views, flagop)?;
                trace!("{flagop} flagged {num_flagged} new cells");
            }
        }
        Ok(self.counts())
    }
}

/// Does the flag operation refer to this view?
fn targets(flagop: &FlagOp, view: &View) -> bool {
    flagop.table() == view.meta.table
        && flagop.spw() == view.meta.spw
        && flagop.cell_index() == view.meta.cell_index
        && match flagop.pol() {
            Some(pol) => view.meta.pol.as_deref() == Some(pol),
            None => true,
        }
}

/// Apply a flag operation to all views it refers to. Returns the number of
/// newly flagged cells. "nodata" cells are never flagged.
///
/// Several views can share a table and spw (e.g. one per intent) while having
/// different axes. A view that can't place the operation's cells is skipped;
/// it is only an error if none of the views it refers to can place them.
fn apply_flagop(views: &mut [View], flagop: &FlagOp) -> Result<usize, StoreError> {
    let mut num_matches = 0;
    let mut num_placed = 0;
    let mut num_flagged = 0;
    let mut first_err = None;
    for view in views.iter_mut().filter(|v| targets(flagop, v)) {
        num_matches += 1;
        let cells = match cells_of(view, flagop) {
            Ok(cells) => cells,
            Err(err) => {
                trace!("Skipping '{}': {err}", view.key());
                if first_err.is_none() {
                    first_err = Some(err);
                }
                continue;
            }
        };
        num_placed += 1;

        let nodata = view.nodata().clone();
        let flag = view.flag_mut();
        for cell in cells {
            if !nodata[cell.as_slice()] && !flag[cell.as_slice()] {
                flag[cell.as_slice()] = true;
                num_flagged += 1;
            }
        }
    }

    match (num_matches, num_placed, first_err) {
        (0, _, _) => Err(StoreError::NoMatchingView(flagop.to_string())),
        (_, 0, Some(err)) => Err(err),
        _ => Ok(num_flagged),
    }
}

/// The indices of the cells of a view named by a flag operation.
fn cells_of(view: &View, flagop: &FlagOp) -> Result<Vec<Vec<usize>>, StoreError> {
    match flagop.target() {
        FlagTarget::Everything => Ok(view
            .data()
            .indexed_iter()
            .map(|(index, _)| index.slice().to_vec())
            .collect()),

        FlagTarget::Channels(ranges) => {
            if view.rank() != 1 {
                return Err(StoreError::AxisMismatch {
                    view: view.key().to_string(),
                    axes: flagop.axis_names().to_vec(),
                });
            }
            let num_channels = view.shape()[0];
            let mut cells = vec![];
            for range in ranges {
                if range.end >= num_channels {
                    return Err(StoreError::ChannelOutOfRange {
                        view: view.key().to_string(),
                        channel: range.end,
                        num_channels,
                    });
                }
                cells.extend((range.start..=range.end).map(|c| vec![c]));
            }
            Ok(cells)
        }

        FlagTarget::Coords(tuples) => {
            let axis_names = flagop.axis_names();
            let axis_indices = axis_names
                .iter()
                .map(|name| {
                    view.axis_index(name).ok_or_else(|| StoreError::UnknownAxis {
                        view: view.key().to_string(),
                        axis: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if axis_indices.len() != view.rank() || !axis_indices.iter().all_unique() {
                return Err(StoreError::AxisMismatch {
                    view: view.key().to_string(),
                    axes: axis_names.to_vec(),
                });
            }

            tuples
                .iter()
                .map(|tuple| {
                    let mut cell = vec![0; view.rank()];
                    for (&axis_index, coord) in axis_indices.iter().zip(tuple) {
                        let axis = &view.axes()[axis_index];
                        cell[axis_index] =
                            axis.position(coord)
                                .ok_or_else(|| StoreError::UnknownCoordinate {
                                    view: view.key().to_string(),
                                    axis: axis.name().to_string(),
                                    coord: coord.to_string(),
                                })?;
                    }
                    Ok(cell)
                })
                .collect()
        }
    }
}
