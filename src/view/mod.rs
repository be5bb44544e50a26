// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Views: reduced statistical arrays with flags and labelled axes.
//!
//! A view is the unit of work for the rule engine. Views are produced by a
//! [`DataTask`](crate::DataTask) from whatever calibration data underlies
//! them; the rule engine only ever sees the data, flags and axes in here.

mod coord;
mod error;
#[cfg(test)]
mod tests;

pub use coord::Coord;
pub use error::ViewError;

use std::{collections::BTreeSet, fmt::Display};

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// A labelled axis of a [`View`]. The coordinates define the array indices
/// along this axis, so their order matters.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    name: String,
    unit: String,
    coordinates: Vec<Coord>,
}

impl Axis {
    /// Create a new axis. Coordinates must be unique.
    pub fn new<S: Into<String>, U: Into<String>>(
        name: S,
        unit: U,
        coordinates: Vec<Coord>,
    ) -> Result<Axis, ViewError> {
        let name = name.into();
        let mut seen = BTreeSet::new();
        for coord in &coordinates {
            if !seen.insert(coord) {
                return Err(ViewError::DuplicateCoordinate {
                    axis: name,
                    coord: coord.to_string(),
                });
            }
        }

        Ok(Axis {
            name,
            unit: unit.into(),
            coordinates,
        })
    }

    /// Create an axis whose coordinates are simply the indices `0..len`. Handy
    /// for channel axes.
    pub fn indexed<S: Into<String>, U: Into<String>>(name: S, unit: U, len: usize) -> Axis {
        Axis {
            name: name.into(),
            unit: unit.into(),
            coordinates: (0..len).map(Coord::from).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn coordinates(&self) -> &[Coord] {
        &self.coordinates
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// The index of a coordinate on this axis.
    pub fn position(&self, coord: &Coord) -> Option<usize> {
        self.coordinates.iter().position(|c| c == coord)
    }

    /// Does the supplied name refer to this axis? Comparisons ignore case and
    /// surrounding whitespace, so "TIME" and " time" both match "Time".
    pub fn matches(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

/// Where a view came from. This is only used to route flag operations back to
/// the correct physical location and to order views; the rule engine itself
/// never inspects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewMeta {
    /// The calibration table or measurement set underlying the view.
    pub table: String,

    /// The spectral window ID.
    pub spw: u32,

    /// Disambiguates co-located views (e.g. one per polarisation).
    pub cell_index: Option<usize>,

    /// The polarisation, if the view is specific to one.
    pub pol: Option<String>,

    /// The antenna, if the view is specific to one.
    pub antenna: Option<Coord>,

    /// A free-text description, e.g. "Tsys median, intent ATMOSPHERE".
    pub description: String,
}

/// The identity of a view, used to key per-view results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewKey {
    pub table: String,
    pub spw: u32,
    pub cell_index: Option<usize>,
    pub description: String,
}

impl Display for ViewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} spw {}", self.table, self.spw)?;
        if let Some(cell_index) = self.cell_index {
            write!(f, " cell {cell_index}")?;
        }
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

/// A rank-1 ("vector") or rank-2 ("matrix") array of data, with flags and
/// labelled axes.
///
/// `flag` is `true` where a cell is excluded from statistics or already known
/// to be bad. `nodata` is `true` where a cell structurally cannot exist (e.g.
/// an antenna that was never observed in a time bin); such cells are never
/// flagged and never counted by fraction-based rules.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    data: ArrayD<f64>,
    flag: ArrayD<bool>,
    nodata: ArrayD<bool>,
    axes: Vec<Axis>,
    pub meta: ViewMeta,
}

impl View {
    /// Create a new view with nothing flagged. The number of axes must match
    /// the rank of the data, and each axis must have as many coordinates as
    /// the data has elements along that dimension.
    pub fn new(data: ArrayD<f64>, axes: Vec<Axis>, meta: ViewMeta) -> Result<View, ViewError> {
        let rank = data.ndim();
        if !(1..=2).contains(&rank) {
            return Err(ViewError::UnsupportedRank(rank));
        }
        if axes.len() != rank {
            return Err(ViewError::AxisCount {
                rank,
                num_axes: axes.len(),
            });
        }
        for (axis, &len) in axes.iter().zip(data.shape()) {
            if axis.len() != len {
                return Err(ViewError::AxisLength {
                    axis: axis.name.clone(),
                    expected: len,
                    found: axis.len(),
                });
            }
        }
        if rank == 2 && axes[0].matches(&axes[1].name) {
            return Err(ViewError::DuplicateAxisName(axes[1].name.clone()));
        }

        let flag = ArrayD::from_elem(data.raw_dim(), false);
        let nodata = flag.clone();
        Ok(View {
            data,
            flag,
            nodata,
            axes,
            meta,
        })
    }

    /// Create a vector view.
    pub fn vector(data: Array1<f64>, axis: Axis, meta: ViewMeta) -> Result<View, ViewError> {
        View::new(data.into_dyn(), vec![axis], meta)
    }

    /// Create a matrix view. `x` labels the first dimension of `data`, `y` the
    /// second.
    pub fn matrix(
        data: Array2<f64>,
        x: Axis,
        y: Axis,
        meta: ViewMeta,
    ) -> Result<View, ViewError> {
        View::new(data.into_dyn(), vec![x, y], meta)
    }

    /// Replace the flags of this view.
    pub fn with_flag<D: Dimension>(mut self, flag: Array<bool, D>) -> Result<View, ViewError> {
        let flag = flag.into_dyn();
        self.check_shape("flag", flag.shape())?;
        self.flag = flag;
        Ok(self)
    }

    /// Mark cells of this view as structurally missing.
    pub fn with_nodata<D: Dimension>(
        mut self,
        nodata: Array<bool, D>,
    ) -> Result<View, ViewError> {
        let nodata = nodata.into_dyn();
        self.check_shape("nodata", nodata.shape())?;
        self.nodata = nodata;
        Ok(self)
    }

    fn check_shape(&self, what: &'static str, shape: &[usize]) -> Result<(), ViewError> {
        if shape != self.data.shape() {
            return Err(ViewError::ShapeMismatch {
                what,
                expected: self.data.shape().to_vec(),
                found: shape.to_vec(),
            });
        }
        Ok(())
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn flag(&self) -> &ArrayD<bool> {
        &self.flag
    }

    pub fn nodata(&self) -> &ArrayD<bool> {
        &self.nodata
    }

    pub(crate) fn flag_mut(&mut self) -> &mut ArrayD<bool> {
        &mut self.flag
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// The index of the axis matching the supplied name (see
    /// [`Axis::matches`]).
    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.matches(name))
    }

    pub fn key(&self) -> ViewKey {
        ViewKey {
            table: self.meta.table.clone(),
            spw: self.meta.spw,
            cell_index: self.meta.cell_index,
            description: self.meta.description.clone(),
        }
    }

    /// The number of cells that can hold data (i.e. are not "nodata").
    pub fn num_cells_with_data(&self) -> usize {
        self.nodata.iter().filter(|&&n| !n).count()
    }

    /// The number of flagged cells, not counting "nodata" cells.
    pub fn num_flagged(&self) -> usize {
        self.flag
            .iter()
            .zip(self.nodata.iter())
            .filter(|(&f, &n)| f && !n)
            .count()
    }

    /// The coordinates of a cell, one per axis.
    pub fn coords_of(&self, index: &[usize]) -> Vec<Coord> {
        self.axes
            .iter()
            .zip(index)
            .map(|(axis, &i)| axis.coordinates[i].clone())
            .collect()
    }
}
