// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with constructing views.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Views must be vectors (rank 1) or matrices (rank 2), but the data has rank {0}")]
    UnsupportedRank(usize),

    #[error("The {what} array has shape {found:?}, but the data has shape {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("The data has rank {rank}, but {num_axes} axes were supplied")]
    AxisCount { rank: usize, num_axes: usize },

    #[error("Axis '{axis}' has {found} coordinates, but the data has {expected} elements along it")]
    AxisLength {
        axis: String,
        expected: usize,
        found: usize,
    },

    #[error("Axis '{axis}' has the duplicate coordinate '{coord}'; coordinates must be unique")]
    DuplicateCoordinate { axis: String, coord: String },

    #[error("More than one axis is named '{0}'")]
    DuplicateAxisName(String),

    #[error("The rows of the '{what}' matrix don't all have the same length")]
    Ragged { what: &'static str },
}
