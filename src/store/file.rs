// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The serialised form of views ("views files").

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::view::{Axis, Coord, View, ViewError, ViewMeta};

/// A file of views. Arrays are stored as nested lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewsFile {
    #[serde(default)]
    pub views: Vec<ViewSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub table: String,

    #[serde(default)]
    pub spw: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antenna: Option<Coord>,

    #[serde(default)]
    pub description: String,

    pub data: Values<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<Values<bool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<Values<bool>>,

    /// Tables are written after plain values in toml.
    pub axes: Vec<AxisSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub name: String,

    #[serde(default)]
    pub unit: String,

    /// If not given, the coordinates are the indices along the axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Coord>>,
}

/// A vector or a matrix (a list of rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Values<T> {
    Vector(Vec<T>),
    Matrix(Vec<Vec<T>>),
}

impl<T: Clone> Values<T> {
    fn into_array(self, what: &'static str) -> Result<ArrayD<T>, ViewError> {
        match self {
            Values::Vector(v) => Ok(Array1::from_vec(v).into_dyn()),
            Values::Matrix(rows) => {
                let num_rows = rows.len();
                let num_cols = rows.first().map(|r| r.len()).unwrap_or(0);
                if rows.iter().any(|r| r.len() != num_cols) {
                    return Err(ViewError::Ragged { what });
                }
                let flat: Vec<T> = rows.into_iter().flatten().collect();
                Array2::from_shape_vec((num_rows, num_cols), flat)
                    .map(|a| a.into_dyn())
                    .map_err(|_| ViewError::Ragged { what })
            }
        }
    }

    fn from_array(array: &ArrayD<T>) -> Values<T> {
        match array.ndim() {
            1 => Values::Vector(array.iter().cloned().collect()),
            _ => Values::Matrix(
                array
                    .outer_iter()
                    .map(|row| row.iter().cloned().collect())
                    .collect(),
            ),
        }
    }
}

impl TryFrom<ViewSpec> for View {
    type Error = ViewError;

    fn try_from(spec: ViewSpec) -> Result<View, ViewError> {
        let ViewSpec {
            table,
            spw,
            cell_index,
            pol,
            antenna,
            description,
            axes,
            data,
            flag,
            nodata,
        } = spec;

        let data = data.into_array("data")?;
        let axes = axes
            .into_iter()
            .enumerate()
            .map(|(i, AxisSpec { name, unit, coordinates })| match coordinates {
                Some(coordinates) => Axis::new(name, unit, coordinates),
                None => Ok(Axis::indexed(name, unit, data.shape().get(i).copied().unwrap_or(0))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let meta = ViewMeta {
            table,
            spw,
            cell_index,
            pol,
            antenna,
            description,
        };

        let mut view = View::new(data, axes, meta)?;
        if let Some(flag) = flag {
            view = view.with_flag(flag.into_array("flag")?)?;
        }
        if let Some(nodata) = nodata {
            view = view.with_nodata(nodata.into_array("nodata")?)?;
        }
        Ok(view)
    }
}

impl From<&View> for ViewSpec {
    fn from(view: &View) -> ViewSpec {
        let ViewMeta {
            table,
            spw,
            cell_index,
            pol,
            antenna,
            description,
        } = view.meta.clone();

        ViewSpec {
            table,
            spw,
            cell_index,
            pol,
            antenna,
            description,
            axes: view
                .axes()
                .iter()
                .map(|a| AxisSpec {
                    name: a.name().to_string(),
                    unit: a.unit().to_string(),
                    coordinates: Some(a.coordinates().to_vec()),
                })
                .collect(),
            data: Values::from_array(view.data()),
            flag: Some(Values::from_array(view.flag())),
            nodata: if view.nodata().iter().any(|&n| n) {
                Some(Values::from_array(view.nodata()))
            } else {
                None
            },
        }
    }
}
