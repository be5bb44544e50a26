// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flag operations: immutable commands describing what should be flagged in
//! the data underlying a view.

use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};
use vec1::Vec1;

use crate::view::{Coord, View};

/// Why a cell was flagged. The discriminants are the codes used in flag-reason
/// planes; 0 is reserved for "not flagged by the rule engine".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumIter,
    EnumString,
)]
#[repr(u8)]
pub enum FlagReason {
    #[strum(serialize = "max abs")]
    #[serde(rename = "max abs")]
    MaxAbs = 1,

    #[strum(serialize = "min abs")]
    #[serde(rename = "min abs")]
    MinAbs = 2,

    #[strum(serialize = "nmedian")]
    #[serde(rename = "nmedian")]
    NMedian = 3,

    #[strum(serialize = "outlier")]
    #[serde(rename = "outlier")]
    Outlier = 4,

    #[strum(serialize = "high outlier")]
    #[serde(rename = "high outlier")]
    HighOutlier = 5,

    #[strum(serialize = "low outlier")]
    #[serde(rename = "low outlier")]
    LowOutlier = 6,

    #[strum(serialize = "too many flags")]
    #[serde(rename = "too many flags")]
    TooManyFlags = 7,

    #[strum(serialize = "bad quadrant")]
    #[serde(rename = "bad quadrant")]
    BadQuadrant = 8,

    #[strum(serialize = "bad antenna")]
    #[serde(rename = "bad antenna")]
    BadAntenna = 9,

    #[strum(serialize = "too many entirely flagged")]
    #[serde(rename = "too many entirely flagged")]
    TooManyEntirelyFlagged = 10,

    #[strum(serialize = "edges")]
    #[serde(rename = "edges")]
    Edges = 11,

    #[strum(serialize = "sharps")]
    #[serde(rename = "sharps")]
    Sharps = 12,

    #[strum(serialize = "diffmad")]
    #[serde(rename = "diffmad")]
    DiffMad = 13,

    #[strum(serialize = "tmf")]
    #[serde(rename = "tmf")]
    TooManyFlaggedChannels = 14,
}

impl FlagReason {
    /// The code of this reason in a flag-reason plane.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<FlagReason> {
        use strum::IntoEnumIterator;
        FlagReason::iter().find(|r| r.code() == code)
    }
}

/// An inclusive range of channel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelRange {
    pub start: usize,
    pub end: usize,
}

impl ChannelRange {
    pub fn num_channels(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Collapse channel indices into contiguous ranges. The indices need not
    /// be sorted; duplicates are ignored.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Vec<ChannelRange> {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();

        let mut ranges: Vec<ChannelRange> = vec![];
        for i in indices {
            match ranges.last_mut() {
                Some(last) if last.end + 1 == i => last.end = i,
                _ => ranges.push(ChannelRange { start: i, end: i }),
            }
        }
        ranges
    }
}

impl Display for ChannelRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}~{}", self.start, self.end)
        }
    }
}

/// What a [`FlagOp`] flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagTarget {
    /// Flag the entire target (table, spw and cell) unconditionally.
    Everything,

    /// Flag these cells. Each tuple has one coordinate per axis name of the
    /// [`FlagOp`], in the same order.
    Coords(Vec1<Vec<Coord>>),

    /// Flag these channels of a vector view.
    Channels(Vec1<ChannelRange>),
}

/// An immutable flagging command. Flag operations are produced by the rule
/// engine, and consumed in batches by a [`FlagSetter`](crate::FlagSetter),
/// which is responsible for translating them into whatever the underlying
/// store needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlagOp {
    table: String,
    spw: u32,
    cell_index: Option<usize>,
    pol: Option<String>,
    antenna: Option<Coord>,
    reason: FlagReason,
    axis_names: Vec<String>,
    target: FlagTarget,
}

impl FlagOp {
    /// Create a new flag operation. If the target is
    /// [`FlagTarget::Everything`], the axis names are ignored.
    pub fn new<S: Into<String>>(
        table: S,
        spw: u32,
        reason: FlagReason,
        axis_names: Vec<String>,
        target: FlagTarget,
    ) -> FlagOp {
        let axis_names = match target {
            FlagTarget::Everything => vec![],
            _ => axis_names,
        };
        FlagOp {
            table: table.into(),
            spw,
            cell_index: None,
            pol: None,
            antenna: None,
            reason,
            axis_names,
            target,
        }
    }

    pub fn with_cell_index(mut self, cell_index: Option<usize>) -> FlagOp {
        self.cell_index = cell_index;
        self
    }

    pub fn with_pol(mut self, pol: Option<String>) -> FlagOp {
        self.pol = pol;
        self
    }

    pub fn with_antenna(mut self, antenna: Option<Coord>) -> FlagOp {
        self.antenna = antenna;
        self
    }

    /// A flag operation for some cells of a view. Vector views produce channel
    /// ranges, matrix views produce coordinate tuples. Returns `None` if there
    /// are no cells.
    pub(crate) fn for_cells(view: &View, reason: FlagReason, cells: &[Vec<usize>]) -> Option<FlagOp> {
        let target = if view.rank() == 1 {
            let ranges = ChannelRange::from_indices(cells.iter().map(|c| c[0]));
            FlagTarget::Channels(Vec1::try_from_vec(ranges).ok()?)
        } else {
            let coords = cells.iter().map(|c| view.coords_of(c)).collect();
            FlagTarget::Coords(Vec1::try_from_vec(coords).ok()?)
        };
        let axis_names = view.axes().iter().map(|a| a.name().to_string()).collect();
        Some(FlagOp::from_view(view, reason, axis_names, target))
    }

    /// A flag operation flagging everything underlying a view.
    pub(crate) fn entire(view: &View, reason: FlagReason) -> FlagOp {
        FlagOp::from_view(view, reason, vec![], FlagTarget::Everything)
    }

    fn from_view(
        view: &View,
        reason: FlagReason,
        axis_names: Vec<String>,
        target: FlagTarget,
    ) -> FlagOp {
        FlagOp::new(view.meta.table.clone(), view.meta.spw, reason, axis_names, target)
            .with_cell_index(view.meta.cell_index)
            .with_pol(view.meta.pol.clone())
            .with_antenna(view.meta.antenna.clone())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn spw(&self) -> u32 {
        self.spw
    }

    pub fn cell_index(&self) -> Option<usize> {
        self.cell_index
    }

    pub fn pol(&self) -> Option<&str> {
        self.pol.as_deref()
    }

    pub fn antenna(&self) -> Option<&Coord> {
        self.antenna.as_ref()
    }

    /// The rule that raised this flag operation.
    pub fn reason(&self) -> FlagReason {
        self.reason
    }

    /// The names of the axes the coordinates refer to. Empty if the entire
    /// target is flagged.
    pub fn axis_names(&self) -> &[String] {
        &self.axis_names
    }

    pub fn target(&self) -> &FlagTarget {
        &self.target
    }

    /// The number of view cells named by this operation, or `None` if it flags
    /// everything.
    pub fn num_cells(&self) -> Option<usize> {
        match &self.target {
            FlagTarget::Everything => None,
            FlagTarget::Coords(c) => Some(c.len()),
            FlagTarget::Channels(r) => Some(r.iter().map(|r| r.num_channels()).sum()),
        }
    }
}

impl Display for FlagOp {
    /// Render a flag-command-like string, e.g.
    /// `mode='manual' table='t.cal' spw='3:0~4;9' reason='outlier'`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mode='manual' table='{}'", self.table)?;
        match &self.target {
            FlagTarget::Channels(ranges) => {
                write!(f, " spw='{}:{}'", self.spw, ranges.iter().join(";"))?
            }
            _ => write!(f, " spw='{}'", self.spw)?,
        }
        if let Some(antenna) = &self.antenna {
            write!(f, " antenna='{antenna}'")?;
        }
        if let Some(pol) = &self.pol {
            write!(f, " correlation='{pol}'")?;
        }
        if let Some(cell_index) = self.cell_index {
            write!(f, " cell='{cell_index}'")?;
        }
        if let FlagTarget::Coords(tuples) = &self.target {
            write!(
                f,
                " {}='{}'",
                self.axis_names.join(","),
                tuples
                    .iter()
                    .map(|t| format!("({})", t.iter().join(",")))
                    .join(" ")
            )?;
        }
        write!(f, " reason='{}'", self.reason)
    }
}
