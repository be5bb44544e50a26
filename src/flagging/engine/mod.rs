// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The rule engine: evaluate a [`RuleSet`] against a single [`View`].
//!
//! Rules are applied in order, and each rule sees the flags set by the rules
//! before it. Robust statistics (median and MAD of the valid cells) are
//! computed at the start of each pass, and passes are repeated until one of
//! them raises no new flags.


use itertools::Itertools;
use log::{debug, trace, warn};
use ndarray::prelude::*;

use super::{FlagOp, FlagReason, Rule, RuleError, RuleSet};
use crate::{
    math::{median_and_mad, median_in_place, median_of_counts},
    view::View,
};

/// The outcome of evaluating a rule set against a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Flag operations raised, in the order they were raised.
    pub flagops: Vec<FlagOp>,

    /// The reason code of every cell flagged by this evaluation (0 for cells
    /// that weren't). Same shape as the view.
    pub reasons: ArrayD<u8>,

    /// The number of passes over the rules, including the final pass that
    /// raised nothing.
    pub passes: usize,
}

impl Evaluation {
    /// The number of cells flagged by this evaluation.
    pub fn num_flagged(&self) -> usize {
        self.reasons.iter().filter(|&&r| r != 0).count()
    }
}

/// Robust statistics of the valid cells of a view.
#[derive(Debug, Clone, Copy)]
struct Stats {
    median: f64,
    mad: f64,
    num_valid: usize,
}

/// Flag state threaded through the rules. Only committed back to the view once
/// evaluation is finished.
struct FlagBuffer {
    flag: ArrayD<bool>,
    reasons: ArrayD<u8>,
    flagops: Vec<FlagOp>,
}

impl FlagBuffer {
    fn new(view: &View) -> FlagBuffer {
        FlagBuffer {
            flag: view.flag().clone(),
            reasons: ArrayD::zeros(view.data().raw_dim()),
            flagops: vec![],
        }
    }

    /// Can this cell still be flagged?
    fn is_open(&self, view: &View, index: &[usize]) -> bool {
        !self.flag[index] && !view.nodata()[index]
    }

    /// Flag cells and record a single flag operation for them. Returns the
    /// number of cells flagged.
    fn flag_cells(&mut self, view: &View, reason: FlagReason, cells: Vec<Vec<usize>>) -> usize {
        let Some(flagop) = FlagOp::for_cells(view, reason, &cells) else {
            return 0;
        };
        for cell in &cells {
            self.flag[cell.as_slice()] = true;
            self.reasons[cell.as_slice()] = reason.code();
        }
        trace!("{flagop}");
        self.flagops.push(flagop);
        cells.len()
    }

    /// Flag all open cells with a single "everything" flag operation.
    fn flag_everything(&mut self, view: &View, reason: FlagReason) -> usize {
        let cells: Vec<Vec<usize>> = view
            .data()
            .indexed_iter()
            .filter(|(index, _)| self.is_open(view, index.slice()))
            .map(|(index, _)| index.slice().to_vec())
            .collect();
        if cells.is_empty() {
            return 0;
        }
        for cell in &cells {
            self.flag[cell.as_slice()] = true;
            self.reasons[cell.as_slice()] = reason.code();
        }
        self.flagops.push(FlagOp::entire(view, reason));
        cells.len()
    }

    /// The indices of open cells with finite data satisfying `test`.
    fn open_cells<F: Fn(f64) -> bool>(&self, view: &View, test: F) -> Vec<Vec<usize>> {
        view.data()
            .indexed_iter()
            .filter(|(index, &value)| {
                self.is_open(view, index.slice()) && value.is_finite() && test(value)
            })
            .map(|(index, _)| index.slice().to_vec())
            .collect()
    }
}

/// Evaluate a rule set against a view, flagging the view in place.
///
/// Any rule referring to an axis the view doesn't have is an error, and in that
/// case the view is left untouched. Views without any valid data are not an
/// error; rules that need the median and MAD are skipped, the others are still
/// applied.
pub fn evaluate(view: &mut View, rules: &RuleSet) -> Result<Evaluation, RuleError> {
    check_axes(view, rules)?;

    let mut buffer = FlagBuffer::new(view);
    let mut passes = 0;
    loop {
        passes += 1;
        let num_new = evaluate_pass(view, rules, &mut buffer);
        trace!("Pass {passes} over '{}' flagged {num_new} cells", view.key());
        if num_new == 0 {
            break;
        }
    }

    let FlagBuffer {
        flag,
        reasons,
        flagops,
    } = buffer;
    *view.flag_mut() = flag;
    debug!(
        "'{}': {} flag operations after {passes} passes",
        view.key(),
        flagops.len()
    );
    Ok(Evaluation {
        flagops,
        reasons,
        passes,
    })
}

fn check_axes(view: &View, rules: &RuleSet) -> Result<(), RuleError> {
    for rule in rules {
        if let Some(axis) = rule.axis() {
            if view.axis_index(axis).is_none() {
                return Err(RuleError::MissingAxis {
                    rule: rule.name(),
                    axis: axis.to_string(),
                    view: view.key().to_string(),
                    available: view.axes().iter().map(|a| a.name().to_string()).collect(),
                });
            }
        }
    }
    Ok(())
}

/// One pass over all rules. Returns the number of newly flagged cells.
fn evaluate_pass(view: &View, rules: &RuleSet, buffer: &mut FlagBuffer) -> usize {
    let valid: Vec<f64> = view
        .data()
        .iter()
        .zip(buffer.flag.iter())
        .zip(view.nodata().iter())
        .filter(|((v, &f), &n)| !f && !n && v.is_finite())
        .map(|((&v, _), _)| v)
        .collect();
    let stats = median_and_mad(&valid).map(|(median, mad)| Stats {
        median,
        mad,
        num_valid: valid.len(),
    });
    match stats {
        Some(s) => trace!(
            "median {}, MAD {}, {} valid cells",
            s.median,
            s.mad,
            s.num_valid
        ),
        None => trace!("'{}' has no valid cells", view.key()),
    }

    rules
        .iter()
        .fold(0, |num_new, rule| num_new + apply_rule(view, rule, stats, buffer))
}

fn apply_rule(view: &View, rule: &Rule, stats: Option<Stats>, buffer: &mut FlagBuffer) -> usize {
    let reason = rule.reason();

    match *rule {
        Rule::Outlier { limit, minsample } => {
            let Some(Stats { median, mad, .. }) = stats.filter(|s| s.num_valid >= minsample) else {
                return 0;
            };
            let cells = buffer.open_cells(view, |v| (v - median).abs() > limit * mad);
            buffer.flag_cells(view, reason, cells)
        }

        Rule::HighOutlier { limit, minsample } => {
            let Some(Stats { median, mad, .. }) = stats.filter(|s| s.num_valid >= minsample) else {
                return 0;
            };
            let cells = buffer.open_cells(view, |v| v - median > limit * mad);
            buffer.flag_cells(view, reason, cells)
        }

        Rule::LowOutlier { limit, minsample } => {
            let Some(Stats { median, mad, .. }) = stats.filter(|s| s.num_valid >= minsample) else {
                return 0;
            };
            let cells = buffer.open_cells(view, |v| median - v > limit * mad);
            buffer.flag_cells(view, reason, cells)
        }

        Rule::MinAbs { limit } => {
            let cells = buffer.open_cells(view, |v| v.abs() < limit);
            buffer.flag_cells(view, reason, cells)
        }

        Rule::MaxAbs { limit } => {
            let cells = buffer.open_cells(view, |v| v.abs() > limit);
            buffer.flag_cells(view, reason, cells)
        }

        Rule::NMedian { hi_limit, lo_limit } => {
            let Some(Stats { median, .. }) = stats else {
                return 0;
            };
            let cells = buffer.open_cells(view, |v| {
                v > hi_limit * median || lo_limit.map_or(false, |lo| v < lo * median)
            });
            buffer.flag_cells(view, reason, cells)
        }

        Rule::TooManyFlags {
            ref axis,
            limit,
            excess_limit,
        } => {
            let Some(axis) = view.axis_index(axis) else {
                return 0;
            };
            too_many_flags(view, buffer, axis, limit, excess_limit)
        }

        Rule::TooManyEntirelyFlagged { ref axis, limit } => {
            let Some(axis) = view.axis_index(axis) else {
                return 0;
            };
            too_many_entirely_flagged(view, buffer, axis, limit)
        }

        Rule::BadAntenna {
            lo_limit,
            frac_limit,
            number_limit,
            minsample,
        } => {
            let Some(Stats { median, mad, .. }) = stats else {
                return 0;
            };
            bad_antenna(
                view,
                buffer,
                median,
                mad,
                lo_limit,
                frac_limit,
                number_limit,
                minsample,
            )
        }

        Rule::BadQuadrant {
            hilo_limit,
            frac_limit,
            baseline_frac_limit,
        } => {
            let Some(Stats { median, mad, .. }) = stats else {
                return 0;
            };
            bad_quadrant(
                view,
                buffer,
                |v| (v - median).abs() > hilo_limit * mad,
                frac_limit,
                baseline_frac_limit,
            )
        }

        Rule::Edges { limit } => edges(view, buffer, limit),

        Rule::Sharps { limit } => sharps(view, buffer, limit),

        Rule::DiffMad { limit, nchan_limit } => diffmad(view, buffer, limit, nchan_limit),

        Rule::TooManyFlaggedChannels {
            frac_limit,
            nchan_limit,
        } => too_many_flagged_channels(view, buffer, frac_limit, nchan_limit),
    }
}

/// The cell indices of every lane running along `axis`, i.e. every set of
/// cells that vary only in their `axis` index.
fn lanes(shape: &[usize], axis: usize) -> Vec<Vec<Vec<usize>>> {
    match shape {
        [n] => vec![(0..*n).map(|i| vec![i]).collect()],
        _ => {
            let other = 1 - axis;
            (0..shape[other])
                .map(|o| {
                    (0..shape[axis])
                        .map(|i| {
                            let mut index = vec![0; 2];
                            index[axis] = i;
                            index[other] = o;
                            index
                        })
                        .collect()
                })
                .collect()
        }
    }
}

/// The cell indices sharing each coordinate of `axis`.
fn slices_at(shape: &[usize], axis: usize) -> Vec<Vec<Vec<usize>>> {
    match shape {
        [n] => (0..*n).map(|i| vec![vec![i]]).collect(),
        _ => lanes(shape, 1 - axis),
    }
}

fn too_many_flags(
    view: &View,
    buffer: &mut FlagBuffer,
    axis: usize,
    limit: f64,
    excess_limit: Option<usize>,
) -> usize {
    let lanes = lanes(view.shape(), axis);
    let nodata = view.nodata();

    // (flagged, with data) per lane, not counting nodata cells.
    let counts: Vec<(usize, usize)> = lanes
        .iter()
        .map(|lane| {
            lane.iter()
                .filter(|c| !nodata[c.as_slice()])
                .fold((0, 0), |(flagged, total), c| {
                    (flagged + usize::from(buffer.flag[c.as_slice()]), total + 1)
                })
        })
        .collect();
    let median_flagged =
        median_of_counts(&counts.iter().map(|(f, _)| *f).collect::<Vec<_>>()).unwrap_or(0.0);

    let mut cells = vec![];
    for (lane, &(flagged, total)) in lanes.iter().zip(counts.iter()) {
        if total == 0 || flagged == total {
            continue;
        }
        let too_many = flagged as f64 / total as f64 > limit;
        let excessive =
            excess_limit.map_or(false, |excess| flagged as f64 > median_flagged + excess as f64);
        if too_many || excessive {
            cells.extend(
                lane.iter()
                    .filter(|c| buffer.is_open(view, c.as_slice()))
                    .cloned(),
            );
        }
    }
    buffer.flag_cells(view, FlagReason::TooManyFlags, cells)
}

fn too_many_entirely_flagged(
    view: &View,
    buffer: &mut FlagBuffer,
    axis: usize,
    limit: f64,
) -> usize {
    let nodata = view.nodata();
    let (num_entirely_flagged, num_coords) = slices_at(view.shape(), axis)
        .iter()
        .filter_map(|slice| {
            let mut with_data = slice.iter().filter(|c| !nodata[c.as_slice()]).peekable();
            with_data.peek()?;
            Some(with_data.all(|c| buffer.flag[c.as_slice()]))
        })
        .fold((0, 0), |(entire, total), is_entire| {
            (entire + usize::from(is_entire), total + 1)
        });
    if num_coords == 0 {
        return 0;
    }

    if num_entirely_flagged as f64 / num_coords as f64 > limit {
        buffer.flag_everything(view, FlagReason::TooManyEntirelyFlagged)
    } else {
        0
    }
}

#[allow(clippy::too_many_arguments)]
fn bad_antenna(
    view: &View,
    buffer: &mut FlagBuffer,
    median: f64,
    mad: f64,
    lo_limit: f64,
    frac_limit: f64,
    number_limit: usize,
    minsample: usize,
) -> usize {
    if view.rank() != 2 || !view.axes()[0].name().to_uppercase().contains("ANTENNA") {
        trace!("'{}' has no antenna axis; not looking for bad antennas", view.key());
        return 0;
    }

    let data = view.data();
    let nodata = view.nodata();
    let mut low_cells = vec![];
    let mut bad_cells = vec![];
    for (ant, row) in lanes(view.shape(), 1).into_iter().enumerate() {
        let row_len = row.iter().filter(|c| !nodata[c.as_slice()]).count();
        let num_valid = row
            .iter()
            .filter(|c| buffer.is_open(view, c.as_slice()) && data[c.as_slice()].is_finite())
            .count();
        if num_valid < minsample {
            continue;
        }

        let (low, rest): (Vec<_>, Vec<_>) = row
            .into_iter()
            .filter(|c| buffer.is_open(view, c.as_slice()))
            .partition(|c| {
                let v = data[c.as_slice()];
                v.is_finite() && median - v > lo_limit * mad
            });
        let num_low = low.len();
        if num_low == 0 {
            continue;
        }

        let frac = num_low as f64 / row_len as f64;
        if num_low >= number_limit || frac > frac_limit {
            debug!(
                "'{}': antenna {} is bad ({num_low} low outliers)",
                view.key(),
                view.axes()[0].coordinates()[ant]
            );
            low_cells.extend(low);
            bad_cells.extend(rest);
        }
    }

    buffer.flag_cells(view, FlagReason::LowOutlier, low_cells)
        + buffer.flag_cells(view, FlagReason::BadAntenna, bad_cells)
}

/// Look for quadrants of a channel-by-baseline matrix with too many outliers.
/// Counts are taken against the flags on entry, so antennas are judged
/// independently of each other.
fn bad_quadrant<F: Fn(f64) -> bool>(
    view: &View,
    buffer: &mut FlagBuffer,
    is_outlier: F,
    frac_limit: f64,
    baseline_frac_limit: f64,
) -> usize {
    let &[num_chans, num_baselines] = view.shape() else {
        trace!("'{}' isn't a matrix; not looking for bad quadrants", view.key());
        return 0;
    };
    let num_ants = (num_baselines as f64).sqrt().round() as usize;
    if num_ants * num_ants != num_baselines {
        trace!(
            "'{}' has {num_baselines} baselines, which isn't the square of a number of antennas; not looking for bad quadrants",
            view.key()
        );
        return 0;
    }

    let data = view.data();
    let open = Array2::from_shape_fn((num_chans, num_baselines), |(c, b)| {
        buffer.is_open(view, &[c, b])
    });
    let outlier = Array2::from_shape_fn((num_chans, num_baselines), |(c, b)| {
        let v = data[[c, b].as_slice()];
        open[(c, b)] && v.is_finite() && is_outlier(v)
    });
    let quadrants = [
        0..num_chans / 4,
        num_chans / 4..num_chans / 2,
        num_chans / 2..num_chans * 3 / 4,
        num_chans * 3 / 4..num_chans,
    ];
    // Is the fraction of outliers among the open cells above the limit?
    let too_many = |chans: &std::ops::Range<usize>, baselines: &[usize], limit: f64| {
        let (num_open, num_outliers) = chans
            .clone()
            .cartesian_product(baselines.iter())
            .fold((0, 0), |(o, n), (c, &b)| {
                (
                    o + usize::from(open[(c, b)]),
                    n + usize::from(outlier[(c, b)]),
                )
            });
        num_open > 0 && num_outliers as f64 / num_open as f64 > limit
    };

    let mut bad = Array2::from_elem((num_chans, num_baselines), false);
    for ant in 0..num_ants {
        let baselines: Vec<usize> = (0..num_baselines)
            .filter(|b| b / num_ants == ant || b % num_ants == ant)
            .collect();
        for chans in &quadrants {
            let bad_baselines: Vec<usize> = if too_many(chans, &baselines, frac_limit) {
                debug!("'{}': antenna {ant} is bad in channels {chans:?}", view.key());
                baselines.clone()
            } else {
                baselines
                    .iter()
                    .copied()
                    .filter(|&b| too_many(chans, &[b], baseline_frac_limit))
                    .collect()
            };
            for (c, b) in chans.clone().cartesian_product(bad_baselines) {
                bad[(c, b)] = true;
            }
        }
    }

    let (outlier_cells, quadrant_cells): (Vec<_>, Vec<_>) = bad
        .indexed_iter()
        .filter(|&((c, b), &is_bad)| is_bad && open[(c, b)])
        .map(|((c, b), _)| (vec![c, b], outlier[(c, b)]))
        .partition(|(_, is_outlier)| *is_outlier);
    let strip = |cells: Vec<(Vec<usize>, bool)>| -> Vec<Vec<usize>> {
        cells.into_iter().map(|(c, _)| c).collect()
    };
    buffer.flag_cells(view, FlagReason::Outlier, strip(outlier_cells))
        + buffer.flag_cells(view, FlagReason::BadQuadrant, strip(quadrant_cells))
}

/// The data of a vector view, and whether each channel is still valid (open
/// with finite data). `None` for views that aren't vectors.
fn channels(view: &View, buffer: &FlagBuffer, rule: &str) -> Option<(Vec<f64>, Vec<bool>)> {
    if view.rank() != 1 {
        trace!("'{}' isn't a vector; not applying '{rule}'", view.key());
        return None;
    }
    let data: Vec<f64> = view.data().iter().copied().collect();
    let valid = data
        .iter()
        .enumerate()
        .map(|(i, v)| buffer.is_open(view, &[i]) && v.is_finite())
        .collect();
    Some((data, valid))
}

/// Flag the open channels satisfying `test`.
fn flag_channels<F: Fn(usize) -> bool>(
    view: &View,
    buffer: &mut FlagBuffer,
    reason: FlagReason,
    test: F,
) -> usize {
    let cells = (0..view.shape()[0])
        .filter(|&i| test(i) && buffer.is_open(view, &[i]))
        .map(|i| vec![i])
        .collect();
    buffer.flag_cells(view, reason, cells)
}

/// Both channels of every difference marked in `diffs`.
fn channels_of_diffs(diffs: &[bool], i: usize) -> bool {
    diffs.get(i).copied().unwrap_or(false) || (i > 0 && diffs[i - 1])
}

fn edges(view: &View, buffer: &mut FlagBuffer, limit: f64) -> usize {
    let Some((data, valid)) = channels(view, buffer, "edges") else {
        return 0;
    };
    let num_chans = data.len();
    let left = find_edge(view, &data, &valid, limit);
    let reversed: Vec<f64> = data.iter().rev().copied().collect();
    let reversed_valid: Vec<bool> = valid.iter().rev().copied().collect();
    let right = find_edge(view, &reversed, &reversed_valid, limit);
    trace!("'{}': edges at {left} and {right} from the end", view.key());

    flag_channels(view, buffer, FlagReason::Edges, |i| {
        i < left || i + right >= num_chans
    })
}

/// The index of the first valid channel in the first quarter of `data` whose
/// difference to the next valid channel is below `limit` times the median
/// difference. If there isn't one, 1, so that at least the outermost channel
/// is flagged.
fn find_edge(view: &View, data: &[f64], valid: &[bool], limit: f64) -> usize {
    let good: Vec<usize> = (0..data.len() / 4).filter(|&i| valid[i]).collect();
    let diffs: Vec<f64> = good
        .windows(2)
        .map(|w| (data[w[1]] - data[w[0]]).abs())
        .collect();
    let edge = median_in_place(&mut diffs.clone()).and_then(|median_diff| {
        diffs
            .iter()
            .position(|&d| d < limit * median_diff)
            .map(|i| good[i])
    });
    edge.unwrap_or_else(|| {
        warn!("Couldn't find the edge of '{}'", view.key());
        1
    })
}

fn sharps(view: &View, buffer: &mut FlagBuffer, limit: f64) -> usize {
    let Some((data, valid)) = channels(view, buffer, "sharps") else {
        return 0;
    };
    let diffs: Vec<f64> = data.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let diff_valid: Vec<bool> = valid.windows(2).map(|w| w[0] && w[1]).collect();
    let mut sharp: Vec<bool> = diffs
        .iter()
        .zip(&diff_valid)
        .map(|(&d, &ok)| ok && d > limit)
        .collect();

    // Broaden each sharp feature to the run of differences around it that are
    // above twice the median difference.
    let mut quiet: Vec<f64> = diffs
        .iter()
        .zip(diff_valid.iter().zip(&sharp))
        .filter(|(_, (&ok, &s))| ok && !s)
        .map(|(&d, _)| d)
        .collect();
    let wide: Vec<bool> = match median_in_place(&mut quiet) {
        Some(median_diff) => diffs
            .iter()
            .zip(&diff_valid)
            .map(|(&d, &ok)| ok && d > 2.0 * median_diff)
            .collect(),
        None => sharp.clone(),
    };
    let runs = (0..wide.len()).group_by(|&i| wide[i]);
    for (is_wide, run) in &runs {
        let run: Vec<usize> = run.collect();
        if is_wide && run.iter().any(|&i| sharp[i]) {
            for i in run {
                sharp[i] = true;
            }
        }
    }

    flag_channels(view, buffer, FlagReason::Sharps, |i| {
        channels_of_diffs(&sharp, i)
    })
}

fn diffmad(view: &View, buffer: &mut FlagBuffer, limit: f64, nchan_limit: usize) -> usize {
    let Some((data, valid)) = channels(view, buffer, "diffmad") else {
        return 0;
    };
    let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let diff_valid: Vec<bool> = valid.windows(2).map(|w| w[0] && w[1]).collect();
    let valid_diffs: Vec<f64> = diffs
        .iter()
        .zip(&diff_valid)
        .filter(|(_, &ok)| ok)
        .map(|(&d, _)| d)
        .collect();
    let Some((median, mad)) = median_and_mad(&valid_diffs) else {
        return 0;
    };

    let mut outlying: Vec<bool> = diffs
        .iter()
        .zip(&diff_valid)
        .map(|(&d, &ok)| ok && (d - median).abs() > limit * mad)
        .collect();
    let num_outlying = outlying.iter().filter(|&&o| o).count();
    if num_outlying >= nchan_limit {
        debug!(
            "'{}': {num_outlying} outlying channel differences; flagging every channel",
            view.key()
        );
        outlying.iter_mut().for_each(|o| *o = true);
    }

    flag_channels(view, buffer, FlagReason::DiffMad, |i| {
        channels_of_diffs(&outlying, i)
    })
}

fn too_many_flagged_channels(
    view: &View,
    buffer: &mut FlagBuffer,
    frac_limit: f64,
    nchan_limit: usize,
) -> usize {
    let (num_flagged, num_with_data) = buffer
        .flag
        .iter()
        .zip(view.nodata().iter())
        .filter(|(_, &n)| !n)
        .fold((0, 0), |(flagged, total), (&f, _)| {
            (flagged + usize::from(f), total + 1)
        });
    if num_with_data == 0 {
        return 0;
    }

    if num_flagged as f64 / num_with_data as f64 >= frac_limit || num_flagged >= nchan_limit {
        let cells = view
            .data()
            .indexed_iter()
            .filter(|(index, _)| buffer.is_open(view, index.slice()))
            .map(|(index, _)| index.slice().to_vec())
            .collect();
        buffer.flag_cells(view, FlagReason::TooManyFlaggedChannels, cells)
    } else {
        0
    }
}
