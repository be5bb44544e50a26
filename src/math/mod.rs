// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper statistics.

#[cfg(test)]
mod tests;

/// The median of the supplied values. The slice is sorted in place. For an
/// even number of values, the mean of the two middle values is returned.
/// Returns `None` if there are no values.
///
/// Values should be finite; non-finite values are sorted with
/// [`f64::total_cmp`] and so are not rejected here.
pub(crate) fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// The median and median absolute deviation (MAD) of the supplied values.
/// Returns `None` if there are no values.
///
/// The MAD is *not* scaled to be a consistent estimator of the standard
/// deviation; it is simply `median(|x - median(x)|)`.
pub(crate) fn median_and_mad(values: &[f64]) -> Option<(f64, f64)> {
    let mut sorted = values.to_vec();
    let median = median_in_place(&mut sorted)?;
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    let mad = median_in_place(&mut deviations)?;
    Some((median, mad))
}

/// The median of some counts.
pub(crate) fn median_of_counts(counts: &[usize]) -> Option<f64> {
    let mut values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    median_in_place(&mut values)
}
