// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn test_median_odd_and_even() {
    let mut odd = [5.0, 1.0, 3.0];
    assert_abs_diff_eq!(median_in_place(&mut odd).unwrap(), 3.0);

    let mut even = [4.0, 1.0, 3.0, 2.0];
    assert_abs_diff_eq!(median_in_place(&mut even).unwrap(), 2.5);

    let mut empty: [f64; 0] = [];
    assert!(median_in_place(&mut empty).is_none());
}

#[test]
fn test_median_and_mad() {
    let (median, mad) = median_and_mad(&[1.0, 1.0, 1.0, 1.0, 100.0]).unwrap();
    assert_abs_diff_eq!(median, 1.0);
    assert_abs_diff_eq!(mad, 0.0);

    // Deviations from 3 are [2, 1, 0, 1, 7]; their median is 1.
    let (median, mad) = median_and_mad(&[1.0, 2.0, 3.0, 4.0, 10.0]).unwrap();
    assert_abs_diff_eq!(median, 3.0);
    assert_abs_diff_eq!(mad, 1.0);

    assert!(median_and_mad(&[]).is_none());
}

#[test]
fn test_median_of_counts() {
    assert_abs_diff_eq!(median_of_counts(&[0, 4, 1]).unwrap(), 1.0);
    assert_abs_diff_eq!(median_of_counts(&[0, 4, 1, 3]).unwrap(), 2.0);
    assert!(median_of_counts(&[]).is_none());
}
