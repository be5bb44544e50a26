// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All default flagging-rule parameters live here.

use std::num::NonZeroUsize;

/// The default number of produce/evaluate/apply cycles the flagger performs.
pub const DEFAULT_NITER: NonZeroUsize = NonZeroUsize::MIN;

/// Default "outlier" threshold, in units of the MAD.
pub const DEFAULT_FHL_LIMIT: f64 = 5.0;
/// Default minimum number of valid samples before "outlier" is evaluated.
pub const DEFAULT_FHL_MINSAMPLE: usize = 5;

/// Default "high outlier" threshold, in units of the MAD.
pub const DEFAULT_FHI_LIMIT: f64 = 5.0;
pub const DEFAULT_FHI_MINSAMPLE: usize = 5;

/// Default "low outlier" threshold, in units of the MAD.
pub const DEFAULT_FLO_LIMIT: f64 = 5.0;
pub const DEFAULT_FLO_MINSAMPLE: usize = 5;

/// Default axis for the first "too many flags" rule.
pub const DEFAULT_TMF1_AXIS: &str = "Time";
/// Default flagged fraction above which a slice is entirely flagged. A value
/// of 1 means the rule can never trigger on the fraction alone.
pub const DEFAULT_TMF1_LIMIT: f64 = 1.0;

pub const DEFAULT_TMF2_AXIS: &str = "Time";
pub const DEFAULT_TMF2_LIMIT: f64 = 1.0;

/// Default axis for the "too many entirely flagged" rule.
pub const DEFAULT_TMEF1_AXIS: &str = "Antenna1";
pub const DEFAULT_TMEF1_LIMIT: f64 = 1.0;

/// Default lower "nmedian" limit, as a multiple of the median.
pub const DEFAULT_FNM_LO_LIMIT: f64 = 0.7;
/// Default upper "nmedian" limit, as a multiple of the median.
pub const DEFAULT_FNM_HI_LIMIT: f64 = 1.3;

/// Default "max abs" limit.
pub const DEFAULT_FMAX_LIMIT: f64 = 0.1;
/// Default "min abs" limit.
pub const DEFAULT_FMIN_LIMIT: f64 = 0.0;

/// Default "bad antenna" low-outlier threshold, in units of the MAD.
pub const DEFAULT_FBA_LO_LIMIT: f64 = 7.0;
pub const DEFAULT_FBA_FRAC_LIMIT: f64 = 0.05;
pub const DEFAULT_FBA_NUMBER_LIMIT: usize = 3;
pub const DEFAULT_FBA_MINSAMPLE: usize = 5;

/// Default "bad quadrant" outlier threshold, in units of the MAD.
pub const DEFAULT_FBQ_HILO_LIMIT: f64 = 7.0;
/// An antenna's quadrant is bad if more than this fraction of its cells are
/// outliers.
pub const DEFAULT_FBQ_ANTENNA_FRAC_LIMIT: f64 = 0.5;
/// A baseline's quadrant is bad if more than this fraction of its cells are
/// outliers.
pub const DEFAULT_FBQ_BASELINE_FRAC_LIMIT: f64 = 0.5;

/// Default "edges" threshold, as a multiple of the median channel-to-channel
/// difference.
pub const DEFAULT_EDGE_LIMIT: f64 = 2.0;

/// Default "sharps" threshold on the absolute channel-to-channel difference.
pub const DEFAULT_SHARPS_LIMIT: f64 = 0.05;

/// Default "diffmad" threshold, in units of the MAD of channel-to-channel
/// differences.
pub const DEFAULT_DIFFMAD_LIMIT: f64 = 10.0;
/// If "diffmad" finds at least this many outlying differences, every channel
/// is flagged.
pub const DEFAULT_DIFFMAD_NCHAN_LIMIT: usize = 4;

pub const DEFAULT_TMF_FRAC_LIMIT: f64 = 0.1;
pub const DEFAULT_TMF_NCHAN_LIMIT: usize = 4;
