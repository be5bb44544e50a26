// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A flat, toggle-and-limit configuration surface for building rule sets.

use clap::Parser;
use serde::{Deserialize, Serialize};

use super::{Rule, RuleSet};
use crate::{constants::*, flagging::RuleSetError};

lazy_static::lazy_static! {
    static ref FBQ_HILO_LIMIT_HELP: String =
        format!("The 'bad quadrant' outlier threshold, in units of the MAD. Default: {DEFAULT_FBQ_HILO_LIMIT}");

    static ref FBQ_ANTENNA_FRAC_LIMIT_HELP: String =
        format!("An antenna's quadrant is bad if more than this fraction of its cells are outliers. Default: {DEFAULT_FBQ_ANTENNA_FRAC_LIMIT}");

    static ref FBQ_BASELINE_FRAC_LIMIT_HELP: String =
        format!("A baseline's quadrant is bad if more than this fraction of its cells are outliers. Default: {DEFAULT_FBQ_BASELINE_FRAC_LIMIT}");

    static ref FBA_LO_LIMIT_HELP: String =
        format!("The 'bad antenna' low-outlier threshold, in units of the MAD. Default: {DEFAULT_FBA_LO_LIMIT}");

    static ref FBA_FRAC_LIMIT_HELP: String =
        format!("An antenna is bad if more than this fraction of its cells are low outliers. Default: {DEFAULT_FBA_FRAC_LIMIT}");

    static ref FBA_NUMBER_LIMIT_HELP: String =
        format!("An antenna is bad if it has at least this many low outliers. Default: {DEFAULT_FBA_NUMBER_LIMIT}");

    static ref FBA_MINSAMPLE_HELP: String =
        format!("Antennas with fewer valid cells than this are not tested. Default: {DEFAULT_FBA_MINSAMPLE}");

    static ref FMAX_LIMIT_HELP: String =
        format!("Flag cells whose absolute value is above this. Default: {DEFAULT_FMAX_LIMIT}");

    static ref FMIN_LIMIT_HELP: String =
        format!("Flag cells whose absolute value is below this. Default: {DEFAULT_FMIN_LIMIT}");

    static ref FNM_LO_LIMIT_HELP: String =
        format!("Flag cells below this multiple of the median. Default: {DEFAULT_FNM_LO_LIMIT}");

    static ref FNM_HI_LIMIT_HELP: String =
        format!("Flag cells above this multiple of the median. Default: {DEFAULT_FNM_HI_LIMIT}");

    static ref EDGE_LIMIT_HELP: String =
        format!("Edges end where the channel-to-channel difference falls below this multiple of the median difference. Default: {DEFAULT_EDGE_LIMIT}");

    static ref SHARPS_LIMIT_HELP: String =
        format!("Flag channel-to-channel differences above this. Default: {DEFAULT_SHARPS_LIMIT}");

    static ref DIFFMAD_LIMIT_HELP: String =
        format!("The 'diffmad' threshold, in units of the MAD of channel-to-channel differences. Default: {DEFAULT_DIFFMAD_LIMIT}");

    static ref DIFFMAD_NCHAN_LIMIT_HELP: String =
        format!("Flag every channel if 'diffmad' finds at least this many outlying differences. Default: {DEFAULT_DIFFMAD_NCHAN_LIMIT}");

    static ref TMF_FRAC_LIMIT_HELP: String =
        format!("Flag every channel if at least this fraction is flagged. Default: {DEFAULT_TMF_FRAC_LIMIT}");

    static ref TMF_NCHAN_LIMIT_HELP: String =
        format!("Flag every channel if at least this many are flagged. Default: {DEFAULT_TMF_NCHAN_LIMIT}");

    static ref FHL_LIMIT_HELP: String =
        format!("The 'outlier' threshold, in units of the MAD. Default: {DEFAULT_FHL_LIMIT}");

    static ref FHI_LIMIT_HELP: String =
        format!("The 'high outlier' threshold, in units of the MAD. Default: {DEFAULT_FHI_LIMIT}");

    static ref FLO_LIMIT_HELP: String =
        format!("The 'low outlier' threshold, in units of the MAD. Default: {DEFAULT_FLO_LIMIT}");

    static ref MINSAMPLE_HELP: String =
        format!("Don't evaluate the rule if there are fewer valid cells than this. Default: {DEFAULT_FHL_MINSAMPLE}");

    static ref TMF_AXIS_HELP: String =
        format!("The axis along which flags are counted. Default: {DEFAULT_TMF1_AXIS}");

    static ref TMF_LIMIT_HELP: String =
        format!("Flag the rest of a slice if more than this fraction of it is flagged. Default: {DEFAULT_TMF1_LIMIT}");

    static ref TMEF1_AXIS_HELP: String =
        format!("The axis whose entirely-flagged coordinates are counted. Default: {DEFAULT_TMEF1_AXIS}");

    static ref TMEF1_LIMIT_HELP: String =
        format!("Flag everything if more than this fraction of coordinates are entirely flagged. Default: {DEFAULT_TMEF1_LIMIT}");
}

/// Toggles and limits for every rule. The rule set built from these is always
/// in the same order, regardless of the order the toggles were given in.
#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagRuleArgs {
    /// Look for quadrants of channel-by-baseline matrices with many outliers,
    /// and flag them.
    #[clap(long, help_heading = "BAD QUADRANT")]
    #[serde(default)]
    pub flag_bad_quadrant: bool,

    #[clap(long, help = FBQ_HILO_LIMIT_HELP.as_str(), help_heading = "BAD QUADRANT")]
    pub fbq_hilo_limit: Option<f64>,

    #[clap(long, help = FBQ_ANTENNA_FRAC_LIMIT_HELP.as_str(), help_heading = "BAD QUADRANT")]
    pub fbq_antenna_frac_limit: Option<f64>,

    #[clap(long, help = FBQ_BASELINE_FRAC_LIMIT_HELP.as_str(), help_heading = "BAD QUADRANT")]
    pub fbq_baseline_frac_limit: Option<f64>,

    /// Look for antennas with many low outliers, and flag them entirely.
    #[clap(long, help_heading = "BAD ANTENNA")]
    #[serde(default)]
    pub flag_bad_antenna: bool,

    #[clap(long, help = FBA_LO_LIMIT_HELP.as_str(), help_heading = "BAD ANTENNA")]
    pub fba_lo_limit: Option<f64>,

    #[clap(long, help = FBA_FRAC_LIMIT_HELP.as_str(), help_heading = "BAD ANTENNA")]
    pub fba_frac_limit: Option<f64>,

    #[clap(long, help = FBA_NUMBER_LIMIT_HELP.as_str(), help_heading = "BAD ANTENNA")]
    pub fba_number_limit: Option<usize>,

    #[clap(long, help = FBA_MINSAMPLE_HELP.as_str(), help_heading = "BAD ANTENNA")]
    pub fba_minsample: Option<usize>,

    /// Flag the noisy edge channels of spectra.
    #[clap(long, help_heading = "SPECTRA")]
    #[serde(default)]
    pub flag_edges: bool,

    #[clap(long, help = EDGE_LIMIT_HELP.as_str(), help_heading = "SPECTRA")]
    pub edge_limit: Option<f64>,

    /// Flag sharp features in spectra.
    #[clap(long, help_heading = "SPECTRA")]
    #[serde(default)]
    pub flag_sharps: bool,

    #[clap(long, help = SHARPS_LIMIT_HELP.as_str(), help_heading = "SPECTRA")]
    pub sharps_limit: Option<f64>,

    /// Flag outlying channel-to-channel differences in spectra.
    #[clap(long, help_heading = "SPECTRA")]
    #[serde(default)]
    pub flag_diffmad: bool,

    #[clap(long, help = DIFFMAD_LIMIT_HELP.as_str(), help_heading = "SPECTRA")]
    pub diffmad_limit: Option<f64>,

    #[clap(long, help = DIFFMAD_NCHAN_LIMIT_HELP.as_str(), help_heading = "SPECTRA")]
    pub diffmad_nchan_limit: Option<usize>,

    /// Flag every channel of spectra that are already heavily flagged.
    #[clap(long, help_heading = "SPECTRA")]
    #[serde(default)]
    pub flag_tmf: bool,

    #[clap(long, help = TMF_FRAC_LIMIT_HELP.as_str(), help_heading = "SPECTRA")]
    pub tmf_frac_limit: Option<f64>,

    #[clap(long, help = TMF_NCHAN_LIMIT_HELP.as_str(), help_heading = "SPECTRA")]
    pub tmf_nchan_limit: Option<usize>,

    /// Flag cells with large absolute values.
    #[clap(long, help_heading = "ABSOLUTE LIMITS")]
    #[serde(default)]
    pub flag_maxabs: bool,

    #[clap(long, help = FMAX_LIMIT_HELP.as_str(), help_heading = "ABSOLUTE LIMITS")]
    pub fmax_limit: Option<f64>,

    /// Flag cells with small absolute values.
    #[clap(long, help_heading = "ABSOLUTE LIMITS")]
    #[serde(default)]
    pub flag_minabs: bool,

    #[clap(long, help = FMIN_LIMIT_HELP.as_str(), help_heading = "ABSOLUTE LIMITS")]
    pub fmin_limit: Option<f64>,

    /// Flag cells far from the median, as multiples of the median.
    #[clap(long, help_heading = "NMEDIAN")]
    #[serde(default)]
    pub flag_nmedian: bool,

    #[clap(long, help = FNM_LO_LIMIT_HELP.as_str(), help_heading = "NMEDIAN")]
    pub fnm_lo_limit: Option<f64>,

    #[clap(long, help = FNM_HI_LIMIT_HELP.as_str(), help_heading = "NMEDIAN")]
    pub fnm_hi_limit: Option<f64>,

    /// Flag outliers on both sides of the median.
    #[clap(long, help_heading = "OUTLIERS")]
    #[serde(default)]
    pub flag_hilo: bool,

    #[clap(long, help = FHL_LIMIT_HELP.as_str(), help_heading = "OUTLIERS")]
    pub fhl_limit: Option<f64>,

    #[clap(long, help = MINSAMPLE_HELP.as_str(), help_heading = "OUTLIERS")]
    pub fhl_minsample: Option<usize>,

    /// Flag outliers above the median.
    #[clap(long, help_heading = "OUTLIERS")]
    #[serde(default)]
    pub flag_hi: bool,

    #[clap(long, help = FHI_LIMIT_HELP.as_str(), help_heading = "OUTLIERS")]
    pub fhi_limit: Option<f64>,

    #[clap(long, help = MINSAMPLE_HELP.as_str(), help_heading = "OUTLIERS")]
    pub fhi_minsample: Option<usize>,

    /// Flag outliers below the median.
    #[clap(long, help_heading = "OUTLIERS")]
    #[serde(default)]
    pub flag_lo: bool,

    #[clap(long, help = FLO_LIMIT_HELP.as_str(), help_heading = "OUTLIERS")]
    pub flo_limit: Option<f64>,

    #[clap(long, help = MINSAMPLE_HELP.as_str(), help_heading = "OUTLIERS")]
    pub flo_minsample: Option<usize>,

    /// Flag the rest of slices that are already heavily flagged.
    #[clap(long, help_heading = "TOO MANY FLAGS")]
    #[serde(default)]
    pub flag_tmf1: bool,

    #[clap(long, help = TMF_AXIS_HELP.as_str(), help_heading = "TOO MANY FLAGS")]
    pub tmf1_axis: Option<String>,

    #[clap(long, help = TMF_LIMIT_HELP.as_str(), help_heading = "TOO MANY FLAGS")]
    pub tmf1_limit: Option<f64>,

    /// Flag the rest of a slice if it has this many more flags than the median
    /// slice. Not used by default.
    #[clap(long, help_heading = "TOO MANY FLAGS")]
    pub tmf1_excess_limit: Option<usize>,

    /// A second "too many flags" rule, evaluated after the first.
    #[clap(long, help_heading = "TOO MANY FLAGS")]
    #[serde(default)]
    pub flag_tmf2: bool,

    #[clap(long, help = TMF_AXIS_HELP.as_str(), help_heading = "TOO MANY FLAGS")]
    pub tmf2_axis: Option<String>,

    #[clap(long, help = TMF_LIMIT_HELP.as_str(), help_heading = "TOO MANY FLAGS")]
    pub tmf2_limit: Option<f64>,

    #[clap(long, help_heading = "TOO MANY FLAGS")]
    pub tmf2_excess_limit: Option<usize>,

    /// Flag everything if too many coordinates on an axis are entirely
    /// flagged.
    #[clap(long, help_heading = "TOO MANY FLAGS")]
    #[serde(default)]
    pub flag_tmef1: bool,

    #[clap(long, help = TMEF1_AXIS_HELP.as_str(), help_heading = "TOO MANY FLAGS")]
    pub tmef1_axis: Option<String>,

    #[clap(long, help = TMEF1_LIMIT_HELP.as_str(), help_heading = "TOO MANY FLAGS")]
    pub tmef1_limit: Option<f64>,
}

impl FlagRuleArgs {
    /// Merge two sets of arguments, preferring `self`.
    pub fn merge(self, other: Self) -> Self {
        Self {
            flag_bad_quadrant: self.flag_bad_quadrant || other.flag_bad_quadrant,
            fbq_hilo_limit: self.fbq_hilo_limit.or(other.fbq_hilo_limit),
            fbq_antenna_frac_limit: self.fbq_antenna_frac_limit.or(other.fbq_antenna_frac_limit),
            fbq_baseline_frac_limit: self
                .fbq_baseline_frac_limit
                .or(other.fbq_baseline_frac_limit),
            flag_bad_antenna: self.flag_bad_antenna || other.flag_bad_antenna,
            fba_lo_limit: self.fba_lo_limit.or(other.fba_lo_limit),
            fba_frac_limit: self.fba_frac_limit.or(other.fba_frac_limit),
            fba_number_limit: self.fba_number_limit.or(other.fba_number_limit),
            fba_minsample: self.fba_minsample.or(other.fba_minsample),
            flag_edges: self.flag_edges || other.flag_edges,
            edge_limit: self.edge_limit.or(other.edge_limit),
            flag_sharps: self.flag_sharps || other.flag_sharps,
            sharps_limit: self.sharps_limit.or(other.sharps_limit),
            flag_diffmad: self.flag_diffmad || other.flag_diffmad,
            diffmad_limit: self.diffmad_limit.or(other.diffmad_limit),
            diffmad_nchan_limit: self.diffmad_nchan_limit.or(other.diffmad_nchan_limit),
            flag_tmf: self.flag_tmf || other.flag_tmf,
            tmf_frac_limit: self.tmf_frac_limit.or(other.tmf_frac_limit),
            tmf_nchan_limit: self.tmf_nchan_limit.or(other.tmf_nchan_limit),
            flag_maxabs: self.flag_maxabs || other.flag_maxabs,
            fmax_limit: self.fmax_limit.or(other.fmax_limit),
            flag_minabs: self.flag_minabs || other.flag_minabs,
            fmin_limit: self.fmin_limit.or(other.fmin_limit),
            flag_nmedian: self.flag_nmedian || other.flag_nmedian,
            fnm_lo_limit: self.fnm_lo_limit.or(other.fnm_lo_limit),
            fnm_hi_limit: self.fnm_hi_limit.or(other.fnm_hi_limit),
            flag_hilo: self.flag_hilo || other.flag_hilo,
            fhl_limit: self.fhl_limit.or(other.fhl_limit),
            fhl_minsample: self.fhl_minsample.or(other.fhl_minsample),
            flag_hi: self.flag_hi || other.flag_hi,
            fhi_limit: self.fhi_limit.or(other.fhi_limit),
            fhi_minsample: self.fhi_minsample.or(other.fhi_minsample),
            flag_lo: self.flag_lo || other.flag_lo,
            flo_limit: self.flo_limit.or(other.flo_limit),
            flo_minsample: self.flo_minsample.or(other.flo_minsample),
            flag_tmf1: self.flag_tmf1 || other.flag_tmf1,
            tmf1_axis: self.tmf1_axis.or(other.tmf1_axis),
            tmf1_limit: self.tmf1_limit.or(other.tmf1_limit),
            tmf1_excess_limit: self.tmf1_excess_limit.or(other.tmf1_excess_limit),
            flag_tmf2: self.flag_tmf2 || other.flag_tmf2,
            tmf2_axis: self.tmf2_axis.or(other.tmf2_axis),
            tmf2_limit: self.tmf2_limit.or(other.tmf2_limit),
            tmf2_excess_limit: self.tmf2_excess_limit.or(other.tmf2_excess_limit),
            flag_tmef1: self.flag_tmef1 || other.flag_tmef1,
            tmef1_axis: self.tmef1_axis.or(other.tmef1_axis),
            tmef1_limit: self.tmef1_limit.or(other.tmef1_limit),
        }
    }

    /// Build the rule set described by these toggles. Enabled rules appear in
    /// a fixed order: bad quadrant, bad antenna, edges, max abs, min abs,
    /// nmedian, outlier, high outlier, low outlier, sharps, diffmad, tmf, the
    /// two "too many flags" rules and finally "too many entirely flagged".
    /// Limits that weren't specified take their defaults from
    /// [`crate::constants`].
    pub fn make_flag_rules(&self) -> Result<RuleSet, RuleSetError> {
        let mut rules = RuleSet::new();

        if self.flag_bad_quadrant {
            rules.push(Rule::BadQuadrant {
                hilo_limit: self.fbq_hilo_limit.unwrap_or(DEFAULT_FBQ_HILO_LIMIT),
                frac_limit: self
                    .fbq_antenna_frac_limit
                    .unwrap_or(DEFAULT_FBQ_ANTENNA_FRAC_LIMIT),
                baseline_frac_limit: self
                    .fbq_baseline_frac_limit
                    .unwrap_or(DEFAULT_FBQ_BASELINE_FRAC_LIMIT),
            });
        }
        if self.flag_bad_antenna {
            rules.push(Rule::BadAntenna {
                lo_limit: self.fba_lo_limit.unwrap_or(DEFAULT_FBA_LO_LIMIT),
                frac_limit: self.fba_frac_limit.unwrap_or(DEFAULT_FBA_FRAC_LIMIT),
                number_limit: self.fba_number_limit.unwrap_or(DEFAULT_FBA_NUMBER_LIMIT),
                minsample: self.fba_minsample.unwrap_or(DEFAULT_FBA_MINSAMPLE),
            });
        }
        if self.flag_edges {
            rules.push(Rule::Edges {
                limit: self.edge_limit.unwrap_or(DEFAULT_EDGE_LIMIT),
            });
        }
        if self.flag_maxabs {
            rules.push(Rule::MaxAbs {
                limit: self.fmax_limit.unwrap_or(DEFAULT_FMAX_LIMIT),
            });
        }
        if self.flag_minabs {
            rules.push(Rule::MinAbs {
                limit: self.fmin_limit.unwrap_or(DEFAULT_FMIN_LIMIT),
            });
        }
        if self.flag_nmedian {
            rules.push(Rule::NMedian {
                hi_limit: self.fnm_hi_limit.unwrap_or(DEFAULT_FNM_HI_LIMIT),
                lo_limit: Some(self.fnm_lo_limit.unwrap_or(DEFAULT_FNM_LO_LIMIT)),
            });
        }
        if self.flag_hilo {
            rules.push(Rule::Outlier {
                limit: self.fhl_limit.unwrap_or(DEFAULT_FHL_LIMIT),
                minsample: self.fhl_minsample.unwrap_or(DEFAULT_FHL_MINSAMPLE),
            });
        }
        if self.flag_hi {
            rules.push(Rule::HighOutlier {
                limit: self.fhi_limit.unwrap_or(DEFAULT_FHI_LIMIT),
                minsample: self.fhi_minsample.unwrap_or(DEFAULT_FHI_MINSAMPLE),
            });
        }
        if self.flag_lo {
            rules.push(Rule::LowOutlier {
                limit: self.flo_limit.unwrap_or(DEFAULT_FLO_LIMIT),
                minsample: self.flo_minsample.unwrap_or(DEFAULT_FLO_MINSAMPLE),
            });
        }
        if self.flag_sharps {
            rules.push(Rule::Sharps {
                limit: self.sharps_limit.unwrap_or(DEFAULT_SHARPS_LIMIT),
            });
        }
        if self.flag_diffmad {
            rules.push(Rule::DiffMad {
                limit: self.diffmad_limit.unwrap_or(DEFAULT_DIFFMAD_LIMIT),
                nchan_limit: self.diffmad_nchan_limit.unwrap_or(DEFAULT_DIFFMAD_NCHAN_LIMIT),
            });
        }
        if self.flag_tmf {
            rules.push(Rule::TooManyFlaggedChannels {
                frac_limit: self.tmf_frac_limit.unwrap_or(DEFAULT_TMF_FRAC_LIMIT),
                nchan_limit: self.tmf_nchan_limit.unwrap_or(DEFAULT_TMF_NCHAN_LIMIT),
            });
        }
        if self.flag_tmf1 {
            rules.push(Rule::TooManyFlags {
                axis: self
                    .tmf1_axis
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TMF1_AXIS.to_string()),
                limit: self.tmf1_limit.unwrap_or(DEFAULT_TMF1_LIMIT),
                excess_limit: self.tmf1_excess_limit,
            });
        }
        if self.flag_tmf2 {
            rules.push(Rule::TooManyFlags {
                axis: self
                    .tmf2_axis
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TMF2_AXIS.to_string()),
                limit: self.tmf2_limit.unwrap_or(DEFAULT_TMF2_LIMIT),
                excess_limit: self.tmf2_excess_limit,
            });
        }
        if self.flag_tmef1 {
            rules.push(Rule::TooManyEntirelyFlagged {
                axis: self
                    .tmef1_axis
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TMEF1_AXIS.to_string()),
                limit: self.tmef1_limit.unwrap_or(DEFAULT_TMEF1_LIMIT),
            });
        }

        rules.validate()?;
        Ok(rules)
    }
}
