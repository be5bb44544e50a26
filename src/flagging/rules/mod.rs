// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flagging rules and ordered rule sets.
//!
//! The order of rules in a [`RuleSet`] matters: each rule sees the flags
//! raised by the rules before it. e.g. a "too many flags" rule placed after an
//! "outlier" rule can fully flag a row that the outlier rule only partially
//! flagged.

mod args;

pub use args::FlagRuleArgs;

use serde::{Deserialize, Serialize};

use super::{FlagReason, RuleSetError};

/// A single flagging rule. Each variant carries only its own parameters.
/// "Limits" on outlier rules are in units of the median absolute deviation
/// (MAD) of the view's valid data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Rule {
    /// Flag cells with `|value - median| > limit * MAD`, if there are at least
    /// `minsample` valid cells.
    #[serde(rename = "outlier")]
    Outlier { limit: f64, minsample: usize },

    /// Flag cells with `value - median > limit * MAD`.
    #[serde(rename = "high outlier", alias = "high_outlier")]
    HighOutlier { limit: f64, minsample: usize },

    /// Flag cells with `median - value > limit * MAD`.
    #[serde(rename = "low outlier", alias = "low_outlier")]
    LowOutlier { limit: f64, minsample: usize },

    /// Flag cells with `|value| < limit`.
    #[serde(rename = "min abs", alias = "min_abs")]
    MinAbs { limit: f64 },

    /// Flag cells with `|value| > limit`.
    #[serde(rename = "max abs", alias = "max_abs")]
    MaxAbs { limit: f64 },

    /// Flag cells with `value > hi_limit * median` and, if `lo_limit` is
    /// given, `value < lo_limit * median`.
    #[serde(rename = "nmedian")]
    NMedian {
        hi_limit: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lo_limit: Option<f64>,
    },

    /// For every slice of the view running along `axis`, flag the rest of the
    /// slice if the fraction of flagged cells exceeds `limit`, or if the
    /// number of flagged cells exceeds the median over all slices by more than
    /// `excess_limit`.
    #[serde(rename = "too many flags", alias = "too_many_flags")]
    TooManyFlags {
        axis: String,
        limit: f64,
        #[serde(
            default,
            alias = "excess limit",
            skip_serializing_if = "Option::is_none"
        )]
        excess_limit: Option<usize>,
    },

    /// If the fraction of coordinates on `axis` whose cells are all flagged
    /// exceeds `limit`, flag everything.
    #[serde(
        rename = "too many entirely flagged",
        alias = "too_many_entirely_flagged"
    )]
    TooManyEntirelyFlagged { axis: String, limit: f64 },

    /// For each antenna (the first axis of a matrix view), look for low
    /// outliers (`median - value > lo_limit * MAD`); if there are at least
    /// `number_limit` of them or they make up more than `frac_limit` of the
    /// antenna's cells, flag the whole antenna.
    #[serde(rename = "bad antenna", alias = "bad_antenna")]
    BadAntenna {
        lo_limit: f64,
        frac_limit: f64,
        number_limit: usize,
        minsample: usize,
    },

    /// For a channel-by-baseline matrix whose baselines are all pairs of
    /// `n` antennas (`n * n` baselines, baseline `b` pairing antennas
    /// `b / n` and `b % n`), find outliers with
    /// `|value - median| > hilo_limit * MAD` and look at each quarter of the
    /// channels ("quadrant") separately.
    /// If outliers make up more than `frac_limit` of an antenna's valid cells
    /// in a quadrant, the antenna's quadrant is flagged; otherwise each of the
    /// antenna's baselines is flagged in that quadrant if more than
    /// `baseline_frac_limit` of its valid cells are outliers. Outliers outside
    /// bad quadrants aren't flagged.
    #[serde(rename = "bad quadrant", alias = "bad_quadrant")]
    BadQuadrant {
        hilo_limit: f64,
        frac_limit: f64,
        baseline_frac_limit: f64,
    },

    /// Flag the edge channels of a vector view. Within each outer quarter of
    /// the channels, the edge is the first valid channel (walking inwards)
    /// whose difference to the next valid channel is below `limit` times the
    /// median difference; everything outside it is flagged.
    #[serde(rename = "edges")]
    Edges { limit: f64 },

    /// Flag both channels of every difference between valid neighbouring
    /// channels above `limit`, broadened to the surrounding run of
    /// differences above twice the median difference.
    #[serde(rename = "sharps")]
    Sharps { limit: f64 },

    /// Flag both channels of every channel-to-channel difference further
    /// than `limit` MADs from the median difference. If there are at least
    /// `nchan_limit` such differences, flag every channel.
    #[serde(rename = "diffmad")]
    DiffMad { limit: f64, nchan_limit: usize },

    /// Flag every cell if at least `frac_limit` of the cells are flagged, or
    /// at least `nchan_limit` of them.
    #[serde(rename = "tmf")]
    TooManyFlaggedChannels { frac_limit: f64, nchan_limit: usize },
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Outlier { .. } => "outlier",
            Rule::HighOutlier { .. } => "high outlier",
            Rule::LowOutlier { .. } => "low outlier",
            Rule::MinAbs { .. } => "min abs",
            Rule::MaxAbs { .. } => "max abs",
            Rule::NMedian { .. } => "nmedian",
            Rule::TooManyFlags { .. } => "too many flags",
            Rule::TooManyEntirelyFlagged { .. } => "too many entirely flagged",
            Rule::BadAntenna { .. } => "bad antenna",
            Rule::BadQuadrant { .. } => "bad quadrant",
            Rule::Edges { .. } => "edges",
            Rule::Sharps { .. } => "sharps",
            Rule::DiffMad { .. } => "diffmad",
            Rule::TooManyFlaggedChannels { .. } => "tmf",
        }
    }

    /// The reason attached to cells flagged by this rule. ("bad antenna" also
    /// flags cells as low outliers, and "bad quadrant" as outliers.)
    pub fn reason(&self) -> FlagReason {
        match self {
            Rule::Outlier { .. } => FlagReason::Outlier,
            Rule::HighOutlier { .. } => FlagReason::HighOutlier,
            Rule::LowOutlier { .. } => FlagReason::LowOutlier,
            Rule::MinAbs { .. } => FlagReason::MinAbs,
            Rule::MaxAbs { .. } => FlagReason::MaxAbs,
            Rule::NMedian { .. } => FlagReason::NMedian,
            Rule::TooManyFlags { .. } => FlagReason::TooManyFlags,
            Rule::TooManyEntirelyFlagged { .. } => FlagReason::TooManyEntirelyFlagged,
            Rule::BadAntenna { .. } => FlagReason::BadAntenna,
            Rule::BadQuadrant { .. } => FlagReason::BadQuadrant,
            Rule::Edges { .. } => FlagReason::Edges,
            Rule::Sharps { .. } => FlagReason::Sharps,
            Rule::DiffMad { .. } => FlagReason::DiffMad,
            Rule::TooManyFlaggedChannels { .. } => FlagReason::TooManyFlaggedChannels,
        }
    }

    /// The name of the view axis this rule refers to, if any.
    pub fn axis(&self) -> Option<&str> {
        match self {
            Rule::TooManyFlags { axis, .. } | Rule::TooManyEntirelyFlagged { axis, .. } => {
                Some(axis)
            }
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), RuleSetError> {
        let rule = self.name();
        let check = |param: &'static str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(RuleSetError::InvalidLimit { rule, param, value })
            }
        };

        match self {
            Rule::Outlier { limit, .. }
            | Rule::HighOutlier { limit, .. }
            | Rule::LowOutlier { limit, .. }
            | Rule::MinAbs { limit }
            | Rule::MaxAbs { limit }
            | Rule::Edges { limit }
            | Rule::Sharps { limit }
            | Rule::DiffMad { limit, .. } => check("limit", *limit),

            Rule::NMedian { hi_limit, lo_limit } => {
                check("hi_limit", *hi_limit)?;
                if let Some(lo_limit) = lo_limit {
                    check("lo_limit", *lo_limit)?;
                }
                Ok(())
            }

            Rule::TooManyFlags { axis, limit, .. }
            | Rule::TooManyEntirelyFlagged { axis, limit } => {
                if axis.trim().is_empty() {
                    return Err(RuleSetError::EmptyAxis { rule });
                }
                check("limit", *limit)
            }

            Rule::BadAntenna {
                lo_limit,
                frac_limit,
                ..
            } => {
                check("lo_limit", *lo_limit)?;
                check("frac_limit", *frac_limit)
            }

            Rule::BadQuadrant {
                hilo_limit,
                frac_limit,
                baseline_frac_limit,
            } => {
                check("hilo_limit", *hilo_limit)?;
                check("frac_limit", *frac_limit)?;
                check("baseline_frac_limit", *baseline_frac_limit)
            }

            Rule::TooManyFlaggedChannels { frac_limit, .. } => check("frac_limit", *frac_limit),
        }
    }
}

/// An ordered list of [`Rule`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<Rule>);

/// Helper so a rule set can be the whole of a TOML document.
#[derive(Serialize, Deserialize)]
struct RulesDocument {
    rules: RuleSet,
}

impl RuleSet {
    pub fn new() -> RuleSet {
        RuleSet(vec![])
    }

    /// Append a rule; it will be evaluated after all rules already present.
    pub fn push(&mut self, rule: Rule) {
        self.0.push(rule);
    }

    pub fn iter(&self) -> std::slice::Iter<Rule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that every rule's parameters make sense.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        self.0.iter().try_for_each(Rule::validate)
    }

    /// Parse a TOML document containing a `[[rules]]` array. Rule order is
    /// preserved. Unknown rule names are errors.
    pub fn from_toml_str(s: &str) -> Result<RuleSet, RuleSetError> {
        let doc: RulesDocument = toml::from_str(s).map_err(|e| RuleSetError::Parse(e.to_string()))?;
        doc.rules.validate()?;
        Ok(doc.rules)
    }

    /// Parse a JSON array of rules. Rule order is preserved. Unknown rule names
    /// are errors.
    pub fn from_json_str(s: &str) -> Result<RuleSet, RuleSetError> {
        let rules: RuleSet = serde_json::from_str(s).map_err(|e| RuleSetError::Parse(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Render this rule set as a TOML `[[rules]]` document.
    pub fn to_toml_string(&self) -> Result<String, RuleSetError> {
        toml::to_string(&RulesDocument { rules: self.clone() })
            .map_err(|e| RuleSetError::Parse(e.to_string()))
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        RuleSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
