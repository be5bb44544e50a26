// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The flagging controller.
//!
//! The [`Flagger`] repeatedly asks a [`DataTask`] for views, evaluates its
//! rules against them and hands the resulting flag operations to a
//! [`FlagSetter`]. This continues until an iteration raises no new flag
//! operations, or the iteration budget is spent. The data task is called
//! again after every iteration that raised flags, because the views it
//! produces may depend on the flags that were just applied (e.g. a calibration
//! solution recomputed from the newly flagged data). The flagger never knows
//! why views change, only that they might.


use std::num::NonZeroUsize;

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::{ArrayD, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::{evaluate, Evaluation, FlagOp, FlaggerError, RuleSet};
use crate::{
    constants::DEFAULT_NITER,
    view::{View, ViewKey},
};

/// Something that produces views, e.g. by reducing a calibration table to
/// median Tsys per antenna and time. It is called afresh every iteration.
pub trait DataTask {
    type Error: std::error::Error + Send + Sync + 'static;

    fn produce(&mut self) -> Result<Vec<View>, Self::Error>;
}

/// Something that applies flag operations to whatever underlies the views, and
/// can summarise the state of its flags.
pub trait FlagSetter {
    type Summary: Clone + std::fmt::Debug;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Summarise the current flags without changing anything.
    fn summarise(&mut self) -> Result<Self::Summary, Self::Error>;

    /// Apply flag operations, returning a summary of the flags afterwards. May
    /// be called with no flag operations.
    fn apply(&mut self, flagops: &[FlagOp]) -> Result<Self::Summary, Self::Error>;
}

/// Why the flagger stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Termination {
    /// An iteration raised no new flag operations.
    #[strum(serialize = "converged")]
    Converged,

    /// The maximum number of iterations was reached while flag operations were
    /// still being raised.
    #[strum(serialize = "iteration budget exhausted")]
    BudgetExhausted,

    /// The data task produced no views.
    #[strum(serialize = "no views")]
    NoViews,
}

#[derive(Debug, Clone)]
pub struct FlaggerParams {
    /// The maximum number of evaluate/apply cycles.
    pub niter: NonZeroUsize,

    /// If `false`, the data task is only called once, and later iterations
    /// re-evaluate the same (locally flagged) views. All flag operations are
    /// then applied in a single batch at the end.
    pub iterate_datatask: bool,

    /// The rules to evaluate against every view.
    pub rules: RuleSet,

    /// Prepended to log messages, e.g. "Tsys flagging: ".
    pub prepend: String,
}

impl Default for FlaggerParams {
    fn default() -> Self {
        Self {
            niter: DEFAULT_NITER,
            iterate_datatask: true,
            rules: RuleSet::new(),
            prepend: String::new(),
        }
    }
}

/// Everything the flagger found.
#[derive(Debug, Clone)]
pub struct FlaggerResult<S> {
    /// The views as they were when the flagger finished. If the last iteration
    /// raised flags, these are freshly produced and so reflect those flags.
    pub views: Vec<View>,

    /// Every flag operation raised, sorted and de-duplicated.
    pub flagops: Vec<FlagOp>,

    /// Flag summaries before and after flagging. If nothing was flagged, the
    /// "after" summary is a clone of the "before" summary rather than one
    /// reported by the [`FlagSetter`].
    pub summaries: [S; 2],

    pub termination: Termination,

    /// The number of evaluate/apply cycles performed.
    pub iterations: usize,

    /// The reason for every cell flagged by the rules, per view. Reasons from
    /// later iterations overwrite earlier ones.
    pub reasons: IndexMap<ViewKey, ArrayD<u8>>,
}

impl<S> FlaggerResult<S> {
    /// Did the flagger not find anything to flag?
    pub fn is_clean(&self) -> bool {
        self.flagops.is_empty()
    }

    pub fn before(&self) -> &S {
        &self.summaries[0]
    }

    /// The summary after flagging; the same as [`FlaggerResult::before`] if
    /// nothing was flagged.
    pub fn after(&self) -> &S {
        &self.summaries[1]
    }
}

pub struct Flagger {
    params: FlaggerParams,
}

impl Flagger {
    pub fn new(params: FlaggerParams) -> Flagger {
        Flagger { params }
    }

    pub fn params(&self) -> &FlaggerParams {
        &self.params
    }

    /// Run the produce/evaluate/apply loop until convergence or the iteration
    /// budget is spent. Any error from either collaborator aborts the run.
    pub fn run<D, F>(
        &self,
        datatask: &mut D,
        flagsetter: &mut F,
    ) -> Result<FlaggerResult<F::Summary>, FlaggerError>
    where
        D: DataTask,
        F: FlagSetter,
    {
        if self.params.iterate_datatask {
            self.run_iterating(datatask, flagsetter)
        } else {
            self.run_static(datatask, flagsetter)
        }
    }

    fn run_iterating<D, F>(
        &self,
        datatask: &mut D,
        flagsetter: &mut F,
    ) -> Result<FlaggerResult<F::Summary>, FlaggerError>
    where
        D: DataTask,
        F: FlagSetter,
    {
        let mut all_flagops = vec![];
        let mut reasons = IndexMap::new();
        let mut before = None;
        let mut after = None;
        let mut iteration = 0;

        let mut views = produce(datatask)?;
        let termination = loop {
            if views.is_empty() {
                break Termination::NoViews;
            }

            iteration += 1;
            let new_flagops = self.evaluate_views(&mut views, &mut reasons)?;
            self.log_iteration(&views, iteration, new_flagops.len());

            if before.is_none() {
                before = Some(summarise(flagsetter)?);
            }
            after = Some(apply(flagsetter, &new_flagops)?);

            if new_flagops.is_empty() {
                break Termination::Converged;
            }
            all_flagops.extend(new_flagops);

            // Whether or not there's another iteration, get views that reflect
            // the flags just applied.
            views = produce(datatask)?;
            if iteration == self.params.niter.get() {
                break Termination::BudgetExhausted;
            }
        };

        let before = match before {
            Some(before) => before,
            None => summarise(flagsetter)?,
        };
        let after = match after {
            Some(after) if !all_flagops.is_empty() => after,
            _ => before.clone(),
        };
        Ok(self.finish(views, all_flagops, [before, after], termination, iteration, reasons))
    }

    fn run_static<D, F>(
        &self,
        datatask: &mut D,
        flagsetter: &mut F,
    ) -> Result<FlaggerResult<F::Summary>, FlaggerError>
    where
        D: DataTask,
        F: FlagSetter,
    {
        let mut all_flagops = vec![];
        let mut reasons = IndexMap::new();
        let mut iteration = 0;

        let mut views = produce(datatask)?;
        let termination = loop {
            if views.is_empty() {
                break Termination::NoViews;
            }

            iteration += 1;
            let new_flagops = self.evaluate_views(&mut views, &mut reasons)?;
            self.log_iteration(&views, iteration, new_flagops.len());

            if new_flagops.is_empty() {
                break Termination::Converged;
            }
            all_flagops.extend(new_flagops);
            if iteration == self.params.niter.get() {
                break Termination::BudgetExhausted;
            }
        };

        let before = summarise(flagsetter)?;
        let after = if all_flagops.is_empty() {
            before.clone()
        } else {
            apply(flagsetter, &all_flagops)?
        };
        Ok(self.finish(views, all_flagops, [before, after], termination, iteration, reasons))
    }

    /// Evaluate the rules against every view. Views are independent, so they
    /// are evaluated in parallel, but the flag operations are returned in view
    /// order.
    fn evaluate_views(
        &self,
        views: &mut [View],
        reasons: &mut IndexMap<ViewKey, ArrayD<u8>>,
    ) -> Result<Vec<FlagOp>, FlaggerError> {
        let rules = &self.params.rules;
        let evaluations: Vec<Evaluation> = views
            .par_iter_mut()
            .map(|view| evaluate(view, rules))
            .collect::<Result<_, _>>()?;

        let mut flagops = vec![];
        for (view, evaluation) in views.iter().zip(evaluations) {
            let Evaluation {
                flagops: view_flagops,
                reasons: view_reasons,
                ..
            } = evaluation;
            merge_reasons(reasons, view.key(), view_reasons);
            flagops.extend(view_flagops);
        }
        Ok(flagops)
    }

    fn log_iteration(&self, views: &[View], iteration: usize, num_flagops: usize) {
        let tables = views.iter().map(|v| v.meta.table.as_str()).unique().join(",");
        let message = format!(
            "{}{tables} iteration {iteration} raised {num_flagops} flagging commands",
            self.params.prepend
        );
        if num_flagops == 0 {
            info!("{message}");
        } else {
            warn!("{message}");
        }
    }

    fn finish<S>(
        &self,
        views: Vec<View>,
        mut flagops: Vec<FlagOp>,
        summaries: [S; 2],
        termination: Termination,
        iterations: usize,
        reasons: IndexMap<ViewKey, ArrayD<u8>>,
    ) -> FlaggerResult<S> {
        flagops.sort_unstable();
        flagops.dedup();
        debug!(
            "{}Finished after {iterations} iterations ({termination}); {} unique flagging commands",
            self.params.prepend,
            flagops.len()
        );
        FlaggerResult {
            views,
            flagops,
            summaries,
            termination,
            iterations,
            reasons,
        }
    }
}

fn produce<D: DataTask>(datatask: &mut D) -> Result<Vec<View>, FlaggerError> {
    datatask
        .produce()
        .map_err(|e| FlaggerError::DataTask(Box::new(e)))
}

fn summarise<F: FlagSetter>(flagsetter: &mut F) -> Result<F::Summary, FlaggerError> {
    flagsetter
        .summarise()
        .map_err(|e| FlaggerError::FlagSetter(Box::new(e)))
}

fn apply<F: FlagSetter>(flagsetter: &mut F, flagops: &[FlagOp]) -> Result<F::Summary, FlaggerError> {
    flagsetter
        .apply(flagops)
        .map_err(|e| FlaggerError::FlagSetter(Box::new(e)))
}

/// Merge a view's reason plane into the running planes. Non-zero reasons
/// overwrite; if the view changed shape, the new plane replaces the old one.
fn merge_reasons(reasons: &mut IndexMap<ViewKey, ArrayD<u8>>, key: ViewKey, new: ArrayD<u8>) {
    match reasons.get_mut(&key) {
        Some(plane) if plane.shape() == new.shape() => {
            Zip::from(plane).and(&new).for_each(|p, &n| {
                if n != 0 {
                    *p = n;
                }
            });
        }
        _ => {
            reasons.insert(key, new);
        }
    }
}
