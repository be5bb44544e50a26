// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with flagging rules and the flagger.

use thiserror::Error;

/// Errors when building or parsing a rule set. These are configuration
/// mistakes and are never retried.
#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("Couldn't parse the flagging rules: {0}")]
    Parse(String),

    #[error("Rule '{rule}' has an invalid {param} ({value}); it must be finite and non-negative")]
    InvalidLimit {
        rule: &'static str,
        param: &'static str,
        value: f64,
    },

    #[error("Rule '{rule}' has an empty axis name")]
    EmptyAxis { rule: &'static str },
}

/// Errors when evaluating a rule set against a view.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Rule '{rule}' refers to axis '{axis}', but view '{view}' only has axes {available:?}")]
    MissingAxis {
        rule: &'static str,
        axis: String,
        view: String,
        available: Vec<String>,
    },
}

/// Errors from the flagger. Collaborator errors are passed through untouched
/// as the error source.
#[derive(Error, Debug)]
pub enum FlaggerError {
    #[error("The data task failed: {0}")]
    DataTask(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("The flag-setting task failed: {0}")]
    FlagSetter(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error(transparent)]
    Rule(#[from] RuleError),
}
