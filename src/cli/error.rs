// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all viewflagger-related errors. This should be the *only*
//! error enum that is publicly visible from the binary's point of view.

use thiserror::Error;

use super::flag_views::FlagViewsArgsError;
use crate::{
    flagging::{FlaggerError, RuleError, RuleSetError},
    store::StoreError,
};

/// The *only* error that `viewflagger` subcommands return.
#[derive(Error, Debug)]
pub enum ViewflaggerError {
    /// An error related to flag-views.
    #[error("{0}")]
    FlagViews(String),

    /// An error related to flagging rules, e.g. an invalid limit or an axis
    /// that a view doesn't have.
    #[error("{0}\n\nFlagging rules are given with --flag-* toggles or a [[rules]] list in an argument file")]
    Rules(String),

    /// An error related to reading, writing or flagging views.
    #[error("{0}")]
    Views(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

impl From<FlagViewsArgsError> for ViewflaggerError {
    fn from(e: FlagViewsArgsError) -> Self {
        Self::FlagViews(e.to_string())
    }
}

impl From<RuleSetError> for ViewflaggerError {
    fn from(e: RuleSetError) -> Self {
        Self::Rules(e.to_string())
    }
}

impl From<RuleError> for ViewflaggerError {
    fn from(e: RuleError) -> Self {
        Self::Rules(e.to_string())
    }
}

impl From<FlaggerError> for ViewflaggerError {
    fn from(e: FlaggerError) -> Self {
        match e {
            FlaggerError::Rule(e) => Self::from(e),
            FlaggerError::DataTask(_) | FlaggerError::FlagSetter(_) => Self::Views(e.to_string()),
        }
    }
}

impl From<StoreError> for ViewflaggerError {
    fn from(e: StoreError) -> Self {
        let s = e.to_string();
        match e {
            StoreError::IO(e) => Self::from(e),
            _ => Self::Views(s),
        }
    }
}

impl From<serde_json::Error> for ViewflaggerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<toml::ser::Error> for ViewflaggerError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for ViewflaggerError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
