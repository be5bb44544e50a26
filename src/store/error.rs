// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with the view store.

use std::path::PathBuf;

use thiserror::Error;

use crate::view::ViewError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Views file '{file}' doesn't have a recognised file extension! Valid extensions are: {valid}")]
    UnknownExtension { file: PathBuf, valid: String },

    #[error("Couldn't decode json structure from {file:?}: {err}")]
    Json { file: PathBuf, err: serde_json::Error },

    #[error("Couldn't decode toml structure from {file:?}: {err}")]
    TomlDe { file: PathBuf, err: toml::de::Error },

    #[error("Couldn't encode views as toml: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Couldn't encode views as json: {0}")]
    JsonSer(#[from] serde_json::Error),

    #[error("View {index} is invalid: {err}")]
    View { index: usize, err: ViewError },

    #[error("No view matches flagging command: {0}")]
    NoMatchingView(String),

    #[error("View '{view}' has no axis named '{axis}'")]
    UnknownAxis { view: String, axis: String },

    #[error("Axis '{axis}' of view '{view}' has no coordinate '{coord}'")]
    UnknownCoordinate {
        view: String,
        axis: String,
        coord: String,
    },

    #[error("Flagging command uses axes {axes:?}, which don't describe view '{view}'")]
    AxisMismatch { view: String, axes: Vec<String> },

    #[error("Channel {channel} is out of range for view '{view}', which has {num_channels} channels")]
    ChannelOutOfRange {
        view: String,
        channel: usize,
        num_channels: usize,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
