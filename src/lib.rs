// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Rule-driven statistical flagging of radio-astronomy calibration "views".

A [`View`] is a 1-D or 2-D array of reduced calibration data (e.g. median Tsys
per antenna and time) with flags and labelled axes. A [`RuleSet`] is evaluated
against a view by [`evaluate`], producing [`FlagOp`]s. The [`Flagger`] drives
the fixpoint loop between a [`DataTask`] (which produces views) and a
[`FlagSetter`] (which applies flag operations to the underlying data).
 */

mod cli;
pub mod constants;
pub mod flagging;
pub(crate) mod math;
pub mod store;
pub mod view;

// Re-exports.
pub use cli::{Viewflagger, ViewflaggerError};
pub use flagging::{
    evaluate, ChannelRange, DataTask, Evaluation, FlagOp, FlagReason, FlagRuleArgs, FlagSetter,
    FlagTarget, Flagger, FlaggerError, FlaggerParams, FlaggerResult, Rule, RuleError, RuleSet,
    RuleSetError, Termination,
};
pub use store::{FlagCounts, StoreError, ViewStore, ViewsFile};
pub use view::{Axis, Coord, View, ViewError, ViewKey, ViewMeta};
