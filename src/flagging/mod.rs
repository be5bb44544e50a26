// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rule-driven flagging of views.

mod engine;
mod error;
mod flagger;
mod flagop;
mod rules;

pub use engine::{evaluate, Evaluation};
pub use error::{FlaggerError, RuleError, RuleSetError};
pub use flagger::{DataTask, FlagSetter, Flagger, FlaggerParams, FlaggerResult, Termination};
pub use flagop::{ChannelRange, FlagOp, FlagReason, FlagTarget};
pub use rules::{FlagRuleArgs, Rule, RuleSet};
