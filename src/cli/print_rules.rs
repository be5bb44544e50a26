// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Print the rule set that a set of toggles builds. The output can be pasted
//! into an argument file and re-ordered.

use std::{fs::File, io::Write, path::PathBuf};

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::common::{display_warnings, Warn, ARG_FILE_HELP};
use crate::{FlagRuleArgs, RuleSet, ViewflaggerError};

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct PrintRulesArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// Write the rules to this file rather than stdout.
    #[clap(short, long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "flagging")]
    #[serde(default)]
    pub(super) rule_args: FlagRuleArgs,

    #[clap(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) rules: Option<RuleSet>,
}

impl PrintRulesArgs {
    pub(super) fn merge(self) -> Result<PrintRulesArgs, ViewflaggerError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Any other arguments in the file (e.g. those for flag-views) are
            // ignored.
            let PrintRulesArgs {
                args_file: _,
                output,
                rule_args,
                rules,
            } = unpack_arg_file!(arg_file);

            Ok(PrintRulesArgs {
                args_file: None,
                output: cli_args.output.or(output),
                rule_args: cli_args.rule_args.merge(rule_args),
                rules: cli_args.rules.or(rules),
            })
        } else {
            Ok(cli_args)
        }
    }

    /// The rules, rendered as a TOML `[[rules]]` list.
    pub(super) fn render(self) -> Result<String, ViewflaggerError> {
        let rules = match self.rules {
            Some(rules) => {
                rules.validate()?;
                rules
            }
            None => self.rule_args.make_flag_rules()?,
        };
        if rules.is_empty() {
            "No flagging rules are enabled".warn();
        }
        display_warnings();
        Ok(rules.to_toml_string()?)
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ViewflaggerError> {
        let output = self.output.clone();
        let rendered = self.render()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        match output {
            Some(output) => {
                let mut f = File::create(&output)?;
                f.write_all(rendered.as_bytes())?;
                info!("Rules written to {}", output.display());
            }
            None => print!("{rendered}"),
        }
        Ok(())
    }
}
