// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{
    borrow::Cow,
    fs::File,
    io::{BufWriter, Write},
    num::NonZeroUsize,
    path::PathBuf,
};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{display_warnings, InfoPrinter, Warn, ARG_FILE_HELP};
use crate::{
    constants::DEFAULT_NITER, FlagRuleArgs, Flagger, FlaggerParams, FlaggerResult, FlagCounts,
    RuleSet, ViewStore, ViewflaggerError,
};

lazy_static::lazy_static! {
    static ref NITER_HELP: String =
        format!("The maximum number of times views are evaluated and flagged. Default: {DEFAULT_NITER}");
}

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct FlagViewsArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// Path to the views to be flagged. Supported formats: toml, json.
    #[clap(short = 'i', long, parse(from_os_str), help_heading = "INPUT FILES")]
    pub(super) views: Option<PathBuf>,

    /// Write the flagged views to this file. Supported formats: toml, json.
    #[clap(short, long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(super) output_views: Option<PathBuf>,

    /// Write the flagging commands to this json file.
    #[clap(long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(super) output_flagops: Option<PathBuf>,

    #[clap(long, help = NITER_HELP.as_str(), help_heading = "FLAGGING")]
    pub(super) niter: Option<NonZeroUsize>,

    /// Read the views only once. Later iterations re-evaluate the views that
    /// were flagged in memory, and all flagging commands are applied together
    /// at the end.
    #[clap(long, help_heading = "FLAGGING")]
    #[serde(default)]
    pub(super) no_iterate_datatask: bool,

    /// Text to prepend to flagging log messages, e.g. "Tsys flagging: ".
    #[clap(long, help_heading = "FLAGGING")]
    pub(super) prepend: Option<String>,

    #[clap(flatten)]
    #[serde(rename = "flagging")]
    #[serde(default)]
    pub(super) rule_args: FlagRuleArgs,

    /// An explicit, ordered list of rules. Only available in argument files;
    /// if given, the --flag-* toggles are ignored.
    #[clap(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) rules: Option<RuleSet>,
}

/// Everything needed to flag views.
pub(super) struct FlagViewsParams {
    pub(super) store: ViewStore,
    pub(super) flagger_params: FlaggerParams,
    pub(super) output_views: Option<PathBuf>,
    pub(super) output_flagops: Option<PathBuf>,
}

impl FlagViewsArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<FlagViewsArgs, ViewflaggerError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let FlagViewsArgs {
                args_file: _,
                views,
                output_views,
                output_flagops,
                niter,
                no_iterate_datatask,
                prepend,
                rule_args,
                rules,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(FlagViewsArgs {
                args_file: None,
                views: cli_args.views.or(views),
                output_views: cli_args.output_views.or(output_views),
                output_flagops: cli_args.output_flagops.or(output_flagops),
                niter: cli_args.niter.or(niter),
                no_iterate_datatask: cli_args.no_iterate_datatask || no_iterate_datatask,
                prepend: cli_args.prepend.or(prepend),
                rule_args: cli_args.rule_args.merge(rule_args),
                rules: cli_args.rules.or(rules),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<FlagViewsParams, ViewflaggerError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            views,
            output_views,
            output_flagops,
            niter,
            no_iterate_datatask,
            prepend,
            rule_args,
            rules,
        } = self;

        let views = views.ok_or(FlagViewsArgsError::NoViews)?;
        let rules = match rules {
            Some(rules) => {
                if rule_args != FlagRuleArgs::default() {
                    "An explicit list of rules was given; ignoring --flag-* toggles and limits"
                        .warn();
                }
                rules.validate()?;
                rules
            }
            None => rule_args.make_flag_rules()?,
        };
        if rules.is_empty() {
            "No flagging rules are enabled; nothing will be flagged".warn();
        }

        let store = ViewStore::from_file(&views)?;
        if store.is_empty() {
            format!("{} contains no views", views.display()).warn();
        }

        let flagger_params = FlaggerParams {
            niter: niter.unwrap_or(DEFAULT_NITER),
            iterate_datatask: !no_iterate_datatask,
            rules,
            prepend: prepend.unwrap_or_default(),
        };

        let mut printer = InfoPrinter::new("Flagging views".into());
        printer.push_line(format!("{} views from {}", store.len(), views.display()).into());
        printer.push_block(vec![
            format!("Maximum iterations: {}", flagger_params.niter).into(),
            if flagger_params.iterate_datatask {
                "Views are re-read after every iteration".into()
            } else {
                "Views are read once; flags are applied at the end".into()
            },
        ]);
        printer.push_line(
            format!(
                "Rules (in order): {}",
                if flagger_params.rules.is_empty() {
                    "none".to_string()
                } else {
                    flagger_params.rules.iter().map(|r| r.name()).join(", ")
                }
            )
            .into(),
        );
        let outputs: Vec<Cow<'static, str>> = [&output_views, &output_flagops]
            .into_iter()
            .flatten()
            .map(|p| p.display().to_string().into())
            .collect();
        if !outputs.is_empty() {
            let mut block: Vec<Cow<'static, str>> = vec!["Outputs:".into()];
            block.extend(outputs);
            printer.push_block(block);
        }
        printer.display();

        display_warnings();

        Ok(FlagViewsParams {
            store,
            flagger_params,
            output_views,
            output_flagops,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ViewflaggerError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}

impl FlagViewsParams {
    pub(super) fn run(self) -> Result<FlaggerResult<FlagCounts>, ViewflaggerError> {
        let FlagViewsParams {
            store,
            flagger_params,
            output_views,
            output_flagops,
        } = self;

        let mut datatask = store.clone();
        let mut flagsetter = store.clone();
        let result = Flagger::new(flagger_params).run(&mut datatask, &mut flagsetter)?;
        for flagop in &result.flagops {
            debug!("{flagop}");
        }

        let mut printer = InfoPrinter::new("Flagging results".into());
        printer.push_line(
            format!(
                "Stopped after {} iterations: {}",
                result.iterations, result.termination
            )
            .into(),
        );
        printer.push_line(format!("{} unique flagging commands", result.flagops.len()).into());
        printer.push_block(vec![
            format!("Flagged before: {}", result.before()).into(),
            format!("Flagged after:  {}", result.after()).into(),
        ]);
        printer.display();

        if let Some(output_views) = output_views {
            store.write(&output_views)?;
            info!("Flagged views written to {}", output_views.display());
        }
        if let Some(output_flagops) = output_flagops {
            let mut writer = BufWriter::new(File::create(&output_flagops)?);
            serde_json::to_writer_pretty(&mut writer, &result.flagops)?;
            writer.flush()?;
            info!("Flagging commands written to {}", output_flagops.display());
        }

        Ok(result)
    }
}

#[derive(thiserror::Error, Debug)]
pub(super) enum FlagViewsArgsError {
    #[error("No views file was specified")]
    NoViews,
}
