// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against command-line interface code that isn't big enough to go in
//! its own module.

use std::{path::Path, str::FromStr};

use indoc::indoc;
use tempfile::TempDir;

use super::*;
use crate::{FlagRuleArgs, ViewflaggerError};

fn read_rule_args(path: &Path) -> Result<FlagRuleArgs, ViewflaggerError> {
    Ok(unpack_arg_file!(path))
}

#[test]
fn test_arg_file_types() {
    assert_eq!(ARG_FILE_TYPES_COMMA_SEPARATED.as_str(), "toml, json");
    assert!(ARG_FILE_HELP.ends_with("toml, json"));
    assert!(matches!(ArgFileTypes::from_str("json"), Ok(ArgFileTypes::Json)));
    assert!(ArgFileTypes::from_str("yaml").is_err());
}

#[test]
fn test_unpack_arg_file() {
    let temp_dir = TempDir::new().expect("couldn't make tmp dir");

    // Extensions are case insensitive.
    let toml = temp_dir.path().join("args.TOML");
    std::fs::write(
        &toml,
        indoc! {r#"
            flag_tmf1 = true
            tmf1_axis = "Antenna1"
            tmf1_excess_limit = 3
        "#},
    )
    .unwrap();
    let args = read_rule_args(&toml).unwrap();
    assert!(args.flag_tmf1);
    assert_eq!(args.tmf1_axis.as_deref(), Some("Antenna1"));
    assert_eq!(args.tmf1_excess_limit, Some(3));
    assert!(!args.flag_tmf2);

    let json = temp_dir.path().join("args.json");
    std::fs::write(&json, r#"{"flag_tmf1": "yes"}"#).unwrap();
    let result = read_rule_args(&json);
    assert!(matches!(result, Err(ViewflaggerError::ArgFile(ref s)) if s.contains("json")));

    let missing = temp_dir.path().join("missing.json");
    assert!(matches!(
        read_rule_args(&missing),
        Err(ViewflaggerError::Generic(_))
    ));
}
