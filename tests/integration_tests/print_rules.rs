// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use viewflagger::{Rule, RuleSet};

use crate::viewflagger;

#[test]
fn test_print_rules_to_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("rules.toml");

    #[rustfmt::skip]
    let cmd = viewflagger()
        .args([
            "print-rules",
            "--flag-tmef1",
            "--flag-hilo",
            "--fhl-limit", "4",
            "--output", &output.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "print-rules failed: {}", cmd.err().unwrap());

    let rules = RuleSet::from_toml_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    let rules: Vec<_> = rules.iter().cloned().collect();
    assert_eq!(
        rules,
        vec![
            Rule::Outlier {
                limit: 4.0,
                minsample: 5
            },
            Rule::TooManyEntirelyFlagged {
                axis: "Antenna1".to_string(),
                limit: 1.0
            },
        ]
    );
}

#[test]
fn test_print_rules_rejects_bad_limits() {
    let cmd = viewflagger()
        .args(["print-rules", "--flag-maxabs", "--fmax-limit=-3"])
        .ok();
    assert!(cmd.is_err());
}

#[test]
fn test_print_spectral_and_quadrant_rules() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let output = tmp_dir.path().join("rules.toml");

    #[rustfmt::skip]
    let cmd = viewflagger()
        .args([
            "print-rules",
            "--flag-tmf",
            "--tmf-nchan-limit", "8",
            "--flag-sharps",
            "--flag-bad-quadrant",
            "--fbq-antenna-frac-limit", "0.2",
            "--output", &output.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "print-rules failed: {}", cmd.err().unwrap());

    let rules = RuleSet::from_toml_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
    assert_eq!(names, ["bad quadrant", "sharps", "tmf"]);
    let rules: Vec<_> = rules.iter().cloned().collect();
    assert_eq!(
        rules[0],
        Rule::BadQuadrant {
            hilo_limit: 7.0,
            frac_limit: 0.2,
            baseline_frac_limit: 0.5
        }
    );
    assert_eq!(
        rules[2],
        Rule::TooManyFlaggedChannels {
            frac_limit: 0.1,
            nchan_limit: 8
        }
    );
}
