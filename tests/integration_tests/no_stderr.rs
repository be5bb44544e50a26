// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use tempfile::TempDir;

use crate::{get_cmd_output, viewflagger, write_views};

#[test]
fn test_flag_views_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let views = write_views(tmp_dir.path());

    #[rustfmt::skip]
    let cmd = viewflagger()
        .args([
            "flag-views",
            "--views", &views.display().to_string(),
            "--flag-hilo",
            "--flag-nmedian",
            "-vv",
        ])
        .ok();
    assert!(cmd.is_ok(), "flag-views failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_print_rules_no_stderr() {
    let cmd = viewflagger()
        .args(["print-rules", "--flag-bad-antenna", "--flag-nmedian"])
        .ok();
    assert!(cmd.is_ok(), "print-rules failed: {}", cmd.err().unwrap());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
    assert!(stdout.contains("name = \"bad antenna\""), "{stdout}");
}
