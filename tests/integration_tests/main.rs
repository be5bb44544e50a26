// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod flag_views;
mod no_stderr;
mod print_rules;

use std::{
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use indoc::indoc;

fn viewflagger() -> Command {
    Command::cargo_bin("viewflagger").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// A views file with a Tsys-like matrix (one antenna is much lower than the
/// others at one time) and a bandpass-like vector with a spike in channel 4.
const VIEWS: &str = indoc! {r#"
    [[views]]
    table = "uid___A002_Xd.ms.tsys"
    spw = 17
    pol = "XX"
    description = "Tsys median"
    data = [
        [100.0, 101.0, 99.0, 100.5, 100.2],
        [100.3, 99.8, 100.1, 20.0, 100.4],
        [99.9, 100.6, 100.2, 100.0, 99.7],
    ]

    [[views.axes]]
    name = "Antenna1"
    coordinates = ["DA41", "DA42", "DV02"]

    [[views.axes]]
    name = "Time"
    unit = "s"
    coordinates = [0.0, 6.048, 12.096, 18.144, 24.192]

    [[views]]
    table = "uid___A002_Xd.ms.bcal"
    spw = 19
    data = [1.0, 1.0, 1.0, 1.0, 100.0, 1.0, 1.0]

    [[views.axes]]
    name = "Channel"
"#};

fn write_views(dir: &Path) -> PathBuf {
    let path = dir.join("views.toml");
    std::fs::write(&path, VIEWS).unwrap();
    path
}
