// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use viewflagger::{FlagOp, FlagReason, FlagTarget, ViewStore};

use crate::{get_cmd_output, viewflagger, write_views};

#[test]
fn test_flag_views() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let views = write_views(tmp_dir.path());
    let output_views = tmp_dir.path().join("flagged.json");
    let output_flagops = tmp_dir.path().join("flagops.json");

    #[rustfmt::skip]
    let cmd = viewflagger()
        .args([
            "flag-views",
            "--views", &views.display().to_string(),
            "--output-views", &output_views.display().to_string(),
            "--output-flagops", &output_flagops.display().to_string(),
            "--flag-lo",
            "--flag-hi",
            "--niter", "5",
        ])
        .ok();
    assert!(cmd.is_ok(), "flag-views failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("converged"), "{stdout}");

    let store = ViewStore::from_file(&output_views).unwrap();
    let views = store.views();
    // The Tsys dip and the bandpass spike.
    assert!(views[0].flag()[[1, 3].as_slice()]);
    assert_eq!(views[0].num_flagged(), 1);
    assert!(views[1].flag()[[4].as_slice()]);
    assert_eq!(views[1].num_flagged(), 1);

    let flagops: Vec<FlagOp> =
        serde_json::from_str(&std::fs::read_to_string(&output_flagops).unwrap()).unwrap();
    assert_eq!(flagops.len(), 2);
    let tsys = flagops
        .iter()
        .find(|f| f.table() == "uid___A002_Xd.ms.tsys")
        .unwrap();
    assert_eq!(tsys.reason(), FlagReason::LowOutlier);
    assert_eq!(tsys.pol(), Some("XX"));
    assert!(matches!(tsys.target(), FlagTarget::Coords(c) if c.len() == 1));
}

#[test]
fn test_flag_views_with_arg_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let views = write_views(tmp_dir.path());
    let output_views = tmp_dir.path().join("flagged.toml");
    let arg_file = tmp_dir.path().join("args.toml");
    std::fs::write(
        &arg_file,
        format!(
            "views = \"{}\"\noutput_views = \"{}\"\n\n[flagging]\nflag_maxabs = true\nfmax_limit = 50.0\n",
            views.display(),
            output_views.display()
        ),
    )
    .unwrap();
    let saved = tmp_dir.path().join("saved.toml");

    #[rustfmt::skip]
    let cmd = viewflagger()
        .args([
            "flag-views",
            &arg_file.display().to_string(),
            "--save-toml", &saved.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "flag-views failed: {}", cmd.err().unwrap());

    // Every Tsys value and the bandpass spike are above 50.
    let store = ViewStore::from_file(&output_views).unwrap();
    assert_eq!(store.counts().flagged, 15);

    // The saved arguments reproduce the run.
    let saved = std::fs::read_to_string(saved).unwrap();
    assert!(saved.contains("flag_maxabs = true"), "{saved}");
    assert!(saved.contains("fmax_limit = 50.0"), "{saved}");
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let views = write_views(tmp_dir.path());
    let output_views = tmp_dir.path().join("flagged.json");

    #[rustfmt::skip]
    let cmd = viewflagger()
        .args([
            "flag-views",
            "--views", &views.display().to_string(),
            "--output-views", &output_views.display().to_string(),
            "--flag-hilo",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "flag-views failed: {}", cmd.err().unwrap());
    assert!(!output_views.exists());
}

#[test]
fn test_missing_views_file() {
    let cmd = viewflagger()
        .args(["flag-views", "--views", "/does/not/exist.json"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error: "), "{stderr}");
}
