// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{io::Write as _, num::NonZeroUsize};

use approx::assert_abs_diff_eq;
use indoc::indoc;
use ndarray::prelude::*;
use tempfile::Builder;
use vec1::vec1;

use super::*;
use crate::{
    flagging::{ChannelRange, FlagReason, Flagger, FlaggerParams, Rule, RuleSet, Termination},
    view::{Axis, Coord, ViewError, ViewMeta},
};

const TOML_VIEWS: &str = indoc! {r#"
    [[views]]
    table = "uid___A002_Xb.ms.tsys"
    spw = 17
    pol = "XX"
    description = "Tsys median"
    data = [[10.0, 10.3, 10.5], [10.2, 95.0, 10.1]]
    nodata = [[false, false, true], [false, false, false]]

    [[views.axes]]
    name = "Antenna1"
    coordinates = ["DA41", "DV02"]

    [[views.axes]]
    name = "Time"
    unit = "s"
    coordinates = [4.5e9, 4.6e9, 4.7e9]

    [[views]]
    table = "uid___A002_Xb.ms.tsys"
    spw = 19
    data = [1.0, 1.0, 1.0, 1.0, 100.0, 1.0, 1.0]

    [[views.axes]]
    name = "Channel"
"#};

fn toml_store() -> ViewStore {
    let views_file: ViewsFile = toml::from_str(TOML_VIEWS).unwrap();
    ViewStore::from_views_file(views_file).unwrap()
}

fn channel_view(table: &str, spw: u32, data: Vec<f64>) -> View {
    let n = data.len();
    View::vector(
        Array1::from_vec(data),
        Axis::indexed("Channel", "", n),
        ViewMeta {
            table: table.to_string(),
            spw,
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn test_read_toml_views() {
    let store = toml_store();
    assert_eq!(store.len(), 2);

    let views = store.views();
    let matrix = &views[0];
    assert_eq!(matrix.shape(), &[2, 3]);
    assert_eq!(matrix.meta.pol.as_deref(), Some("XX"));
    assert_eq!(matrix.axes()[1].unit(), "s");
    assert_eq!(matrix.axes()[1].coordinates()[2], Coord::Float(4.7e9));
    assert_eq!(matrix.num_cells_with_data(), 5);

    // Missing coordinates are indices.
    let vector = &views[1];
    assert_eq!(vector.axes()[0].coordinates()[6], Coord::Int(6));
    assert_eq!(vector.meta.cell_index, None);

    assert_eq!(store.counts(), FlagCounts { flagged: 0, total: 12 });
}

#[test]
fn test_invalid_view_is_reported_with_its_index() {
    let views_file: ViewsFile = toml::from_str(indoc! {r#"
        [[views]]
        table = "t"
        data = [1.0, 2.0]

        [[views.axes]]
        name = "Channel"

        [[views]]
        table = "t"
        data = [[1.0, 2.0], [3.0]]

        [[views.axes]]
        name = "Antenna1"

        [[views.axes]]
        name = "Time"
    "#})
    .unwrap();
    let result = ViewStore::from_views_file(views_file);
    assert!(matches!(
        result,
        Err(StoreError::View {
            index: 1,
            err: ViewError::Ragged { what: "data" }
        })
    ));
}

#[test]
fn test_views_file_round_trip() {
    let store = toml_store();
    store
        .clone()
        .apply(&[FlagOp::new(
            "uid___A002_Xb.ms.tsys",
            19,
            FlagReason::Outlier,
            vec!["Channel".to_string()],
            FlagTarget::Channels(vec1![ChannelRange { start: 4, end: 4 }]),
        )])
        .unwrap();

    for ext in ["json", "toml"] {
        let file = Builder::new().suffix(&format!(".{ext}")).tempfile().unwrap();
        store.write(file.path()).unwrap();
        let read = ViewStore::from_file(file.path()).unwrap();
        assert_eq!(read.views(), store.views(), "{ext} round trip");
        assert_eq!(read.counts().flagged, 1);
    }
}

#[test]
fn test_read_json_views() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"views": [{{"table": "bp.tbl", "spw": 3, "cell_index": 1,
            "axes": [{{"name": "Channel"}}],
            "data": [1.0, 2.0, 3.0], "flag": [false, true, false]}}]}}"#
    )
    .unwrap();

    let store = ViewStore::from_file(file.path()).unwrap();
    let views = store.views();
    assert_eq!(views[0].meta.cell_index, Some(1));
    assert_eq!(store.counts(), FlagCounts { flagged: 1, total: 3 });
}

#[test]
fn test_unknown_extension() {
    let file = Builder::new().suffix(".yaml").tempfile().unwrap();
    let result = ViewStore::from_file(file.path());
    assert!(matches!(
        result,
        Err(StoreError::UnknownExtension { ref valid, .. }) if valid == "toml, json"
    ));
}

#[test]
fn test_bad_json_reports_the_file() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{{\"views\": 3}}").unwrap();
    let result = ViewStore::from_file(file.path());
    assert!(matches!(result, Err(StoreError::Json { .. })));
}

#[test]
fn test_apply_coords() {
    let mut store = toml_store();
    let flagop = FlagOp::new(
        "uid___A002_Xb.ms.tsys",
        17,
        FlagReason::HighOutlier,
        // Axes may be given in any order.
        vec!["Time".to_string(), "Antenna1".to_string()],
        FlagTarget::Coords(vec1![
            vec![Coord::from(4.6e9), Coord::from("DV02")],
            // This cell is "nodata", so it stays unflagged.
            vec![Coord::from(4.7e9), Coord::from("DA41")]
        ]),
    )
    .with_pol(Some("XX".to_string()));

    let counts = store.apply(&[flagop]).unwrap();
    assert_eq!(counts, FlagCounts { flagged: 1, total: 12 });
    let views = store.views();
    assert!(views[0].flag()[[1, 1].as_slice()]);
    assert!(!views[0].flag()[[0, 2].as_slice()]);
}

#[test]
fn test_apply_everything() {
    let mut store = toml_store();
    let flagop = FlagOp::new(
        "uid___A002_Xb.ms.tsys",
        17,
        FlagReason::TooManyEntirelyFlagged,
        vec![],
        FlagTarget::Everything,
    );
    let counts = store.apply(&[flagop]).unwrap();
    assert_eq!(counts, FlagCounts { flagged: 5, total: 12 });
    assert_abs_diff_eq!(counts.fraction(), 5.0 / 12.0);
}

#[test]
fn test_apply_errors() {
    let mut store = toml_store();
    let channels = |spw, end| {
        FlagOp::new(
            "uid___A002_Xb.ms.tsys",
            spw,
            FlagReason::MaxAbs,
            vec!["Channel".to_string()],
            FlagTarget::Channels(vec1![ChannelRange { start: 0, end }]),
        )
    };

    assert!(matches!(
        store.apply(&[channels(19, 7)]),
        Err(StoreError::ChannelOutOfRange {
            channel: 7,
            num_channels: 7,
            ..
        })
    ));
    assert!(matches!(
        store.apply(&[channels(21, 0)]),
        Err(StoreError::NoMatchingView(_))
    ));
    // Channel ranges only make sense for vectors.
    assert!(matches!(
        store.apply(&[channels(17, 0)]),
        Err(StoreError::AxisMismatch { .. })
    ));

    let coords = |axes: &[&str], tuple: Vec<Coord>| {
        FlagOp::new(
            "uid___A002_Xb.ms.tsys",
            17,
            FlagReason::LowOutlier,
            axes.iter().map(|a| a.to_string()).collect(),
            FlagTarget::Coords(vec1![tuple]),
        )
    };
    assert!(matches!(
        store.apply(&[coords(&["Antenna2", "Time"], vec!["DA41".into(), Coord::from(4.5e9)])]),
        Err(StoreError::UnknownAxis { ref axis, .. }) if axis == "Antenna2"
    ));
    assert!(matches!(
        store.apply(&[coords(&["Antenna1"], vec!["DA41".into()])]),
        Err(StoreError::AxisMismatch { .. })
    ));
    assert!(matches!(
        store.apply(&[coords(&["Antenna1", "Time"], vec!["DA43".into(), Coord::from(4.5e9)])]),
        Err(StoreError::UnknownCoordinate { ref coord, .. }) if coord == "DA43"
    ));

    // Nothing was flagged by the failed operations.
    assert_eq!(store.counts().flagged, 0);
}

#[test]
fn test_pol_must_match_if_given() {
    let mut store = toml_store();
    let flagop = FlagOp::new(
        "uid___A002_Xb.ms.tsys",
        17,
        FlagReason::TooManyFlags,
        vec![],
        FlagTarget::Everything,
    )
    .with_pol(Some("YY".to_string()));
    assert!(matches!(
        store.apply(&[flagop]),
        Err(StoreError::NoMatchingView(_))
    ));
}

fn intent_view(description: &str, data: Vec<f64>) -> View {
    let n = data.len();
    View::vector(
        Array1::from_vec(data),
        Axis::indexed("Channel", "", n),
        ViewMeta {
            table: "t.tsys".to_string(),
            spw: 17,
            description: description.to_string(),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn test_apply_skips_views_that_cant_place_the_cells() {
    let mut store = ViewStore::new(vec![
        intent_view("ATMOSPHERE", vec![1.0; 7]),
        intent_view("BANDPASS", vec![2.0; 4]),
    ]);
    let channels = |start, end| {
        FlagOp::new(
            "t.tsys",
            17,
            FlagReason::Outlier,
            vec!["Channel".to_string()],
            FlagTarget::Channels(vec1![ChannelRange { start, end }]),
        )
    };

    // Only the first view has channel 6.
    let counts = store.apply(&[channels(6, 6)]).unwrap();
    assert_eq!(counts, FlagCounts { flagged: 1, total: 11 });
    let views = store.views();
    assert!(views[0].flag()[[6].as_slice()]);
    assert!(views[1].flag().iter().all(|&f| !f));

    // Channels both views have are flagged in both.
    let counts = store.apply(&[channels(0, 1)]).unwrap();
    assert_eq!(counts.flagged, 5);

    // No view has channel 9.
    assert!(matches!(
        store.apply(&[channels(9, 9)]),
        Err(StoreError::ChannelOutOfRange { channel: 9, num_channels: 7, .. })
    ));
    assert_eq!(store.counts().flagged, 5);
}

#[test]
fn test_flagger_with_views_sharing_a_spw() {
    let mut atmosphere = vec![1.0; 7];
    atmosphere[6] = 100.0;
    let store = ViewStore::new(vec![
        intent_view("ATMOSPHERE", atmosphere),
        intent_view("BANDPASS", vec![2.0; 4]),
    ]);
    let params = FlaggerParams {
        niter: NonZeroUsize::new(3).unwrap(),
        rules: RuleSet::from_iter([Rule::Outlier {
            limit: 3.0,
            minsample: 3,
        }]),
        ..Default::default()
    };

    let mut datatask = store.clone();
    let mut flagsetter = store.clone();
    let result = Flagger::new(params).run(&mut datatask, &mut flagsetter).unwrap();

    assert_eq!(result.termination, Termination::Converged);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.flagops.len(), 1);
    assert_eq!(result.after(), &FlagCounts { flagged: 1, total: 11 });
    assert!(store.views()[0].flag()[[6].as_slice()]);
}

#[test]
fn test_flagger_on_a_view_store() {
    let store = ViewStore::new(vec![
        channel_view("bp.tbl", 0, vec![1.0, 1.0, 1.0, 1.0, 100.0, 1.0, 1.0]),
        channel_view("bp.tbl", 1, vec![2.0, 2.0, 2.0, 2.0, 2.0]),
    ]);
    let params = FlaggerParams {
        niter: NonZeroUsize::new(5).unwrap(),
        rules: RuleSet::from_iter([Rule::Outlier {
            limit: 3.0,
            minsample: 3,
        }]),
        ..Default::default()
    };

    let mut datatask = store.clone();
    let mut flagsetter = store.clone();
    let result = Flagger::new(params).run(&mut datatask, &mut flagsetter).unwrap();

    // The second iteration sees the flags applied by the first.
    assert_eq!(result.termination, Termination::Converged);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.flagops.len(), 1);
    assert_eq!(result.flagops[0].spw(), 0);
    assert_eq!(result.before(), &FlagCounts { flagged: 0, total: 12 });
    assert_eq!(result.after(), &FlagCounts { flagged: 1, total: 12 });
    assert_eq!(store.counts().flagged, 1);
    assert!(store.views()[0].flag()[[4].as_slice()]);
}

#[test]
fn test_static_flagger_on_a_view_store() {
    let store = toml_store();
    let params = FlaggerParams {
        iterate_datatask: false,
        rules: RuleSet::from_iter([Rule::HighOutlier {
            limit: 3.0,
            minsample: 3,
        }]),
        ..Default::default()
    };

    let mut datatask = store.clone();
    let mut flagsetter = store.clone();
    let result = Flagger::new(params).run(&mut datatask, &mut flagsetter).unwrap();

    // Both views have a high outlier; they're flagged in one batch.
    assert_eq!(result.flagops.len(), 2);
    assert_eq!(result.after().flagged, 2);
    let views = store.views();
    assert!(views[0].flag()[[1, 1].as_slice()]);
    assert!(views[1].flag()[[4].as_slice()]);
}
