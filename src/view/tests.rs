// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::array;

use super::*;

fn antennas() -> Axis {
    Axis::new(
        "Antenna1",
        "",
        vec!["DA41".into(), "DA42".into(), "DV02".into()],
    )
    .unwrap()
}

#[test]
fn test_axis_rejects_duplicate_coordinates() {
    let result = Axis::new("Antenna1", "", vec!["DA41".into(), "DA41".into()]);
    assert!(matches!(
        result,
        Err(ViewError::DuplicateCoordinate { ref coord, .. }) if coord == "DA41"
    ));

    // Equal values of different types are different coordinates.
    assert!(Axis::new("Time", "s", vec![Coord::Int(1), Coord::Float(1.0)]).is_ok());
}

#[test]
fn test_axis_name_matching() {
    let axis = antennas();
    assert!(axis.matches("ANTENNA1"));
    assert!(axis.matches(" antenna1 "));
    assert!(!axis.matches("Antenna2"));
    assert_eq!(axis.position(&Coord::from("DV02")), Some(2));
    assert_eq!(axis.position(&Coord::from("DV03")), None);
    assert_eq!(axis.len(), 3);
}

#[test]
fn test_matrix_view() {
    let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
    let times = Axis::new("Time", "s", vec![Coord::from(0.0), Coord::from(6.048)]).unwrap();
    let view = View::matrix(data, antennas(), times, ViewMeta::default()).unwrap();

    assert_eq!(view.rank(), 2);
    assert_eq!(view.shape(), &[3, 2]);
    assert_eq!(view.axis_index("time"), Some(1));
    assert_eq!(view.axis_index("Channel"), None);
    assert_eq!(
        view.coords_of(&[2, 1]),
        vec![Coord::from("DV02"), Coord::from(6.048)]
    );
    assert_eq!(view.num_flagged(), 0);
    assert_eq!(view.num_cells_with_data(), 6);
}

#[test]
fn test_view_validation() {
    let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];

    // Wrong number of coordinates on the second axis.
    let result = View::matrix(
        data.clone(),
        antennas(),
        Axis::indexed("Time", "s", 3),
        ViewMeta::default(),
    );
    assert!(matches!(
        result,
        Err(ViewError::AxisLength {
            expected: 2,
            found: 3,
            ..
        })
    ));

    // Two axes with the same name.
    let result = View::matrix(
        data.clone(),
        Axis::indexed("Time", "s", 3),
        Axis::indexed("TIME", "s", 2),
        ViewMeta::default(),
    );
    assert!(matches!(result, Err(ViewError::DuplicateAxisName(_))));

    // One axis for two dimensions.
    let result = View::new(data.into_dyn(), vec![antennas()], ViewMeta::default());
    assert!(matches!(
        result,
        Err(ViewError::AxisCount {
            rank: 2,
            num_axes: 1
        })
    ));

    // Rank 3 isn't supported.
    let result = View::new(
        ArrayD::zeros(vec![2, 2, 2]),
        vec![
            Axis::indexed("a", "", 2),
            Axis::indexed("b", "", 2),
            Axis::indexed("c", "", 2),
        ],
        ViewMeta::default(),
    );
    assert!(matches!(result, Err(ViewError::UnsupportedRank(3))));
}

#[test]
fn test_flag_and_nodata_shapes_must_match() {
    let view = View::vector(
        array![1.0, 2.0, 3.0],
        Axis::indexed("Channel", "", 3),
        ViewMeta::default(),
    )
    .unwrap();

    let result = view.clone().with_flag(array![true, false]);
    assert!(matches!(
        result,
        Err(ViewError::ShapeMismatch { what: "flag", .. })
    ));

    let view = view
        .with_flag(array![true, true, false])
        .unwrap()
        .with_nodata(array![true, false, false])
        .unwrap();
    // The nodata cell doesn't count, even though it's flagged.
    assert_eq!(view.num_flagged(), 1);
    assert_eq!(view.num_cells_with_data(), 2);
}

#[test]
fn test_view_key() {
    let meta = ViewMeta {
        table: "uid___A002_X1.ms.tsys".to_string(),
        spw: 13,
        cell_index: Some(1),
        pol: Some("YY".to_string()),
        antenna: None,
        description: "Tsys median".to_string(),
    };
    let view = View::vector(array![1.0], Axis::indexed("Channel", "", 1), meta).unwrap();
    let key = view.key();
    assert_eq!(key.spw, 13);
    assert_eq!(key.to_string(), "uid___A002_X1.ms.tsys spw 13 cell 1 (Tsys median)");
}

#[test]
fn test_coord_ordering() {
    let mut coords = vec![
        Coord::from("b"),
        Coord::from(2.5),
        Coord::from(3),
        Coord::from("a"),
        Coord::from(-1),
        Coord::from(f64::NAN),
    ];
    coords.sort();
    assert_eq!(coords[0], Coord::Int(-1));
    assert_eq!(coords[1], Coord::Int(3));
    assert_eq!(coords[2], Coord::Float(2.5));
    assert!(matches!(coords[3], Coord::Float(f) if f.is_nan()));
    assert_eq!(coords[4], Coord::from("a"));
    assert_eq!(coords[5], Coord::from("b"));
}
