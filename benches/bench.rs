// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::*;
use ndarray::prelude::*;

use viewflagger::{evaluate, Axis, Coord, FlagRuleArgs, View, ViewMeta};

/// An antenna-by-time matrix of Tsys-like values, with one dead antenna and a
/// few spikes.
fn tsys_view(num_antennas: usize, num_times: usize) -> View {
    let data = Array2::from_shape_fn((num_antennas, num_times), |(a, t)| {
        if a == 3 {
            10.0
        } else if (a * 31 + t * 17) % 97 == 0 {
            500.0
        } else {
            100.0 + ((a * 7 + t * 13) % 11) as f64 * 0.1
        }
    });
    let antennas = Axis::new(
        "Antenna1",
        "",
        (0..num_antennas)
            .map(|a| Coord::from(format!("DA{a:02}")))
            .collect(),
    )
    .unwrap();
    let times = Axis::indexed("Time", "s", num_times);
    View::matrix(data, antennas, times, ViewMeta::default()).unwrap()
}

fn rule_engine(c: &mut Criterion) {
    let rules = FlagRuleArgs {
        flag_bad_antenna: true,
        flag_hilo: true,
        flag_tmf1: true,
        tmf1_limit: Some(0.5),
        flag_tmef1: true,
        tmef1_limit: Some(0.5),
        ..Default::default()
    }
    .make_flag_rules()
    .unwrap();

    let mut group = c.benchmark_group("evaluate");
    for (num_antennas, num_times) in [(16, 64), (64, 256)] {
        let view = tsys_view(num_antennas, num_times);
        group.bench_function(format!("{num_antennas}x{num_times}"), |b| {
            b.iter_batched(
                || view.clone(),
                |mut view| evaluate(&mut view, &rules).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, rule_engine);
criterion_main!(benches);
