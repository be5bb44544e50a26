// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    cmp::Ordering,
    fmt::Display,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// A single coordinate value on an [`Axis`](super::Axis), e.g. an antenna
/// number, a timestamp or an antenna name.
///
/// Coordinates are totally ordered (integers, then floats, then text; floats
/// are compared with [`f64::total_cmp`]) so that flag operations referring to
/// them can be sorted and de-duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coord {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Coord {
    fn rank(&self) -> u8 {
        match self {
            Coord::Int(_) => 0,
            Coord::Float(_) => 1,
            Coord::Text(_) => 2,
        }
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coord {}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Coord::Int(a), Coord::Int(b)) => a.cmp(b),
            (Coord::Float(a), Coord::Float(b)) => a.total_cmp(b),
            (Coord::Text(a), Coord::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Coord::Int(i) => i.hash(state),
            Coord::Float(f) => f.to_bits().hash(state),
            Coord::Text(s) => s.hash(state),
        }
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Coord::Int(i) => write!(f, "{i}"),
            Coord::Float(x) => write!(f, "{x}"),
            Coord::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Coord {
    fn from(i: i64) -> Self {
        Coord::Int(i)
    }
}

impl From<i32> for Coord {
    fn from(i: i32) -> Self {
        Coord::Int(i64::from(i))
    }
}

impl From<usize> for Coord {
    fn from(i: usize) -> Self {
        Coord::Int(i as i64)
    }
}

impl From<f64> for Coord {
    fn from(x: f64) -> Self {
        Coord::Float(x)
    }
}

impl From<&str> for Coord {
    fn from(s: &str) -> Self {
        Coord::Text(s.to_string())
    }
}

impl From<String> for Coord {
    fn from(s: String) -> Self {
        Coord::Text(s)
    }
}
