// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use viewflagger::{Viewflagger, ViewflaggerError};

fn main() {
    // Run viewflagger, only returning an error if one occurred.
    if let Err(e) = try_main() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), ViewflaggerError> {
    Viewflagger::parse().run()
}
