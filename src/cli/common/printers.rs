// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tree-shaped reports of what the CLI is about to do, and of the warnings it
//! collected while parsing arguments.

use std::{borrow::Cow, sync::Mutex};

use log::Level;

lazy_static::lazy_static! {
    static ref WARNINGS: Mutex<Vec<Vec<Cow<'static, str>>>> = Mutex::new(vec![]);
}

/// The tree symbol preceding a line. Only the first line of a block gets a
/// branch; the last block's branch is a corner.
fn tree_symbol(i_line: usize, num_lines: usize, i_block: usize, num_blocks: usize) -> char {
    let last_line = i_line + 1 == num_lines;
    let last_block = i_block + 1 == num_blocks;
    match i_line {
        0 if last_line && last_block => '└',
        0 => '├',
        _ => '│',
    }
}

/// Render blocks of lines under a title, one string per output line.
fn render(title: &str, blocks: &[Vec<Cow<'static, str>>]) -> Vec<String> {
    let num_blocks = blocks.len();
    let mut lines = vec![console::style(title).bold().to_string()];
    for (i_block, block) in blocks.iter().enumerate() {
        for (i_line, line) in block.iter().enumerate() {
            let symbol = tree_symbol(i_line, block.len(), i_block, num_blocks);
            lines.push(format!("{symbol} {line}"));
        }
    }
    lines.push(String::new());
    lines
}

/// Lines grouped into blocks under a bold title, e.g.
///
/// ```text
/// Flagging views
/// ├ 3 views from tsys.toml
/// └ Rules: outlier, too many flags
/// ```
pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        for line in render(&self.title, &self.blocks) {
            log::log!(Level::Info, "{line}");
        }
    }
}

/// Something that can be collected as a warning, to be displayed once all
/// arguments are parsed.
pub(crate) trait Warn {
    fn warn(self);
}

impl<T: Into<Cow<'static, str>>> Warn for T {
    fn warn(self) {
        // A poisoned list still holds valid warnings.
        WARNINGS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(vec![self.into()]);
    }
}

/// Print out (and forget) any warnings collected while CLI arguments were
/// parsed.
pub(crate) fn display_warnings() {
    let blocks = std::mem::take(
        &mut *WARNINGS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()),
    );
    log::debug!("Displaying {} warnings", blocks.len());
    if blocks.is_empty() {
        return;
    }
    for line in render("Warnings", &blocks) {
        log::log!(Level::Warn, "{line}");
    }
}
