/*
 * nestri - A CLI tool to manage your cloud gaming service
 * Copyright (C) 2025 Nestri <contact@nestri.io>
 *
 * This program is free software; you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation; either version 2 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along
 * with this program; if not, write to the Free Software Foundation, Inc.,
 * 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.
 */

//! The `neofetch` command: colored logo next to a small hardware panel.

use crossterm::style::{Attribute, Stylize};
use std::io::Write;
use std::sync::Arc;

use crate::color::Palette;
use crate::host::Platform;
use crate::process::ProcessRunner;
use crate::specs::{self, SystemSpecs};
use crate::terminal::{self, ColorSupport};

pub const ART: &str = include_str!("nestri.ascii");

pub const PALETTE: [&str; 5] = ["#F8481C", "#F74127", "#F53B30", "#F23538", "#F02E40"];

const MARGIN_X: usize = 4;
const COLUMN_GAP: usize = 4;
const UNKNOWN: &str = "unknown";

/// Lay out `art` and the panel side by side, with no borders.
///
/// Art lines are padded to the widest line before coloring so the panel
/// column lines up regardless of escape sequences.
pub fn render(art: &str, palette: &Palette, specs: &SystemSpecs, support: ColorSupport) -> String {
    let lines: Vec<&str> = art.trim_end_matches('\n').lines().collect();
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let accent = palette.color_for_line(0, lines.len()).to_terminal(support);

    let panel: Vec<String> = specs
        .rows()
        .into_iter()
        .map(|(label, value)| {
            let value = if value.trim().is_empty() { UNKNOWN } else { value };
            let label = format!("{}:", label);
            match accent {
                Some(color) => format!("{} {}", label.with(color).attribute(Attribute::Bold), value),
                None => format!("{} {}", label, value),
            }
        })
        .collect();

    let rows = lines.len().max(panel.len());
    let margin = " ".repeat(MARGIN_X);
    let mut out = String::from("\n");

    for row in 0..rows {
        let line = lines.get(row).copied().unwrap_or("");
        let padded = format!("{:<width$}", line, width = width);
        out.push_str(&margin);
        match palette.color_for_line(row, lines.len()).to_terminal(support) {
            Some(color) if row < lines.len() => {
                out.push_str(&padded.with(color).to_string());
            }
            _ => out.push_str(&padded),
        }
        if let Some(entry) = panel.get(row) {
            out.push_str(&" ".repeat(COLUMN_GAP));
            out.push_str(entry);
        }
        out.push('\n');
    }

    out.push('\n');
    out
}

pub async fn neofetch<W: Write>(
    runner: Arc<dyn ProcessRunner>,
    platform: Platform,
    out: &mut W,
) -> anyhow::Result<()> {
    let palette = Palette::from_hex(&PALETTE)?;
    let specs = specs::collect(runner, platform).await;
    let support = terminal::detect_color_support();

    let banner = render(ART, &palette, &specs, support);
    out.write_all(banner.as_bytes())?;
    out.flush()?;
    Ok(())
}
