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

use crossterm::tty::IsTty;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSupport {
    TrueColor,
    Ansi256,
    None,
}

/// Color support of stdout, judged from whether it is a TTY and the usual
/// environment variables.
pub fn detect_color_support() -> ColorSupport {
    let support = if std::io::stdout().is_tty() {
        color_support_from(|key| std::env::var(key).ok())
    } else {
        ColorSupport::None
    };
    debug!(?support, "terminal color support");
    support
}

pub fn color_support_from<F>(var: F) -> ColorSupport
where
    F: Fn(&str) -> Option<String>,
{
    if var("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        return ColorSupport::None;
    }

    let colorterm = var("COLORTERM").unwrap_or_default();
    let term = var("TERM").unwrap_or_default();
    let term_program = var("TERM_PROGRAM").unwrap_or_default();

    if term == "dumb" {
        return ColorSupport::None;
    }

    let has_truecolor = colorterm == "truecolor"
        || colorterm == "24bit"
        || term.contains("direct")
        || term_program == "iTerm.app"
        || term_program == "WezTerm";

    if has_truecolor {
        ColorSupport::TrueColor
    } else {
        ColorSupport::Ansi256
    }
}
