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

use std::io::{self, Read};

pub const SESSION_ID_LEN: usize = 16;

/// Build a session identifier from the alphanumeric bytes of `source`.
///
/// Non-alphanumeric bytes are skipped. Fails with `UnexpectedEof` if the
/// stream ends before enough characters were collected.
pub fn generate_session_id<R: Read>(source: R) -> io::Result<String> {
    let mut id = String::with_capacity(SESSION_ID_LEN);

    for byte in source.bytes() {
        let byte = byte?;
        if byte.is_ascii_alphanumeric() {
            id.push(byte as char);
            if id.len() == SESSION_ID_LEN {
                return Ok(id.trim().to_string());
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "entropy source ended after {} of {} characters",
            id.len(),
            SESSION_ID_LEN
        ),
    ))
}
