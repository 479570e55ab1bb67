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

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::process::ProcessError;

/// Errors that abort a command.
#[derive(Debug, Error)]
pub enum NestriError {
    /// Missing or malformed user input, raised before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Process {
        context: String,
        #[source]
        source: ProcessError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("could not determine the home directory")]
    HomeDirUnavailable,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("error generating session id: {0}")]
    SessionId(String),

    #[error("backend did not create {marker} within {}s", .waited.as_secs())]
    ReadinessTimeout { marker: String, waited: Duration },

    #[error("cancelled while waiting for the backend")]
    Cancelled,

    #[error("I/O error: {0}")]
    Output(#[from] io::Error),
}

impl NestriError {
    pub fn process(context: impl Into<String>, source: ProcessError) -> Self {
        NestriError::Process {
            context: context.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        NestriError::Io {
            context: context.into(),
            source,
        }
    }

    #[cfg(test)]
    pub fn is_validation(&self) -> bool {
        matches!(self, NestriError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, NestriError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_carries_context() {
        let err = NestriError::process(
            "error starting existing Docker container",
            ProcessError::NotFound("docker".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "error starting existing Docker container: command 'docker' not found in PATH"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = NestriError::ReadinessTimeout {
            marker: "/tmp/.X11-unix".to_string(),
            waited: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "backend did not create /tmp/.X11-unix within 90s");
    }
}
