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

//! Host facilities the run workflow depends on besides subprocesses.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const ENTROPY_DEVICE: &str = "/dev/urandom";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
    Other,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::MacOS => "macos",
            Platform::Windows => "windows",
            Platform::Other => std::env::consts::OS,
        };
        f.write_str(name)
    }
}

pub trait HostEnv: Send + Sync {
    fn platform(&self) -> Platform;

    fn home_dir(&self) -> Option<PathBuf>;

    /// Make `path` the working directory and return the resolved directory.
    fn change_dir(&self, path: &Path) -> io::Result<PathBuf>;

    /// Open a fresh stream of random bytes.
    fn entropy(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Whether commands already run with root privileges.
    fn is_root(&self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl HostEnv for SystemHost {
    fn platform(&self) -> Platform {
        Platform::current()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn change_dir(&self, path: &Path) -> io::Result<PathBuf> {
        std::env::set_current_dir(path)?;
        std::env::current_dir()
    }

    fn entropy(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(ENTROPY_DEVICE)?))
    }

    #[cfg(unix)]
    fn is_root(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(not(unix))]
    fn is_root(&self) -> bool {
        false
    }
}
