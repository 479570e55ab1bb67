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

//! In-memory stand-ins for the host, the config file and subprocesses.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::{Config, ConfigError, ConfigStore};
use crate::host::{HostEnv, Platform};
use crate::process::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner};

struct Scripted {
    key: String,
    outputs: VecDeque<ProcessOutput>,
}

/// Records every command and answers from canned responses.
///
/// A response applies to any command whose rendered form contains its key.
/// The first matching key wins; the last output of a sequence repeats.
/// Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    scripted: Mutex<Vec<Scripted>>,
    stream_codes: Vec<(String, Option<i32>)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, key: &str, output: ProcessOutput) -> Self {
        self.respond_seq(key, vec![output])
    }

    pub fn respond_seq(self, key: &str, outputs: Vec<ProcessOutput>) -> Self {
        self.scripted.lock().unwrap().push(Scripted {
            key: key.to_string(),
            outputs: outputs.into(),
        });
        self
    }

    pub fn stream_code(mut self, key: &str, code: Option<i32>) -> Self {
        self.stream_codes.push((key.to_string(), code));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_with_arg(&self, arg: &str) -> usize {
        self.calls().iter().filter(|c| c.has_arg(arg)).count()
    }

    fn record(&self, command: &CommandSpec) -> String {
        self.calls.lock().unwrap().push(command.clone());
        command.to_string()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn output(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let rendered = self.record(command);
        let mut scripted = self.scripted.lock().unwrap();
        let Some(entry) = scripted.iter_mut().find(|s| rendered.contains(&s.key)) else {
            return Ok(ProcessOutput::success(""));
        };
        let output = if entry.outputs.len() > 1 {
            entry.outputs.pop_front()
        } else {
            entry.outputs.front().cloned()
        };
        Ok(output.unwrap_or_default())
    }

    async fn stream(&self, command: &CommandSpec) -> Result<Option<i32>, ProcessError> {
        let rendered = self.record(command);
        let code = self
            .stream_codes
            .iter()
            .find(|(key, _)| rendered.contains(key.as_str()))
            .map_or(Some(0), |(_, code)| *code);
        Ok(code)
    }
}

/// Host with a fixed platform and home directory that never changes the
/// real working directory.
pub struct FakeHost {
    pub platform: Platform,
    pub home: Option<PathBuf>,
    pub entropy: Vec<u8>,
    root: bool,
    entropy_reads: AtomicUsize,
    changed_to: Mutex<Vec<PathBuf>>,
}

impl FakeHost {
    pub fn linux(home: impl Into<PathBuf>) -> Self {
        Self {
            platform: Platform::Linux,
            home: Some(home.into()),
            entropy: b"..Qx7!!pL2mN9#vR4tY8*wZ3kB6".repeat(4),
            root: false,
            entropy_reads: AtomicUsize::new(0),
            changed_to: Mutex::new(Vec::new()),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn entropy_reads(&self) -> usize {
        self.entropy_reads.load(Ordering::SeqCst)
    }

    pub fn changed_to(&self) -> Vec<PathBuf> {
        self.changed_to.lock().unwrap().clone()
    }
}

impl HostEnv for FakeHost {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn change_dir(&self, path: &Path) -> io::Result<PathBuf> {
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", path.display()),
            ));
        }
        self.changed_to.lock().unwrap().push(path.to_path_buf());
        Ok(path.to_path_buf())
    }

    fn entropy(&self) -> io::Result<Box<dyn Read + Send>> {
        self.entropy_reads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(self.entropy.clone())))
    }

    fn is_root(&self) -> bool {
        self.root
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<Config>,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn with_game(game: &str) -> Self {
        Self {
            config: Mutex::new(Config {
                game: Some(game.to_string()),
            }),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Config {
        self.config.lock().unwrap().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.current())
    }

    fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.config.lock().unwrap() = config.clone();
        Ok(())
    }
}
