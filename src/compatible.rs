/*
 * This file is part of uboot-bootcount.
 *
 * Copyright (C) 2025 uboot-bootcount contributors
 *
 * uboot-bootcount is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uboot-bootcount is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uboot-bootcount. If not, see <https://www.gnu.org/licenses/>.
 */

//! SoC family detection from the root `compatible` property.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::constants::compatible::CAPACITY;

/// Lazily loaded copy of the board's `compatible` string list.
///
/// The file is read at most once successfully. An open failure or an
/// empty read leaves the cache unloaded so the next query retries, which
/// tolerates the property not being available yet early in boot.
#[derive(Debug)]
pub struct CompatibleList {
    path: PathBuf,
    buf: Vec<u8>,
    truncated: bool,
}

impl CompatibleList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buf: Vec::new(),
            truncated: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        !self.buf.is_empty()
    }

    /// True when the last load filled the buffer and entries may be missing.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn load(&mut self) {
        if self.is_loaded() {
            return;
        }
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                debug!("Cannot open {}: {}", self.path.display(), e);
                return;
            }
        };
        let mut buf = Vec::with_capacity(CAPACITY);
        // One byte is kept back so a full read can be told apart from an exact fit.
        if let Err(e) = file.take((CAPACITY - 1) as u64).read_to_end(&mut buf) {
            debug!("Cannot read {}: {}", self.path.display(), e);
            return;
        }
        if buf.is_empty() {
            return;
        }
        self.truncated = buf.len() == CAPACITY - 1;
        if self.truncated {
            warn!(
                "compatible string {} truncated to {} bytes",
                self.path.display(),
                buf.len()
            );
        }
        self.buf = buf;
        debug!("Read from {}:", self.path.display());
        for entry in self.entries() {
            debug!("  {}", entry);
        }
    }

    /// NUL-separated entries of the cached buffer, stopping at the first empty one.
    pub fn entries(&self) -> impl Iterator<Item = String> + '_ {
        self.buf
            .split(|b| *b == 0)
            .take_while(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
    }

    /// Whether any entry contains `substr`. Never fails: an unreadable
    /// property simply does not match.
    pub fn matches(&mut self, substr: &str) -> bool {
        self.load();
        let found = self.entries().any(|entry| entry.contains(substr));
        if found {
            trace!("   Found! {}", substr);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_matches_substring_of_any_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compatible");
        fs::write(&path, b"ti,am335x-bone-black\0ti,am335x-bone\0ti,am33xx\0").unwrap();

        let mut compat = CompatibleList::new(&path);
        assert!(compat.matches("ti,am33xx"));
        assert!(compat.matches("bone-black"));
        assert!(!compat.matches("fsl,imx8mm"));
        assert!(!compat.is_truncated());
    }

    #[test]
    fn test_match_does_not_span_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compatible");
        fs::write(&path, b"vendor,board\0st,stm32\0").unwrap();

        let mut compat = CompatibleList::new(&path);
        assert!(!compat.matches("board\0st"));
        assert!(!compat.matches("boardst"));
    }

    #[test]
    fn test_cached_after_first_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compatible");
        fs::write(&path, b"fsl,imx93\0").unwrap();

        let mut compat = CompatibleList::new(&path);
        assert!(compat.matches("fsl,imx93"));

        fs::write(&path, b"st,stm32mp157\0").unwrap();
        assert!(compat.matches("fsl,imx93"));
        assert!(!compat.matches("st,stm32mp157"));
    }

    #[test]
    fn test_missing_file_retried() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compatible");

        let mut compat = CompatibleList::new(&path);
        assert!(!compat.matches("ti,am625"));
        assert!(!compat.is_loaded());

        fs::write(&path, b"").unwrap();
        assert!(!compat.matches("ti,am625"));
        assert!(!compat.is_loaded());

        fs::write(&path, b"ti,am625-sk\0ti,am625\0").unwrap();
        assert!(compat.matches("ti,am625"));
        assert!(compat.is_loaded());
    }

    #[test]
    fn test_truncation_flagged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compatible");
        let mut data = Vec::new();
        while data.len() < CAPACITY * 2 {
            data.extend_from_slice(b"vendor,some-long-compatible-entry\0");
        }
        data.extend_from_slice(b"ti,am33xx\0");
        fs::write(&path, &data).unwrap();

        let mut compat = CompatibleList::new(&path);
        assert!(compat.matches("vendor,some-long"));
        assert!(compat.is_truncated());
        // The entry past the capacity was cut off.
        assert!(!compat.matches("ti,am33xx"));
    }
}
