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

//! Device tree lookups over the kernel's exported property filesystem
//! (`/sys/firmware/devicetree/base`).
//!
//! Each node is a directory and each property a file holding the raw
//! big-endian property value. Only the property shapes the bootcount
//! drivers use are decoded: single u32 cells, strings and string lists.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::constants::dt::{
    BOOTCOUNT_PREFIX, CHOSEN_BOOTCOUNT, COMPATIBLE, LEGACY_PHANDLE, MAX_DEPTH, MAX_STRING_LEN,
    PHANDLE,
};

/// Firmware cross-reference key between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Phandle(pub u32);

/// Handle to a node directory. Properties are read on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    path: PathBuf,
}

impl DeviceNode {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn property_path(&self, property: &str) -> PathBuf {
        self.path.join(property)
    }

    /// Property as a big-endian u32, `None` when missing or shorter than a cell.
    pub fn read_u32(&self, property: &str) -> Option<u32> {
        read_u32(self.property_path(property))
    }

    /// Property as a string of at most `max_len` bytes, `None` when missing or empty.
    pub fn read_string(&self, property: &str, max_len: usize) -> Option<String> {
        read_string(self.property_path(property), max_len)
    }

    /// This node's own phandle, preferring `phandle` over `linux,phandle`.
    pub fn phandle(&self) -> Option<Phandle> {
        self.read_u32(PHANDLE)
            .or_else(|| self.read_u32(LEGACY_PHANDLE))
            .map(Phandle)
    }

    /// Entries of the `compatible` string list.
    pub fn compatible(&self) -> Vec<String> {
        match fs::read(self.property_path(COMPATIBLE)) {
            Ok(raw) => raw
                .split(|b| *b == 0)
                .filter(|s| !s.is_empty())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_compatible(&self, compat: &str) -> bool {
        self.compatible().iter().any(|c| c.contains(compat))
    }
}

/// Read a property file as a big-endian u32 (first cell).
pub fn read_u32<P: AsRef<Path>>(path: P) -> Option<u32> {
    let mut cell = [0u8; 4];
    let mut file = File::open(path.as_ref()).ok()?;
    file.read_exact(&mut cell).ok()?;
    Some(u32::from_be_bytes(cell))
}

/// Read a string property or sysfs attribute: bounded to `max_len` bytes,
/// cut at the first NUL, trailing newline removed.
pub fn read_string<P: AsRef<Path>>(path: P, max_len: usize) -> Option<String> {
    let file = File::open(path.as_ref()).ok()?;
    let mut raw = Vec::with_capacity(max_len.min(MAX_STRING_LEN));
    file.take(max_len as u64).read_to_end(&mut raw).ok()?;
    if let Some(nul) = raw.iter().position(|b| *b == 0) {
        raw.truncate(nul);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&raw).into_owned())
}

/// View of one exported device tree.
#[derive(Debug, Clone)]
pub struct DeviceTree {
    root: PathBuf,
}

impl DeviceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    /// Node at an absolute device tree path such as `/soc/i2c@1000/eeprom@50`.
    pub fn node_at(&self, dt_path: &str) -> Option<DeviceNode> {
        let rel = dt_path.trim_start_matches('/');
        let path = if rel.is_empty() { self.root.clone() } else { self.root.join(rel) };
        if path.is_dir() {
            Some(DeviceNode::new(path))
        } else {
            None
        }
    }

    /// Depth-first search for the first node satisfying `pred`.
    ///
    /// Symlinked directories are never entered and nodes deeper than
    /// `MAX_DEPTH` below the root are not visited, so a cyclic or absurdly
    /// nested tree terminates. Children are visited in directory
    /// enumeration order, which the kernel does not promise to keep stable.
    fn find_node<F>(&self, mut pred: F) -> Option<DeviceNode>
    where
        F: FnMut(&DeviceNode) -> bool,
    {
        let mut stack: Vec<(PathBuf, usize)> = vec![(self.root.clone(), 0)];
        while let Some((dir, depth)) = stack.pop() {
            let node = DeviceNode::new(dir);
            if pred(&node) {
                return Some(node);
            }
            if depth >= MAX_DEPTH {
                trace!("Depth cap reached at {}", node.path().display());
                continue;
            }
            let entries = match fs::read_dir(node.path()) {
                Ok(it) => it,
                Err(_) => continue,
            };
            let mut children: Vec<PathBuf> = entries
                .flatten()
                .filter(|ent| ent.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .map(|ent| ent.path())
                .collect();
            // Reverse so the first enumerated child is popped first.
            children.reverse();
            stack.extend(children.into_iter().map(|child| (child, depth + 1)));
        }
        None
    }

    /// Node whose `phandle` (or legacy `linux,phandle`) equals `phandle`.
    /// With duplicate phandles the first node in enumeration order wins.
    pub fn find_by_phandle(&self, phandle: Phandle) -> Option<DeviceNode> {
        let found = self.find_node(|node| node.phandle() == Some(phandle));
        match &found {
            Some(node) => debug!("phandle {} -> {}", phandle.0, node.path().display()),
            None => debug!("phandle {} not found under {}", phandle.0, self.root.display()),
        }
        found
    }

    /// Node whose raw `compatible` property starts with `prefix`.
    pub fn find_by_compatible_prefix(&self, prefix: &str) -> Option<DeviceNode> {
        self.find_node(|node| {
            fs::read(node.property_path(COMPATIBLE))
                .map(|raw| raw.starts_with(prefix.as_bytes()))
                .unwrap_or(false)
        })
    }

    /// Interpret the chosen bootcount property: an absolute node path
    /// string, or a 4-byte phandle as emitted for `&label` references.
    fn chosen_target(&self, raw: &[u8]) -> Option<DeviceNode> {
        if raw.first() == Some(&b'/') {
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            let dt_path = String::from_utf8_lossy(&raw[..end]);
            debug!("chosen bootcount-device path {}", dt_path);
            return self.node_at(&dt_path);
        }
        if raw.len() == 4 {
            let phandle = Phandle(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]));
            debug!("chosen bootcount-device phandle {}", phandle.0);
            return self.find_by_phandle(phandle);
        }
        None
    }

    /// Locate the bootcount node for the U-Boot driver `driver_compat`.
    ///
    /// Prefers `/chosen/u-boot,bootcount-device`, otherwise the first node
    /// compatible with `u-boot,bootcount*`. A node implemented by another
    /// driver is reported as absent so the next backend can be tried.
    pub fn resolve_chosen_bootcount_node(&self, driver_compat: &str) -> Option<DeviceNode> {
        let chosen = match fs::read(self.root.join(CHOSEN_BOOTCOUNT)) {
            Ok(raw) => {
                let node = self.chosen_target(&raw);
                if node.is_none() {
                    debug!("chosen bootcount-device does not resolve, searching by compatible");
                }
                node
            }
            Err(_) => None,
        };
        let node = chosen.or_else(|| self.find_by_compatible_prefix(BOOTCOUNT_PREFIX))?;
        if !node.is_compatible(driver_compat) {
            debug!(
                "bootcount node {} is not {} ({:?})",
                node.path().display(),
                driver_compat,
                node.compatible()
            );
            return None;
        }
        debug!("Found bootcount node {}", node.path().display());
        Some(node)
    }
}
