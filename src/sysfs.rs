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

//! Matching kernel bus devices to firmware device tree nodes.
//!
//! `/sys/bus/*/devices/<dev>/of_node` links into `/sys/firmware/devicetree`,
//! but the link text and the path we resolved through the device tree are
//! built independently, so devices are matched on (st_dev, st_ino) rather
//! than on path strings.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::constants::dt::MAX_STRING_LEN;
use crate::constants::sysfs::OF_NODE;
use crate::dt::{self, DeviceNode};

/// Whether both paths, after following symlinks, name the same inode.
pub fn same_device<A: AsRef<Path>, B: AsRef<Path>>(a: A, b: B) -> bool {
    match (fs::metadata(a.as_ref()), fs::metadata(b.as_ref())) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

/// Split an I2C client directory name `<bus>-<addr>` (address in 4 hex digits).
pub fn parse_i2c_device_name(name: &str) -> Option<(u32, u16)> {
    let (bus, addr) = name.split_once('-')?;
    if bus.is_empty() || addr.len() != 4 {
        return None;
    }
    let bus = bus.parse::<u32>().ok()?;
    let addr = u16::from_str_radix(addr, 16).ok()?;
    Some((bus, addr))
}

/// Read a sysfs text attribute of a device directory, newline trimmed.
pub fn read_attribute(device_dir: &Path, name: &str) -> Option<String> {
    dt::read_string(device_dir.join(name), MAX_STRING_LEN)
}

/// Scan of one bus device root for the device backing a firmware node.
#[derive(Debug)]
pub struct BusScan<'a> {
    bus_root: &'a Path,
    node: &'a DeviceNode,
    attribute: Option<(&'a str, &'a str)>,
}

impl<'a> BusScan<'a> {
    pub fn new(bus_root: &'a Path, node: &'a DeviceNode) -> Self {
        Self {
            bus_root,
            node,
            attribute: None,
        }
    }

    /// Additionally require the sysfs attribute `name` to read exactly `expected`.
    pub fn with_attribute(mut self, name: &'a str, expected: &'a str) -> Self {
        self.attribute = Some((name, expected));
        self
    }

    /// First device directory, in enumeration order, that passes `prefilter`
    /// on its name, links to the firmware node, carries the expected
    /// attribute and satisfies `accept`. Failing candidates are skipped.
    pub fn find<P, A>(&self, prefilter: P, accept: A) -> Option<PathBuf>
    where
        P: Fn(&str) -> bool,
        A: Fn(&Path) -> bool,
    {
        let entries = match fs::read_dir(self.bus_root) {
            Ok(it) => it,
            Err(e) => {
                debug!("Cannot list {}: {}", self.bus_root.display(), e);
                return None;
            }
        };
        for ent in entries.flatten() {
            let name = ent.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || !prefilter(&name) {
                continue;
            }
            let dir = self.bus_root.join(name.as_ref());
            trace!("Checking device {}", dir.display());
            if !same_device(dir.join(OF_NODE), self.node.path()) {
                continue;
            }
            debug!("Matched device {}", dir.display());

            if let Some((attr, expected)) = self.attribute {
                match read_attribute(&dir, attr) {
                    Some(found) if found == expected => {
                        debug!("matched {} '{}'", attr, found);
                    }
                    found => {
                        debug!(
                            "{}/{} {:?} does not match expected '{}', continuing",
                            dir.display(),
                            attr,
                            found,
                            expected
                        );
                        continue;
                    }
                }
            }
            if !accept(&dir) {
                continue;
            }
            return Some(dir);
        }
        None
    }
}
