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

//! Driver-model RTC bootcount (`u-boot,bootcount-rtc`) through the RTC's
//! Linux NVMEM provider.
//!
//! ```text
//! bootcount_rv3028: bc_rv3028 {
//!     compatible = "u-boot,bootcount-rtc";
//!     rtc = <&i2c_som_rtc>;
//!     offset = <0x1F>;
//!     linux,nvmem-offset = <0x00>;
//!     linux,nvmem-type = "Battery backed";
//! };
//! ```
//!
//! `offset` addresses the RTC's registers from U-Boot; Linux exposes user
//! RAM as its own nvmem region, so `linux,nvmem-offset` wins when present.
//! One RTC may register several regions (rv3028: "Battery backed" and
//! "EEPROM"); `linux,nvmem-type` picks the one U-Boot uses.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::ByteLocation;
use crate::constants::dt::{BOOTCOUNT_RTC, NVMEM_OFFSET, NVMEM_TYPE, OFFSET, RTC};
use crate::constants::record::BYTE_RECORD_LEN;
use crate::constants::sysfs;
use crate::dt::{DeviceTree, Phandle};
use crate::sysfs::BusScan;

const NVMEM_TYPE_MAX: usize = 64;

/// Resolve the RTC nvmem file and offset, or `None` when this board does not use one.
pub fn discover(tree: &DeviceTree, nvmem_root: &Path) -> Option<ByteLocation> {
    debug!("Discovering DM RTC bootcount device");
    if !tree.is_available() || !nvmem_root.is_dir() {
        debug!("Required sysfs paths missing; DM RTC unsupported");
        return None;
    }

    let bc_node = tree.resolve_chosen_bootcount_node(BOOTCOUNT_RTC)?;
    let nvmem_type = bc_node.read_string(NVMEM_TYPE, NVMEM_TYPE_MAX);
    if let Some(t) = &nvmem_type {
        debug!("found linux,nvmem-type '{}'", t);
    }

    let mut offset = u64::from(bc_node.read_u32(OFFSET).unwrap_or(0));
    if let Some(nvmem_offset) = bc_node.read_u32(NVMEM_OFFSET) {
        offset = u64::from(nvmem_offset);
        debug!("found linux,nvmem-offset {:#x}", offset);
    }
    debug!("using offset {:#x}", offset);

    let rtc_phandle = Phandle(bc_node.read_u32(RTC)?);
    let rtc_node = tree.find_by_phandle(rtc_phandle)?;

    let mut scan = BusScan::new(nvmem_root, &rtc_node);
    if let Some(t) = nvmem_type.as_deref() {
        scan = scan.with_attribute(sysfs::NVMEM_TYPE, t);
    }
    let needed = offset + BYTE_RECORD_LEN as u64;
    let device = scan.find(
        |_| true,
        |dir| match fs::metadata(dir.join(sysfs::NVMEM_DATA)) {
            Ok(meta) if meta.len() >= needed => true,
            Ok(meta) => {
                debug!(
                    "nvmem size {} too small for offset {:#x}, continuing",
                    meta.len(),
                    offset
                );
                false
            }
            Err(_) => {
                debug!("{} has no nvmem file, continuing", dir.display());
                false
            }
        },
    )?;
    let path = device.join(sysfs::NVMEM_DATA);
    debug!("Chose RTC nvmem {}", path.display());
    Some(ByteLocation::new(path, offset))
}
