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

//! Driver-model I2C EEPROM bootcount (`u-boot,bootcount-i2c-eeprom`).
//!
//! ```text
//! chosen {
//!     u-boot,bootcount-device = &bootcount_i2c_eeprom;
//! };
//! bootcount_i2c_eeprom: bc_i2c_eeprom {
//!     compatible = "u-boot,bootcount-i2c-eeprom";
//!     i2c-eeprom = <&eeprom0>;
//!     offset = <0x30>;
//! };
//! ```
//!
//! The referenced EEPROM node is matched to `/sys/bus/i2c/devices/<bus>-<addr>`
//! and its `eeprom` file holds the record.

use std::path::Path;

use tracing::debug;

use super::ByteLocation;
use crate::constants::dt::{BOOTCOUNT_I2C_EEPROM, I2C_EEPROM, OFFSET, REG};
use crate::constants::sysfs::EEPROM_DATA;
use crate::dt::{DeviceTree, Phandle};
use crate::sysfs::{parse_i2c_device_name, BusScan};

/// Resolve the EEPROM file and offset, or `None` when this board does not use one.
pub fn discover(tree: &DeviceTree, i2c_root: &Path) -> Option<ByteLocation> {
    debug!("Discovering DM I2C EEPROM bootcount device");
    if !tree.is_available() || !i2c_root.is_dir() {
        debug!("Required sysfs paths missing; DM EEPROM unsupported");
        return None;
    }

    let bc_node = tree.resolve_chosen_bootcount_node(BOOTCOUNT_I2C_EEPROM)?;
    let offset = u64::from(bc_node.read_u32(OFFSET).unwrap_or(0));
    debug!("Using offset {:#x}", offset);

    let eeprom_phandle = Phandle(bc_node.read_u32(I2C_EEPROM)?);
    let eeprom_node = tree.find_by_phandle(eeprom_phandle)?;
    let slave_addr = eeprom_node.read_u32(REG)? & 0xff;
    debug!("EEPROM I2C address {:#04x}", slave_addr);

    let device = BusScan::new(i2c_root, &eeprom_node).find(
        |name| match parse_i2c_device_name(name) {
            Some((_, addr)) => u32::from(addr & 0xff) == slave_addr,
            None => false,
        },
        |dir| dir.join(EEPROM_DATA).exists(),
    )?;
    let path = device.join(EEPROM_DATA);
    debug!("Chose EEPROM device {}", path.display());
    Some(ByteLocation::new(path, offset))
}
