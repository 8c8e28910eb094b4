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

//! Storage backends for the bootcount.
//!
//! Register backends are tied to a SoC family and found through the root
//! compatible string. The DM backends follow U-Boot's driver model device
//! tree nodes to a sysfs data file. The legacy backend is a fixed EEPROM.

pub mod dm_eeprom;
pub mod dm_rtc;
pub mod eeprom;
pub mod register;

use bc_error::Result;

use crate::constants::record::BYTE_MAGIC;
use crate::mem::PhysicalMemory;

pub use eeprom::ByteLocation;
pub use register::RegisterFamily;

/// Every backend, independent of whether it was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Am33xx,
    Am62x,
    Stm32mp1,
    Imx8m,
    Imx93,
    DmI2cEeprom,
    DmRtc,
    I2cEeprom,
}

impl BackendKind {
    /// Detection order. The first backend that detects wins.
    pub const PRIORITY: [BackendKind; 8] = [
        BackendKind::Am33xx,
        BackendKind::Am62x,
        BackendKind::Stm32mp1,
        BackendKind::Imx8m,
        BackendKind::Imx93,
        BackendKind::DmI2cEeprom,
        BackendKind::DmRtc,
        BackendKind::I2cEeprom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Am33xx => "TI AM335x",
            BackendKind::Am62x => "TI AM62x",
            BackendKind::Stm32mp1 => "STM32MP1",
            BackendKind::Imx8m => "IMX8M",
            BackendKind::Imx93 => "IMX93",
            BackendKind::DmI2cEeprom => "DM I2C EEPROM",
            BackendKind::DmRtc => "DM RTC",
            BackendKind::I2cEeprom => "I2C EEPROM",
        }
    }

    /// Register family for the SoC backends.
    pub fn register_family(self) -> Option<&'static RegisterFamily> {
        match self {
            BackendKind::Am33xx => Some(&register::AM33XX),
            BackendKind::Am62x => Some(&register::AM62X),
            BackendKind::Stm32mp1 => Some(&register::STM32MP1),
            BackendKind::Imx8m => Some(&register::IMX8M),
            BackendKind::Imx93 => Some(&register::IMX93),
            BackendKind::DmI2cEeprom | BackendKind::DmRtc | BackendKind::I2cEeprom => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A detected backend together with everything discovery resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Register(&'static RegisterFamily),
    DmI2cEeprom(ByteLocation),
    DmRtc(ByteLocation),
    I2cEeprom(ByteLocation),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Register(family) => family.kind,
            Backend::DmI2cEeprom(_) => BackendKind::DmI2cEeprom,
            Backend::DmRtc(_) => BackendKind::DmRtc,
            Backend::I2cEeprom(_) => BackendKind::I2cEeprom,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// The sysfs file holding the record, for the file-backed kinds.
    pub fn location(&self) -> Option<&ByteLocation> {
        match self {
            Backend::Register(_) => None,
            Backend::DmI2cEeprom(loc) | Backend::DmRtc(loc) | Backend::I2cEeprom(loc) => Some(loc),
        }
    }

    pub fn read(&self, mem: &dyn PhysicalMemory) -> Result<u16> {
        match self {
            Backend::Register(family) => family.read(mem),
            Backend::DmI2cEeprom(loc) | Backend::DmRtc(loc) | Backend::I2cEeprom(loc) => {
                loc.read_record(BYTE_MAGIC)
            }
        }
    }

    pub fn write(&self, mem: &dyn PhysicalMemory, value: u16) -> Result<()> {
        match self {
            Backend::Register(family) => family.write(mem, value),
            Backend::DmI2cEeprom(loc) | Backend::DmRtc(loc) | Backend::I2cEeprom(loc) => {
                loc.write_record(BYTE_MAGIC, value)
            }
        }
    }
}
