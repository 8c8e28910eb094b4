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

//! Bootcount kept in a 32-bit SoC register: `BOOTCOUNT_MAGIC` high half,
//! counter low half.

use bc_error::{BootcountError, Result};
use tracing::{debug, info};

use super::BackendKind;
use crate::compatible::CompatibleList;
use crate::constants::record::REGISTER_MAGIC;
use crate::constants::registers::{self, am33xx, am62x, imx8m, imx93, stm32mp1, REG_SIZE};
use crate::mem::PhysicalMemory;

/// Write-protect gate in front of the counter register (TI RTC KICK registers).
///
/// Offsets are relative to the counter register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unlock {
    pub kick0: u64,
    pub kick1: u64,
    /// Write zero to KICK1 after the store to close the gate again
    pub relock: bool,
}

/// One memory-mapped register family.
#[derive(Debug, PartialEq, Eq)]
pub struct RegisterFamily {
    pub kind: BackendKind,
    /// Root compatible substrings identifying the SoC
    pub compatibles: &'static [&'static str],
    /// Physical address of the counter register
    pub address: u64,
    pub unlock: Option<Unlock>,
}

pub static AM33XX: RegisterFamily = RegisterFamily {
    kind: BackendKind::Am33xx,
    compatibles: &["ti,am33xx"],
    address: am33xx::BASE + am33xx::SCRATCH2,
    unlock: Some(Unlock {
        kick0: am33xx::KICK0R - am33xx::SCRATCH2,
        kick1: am33xx::KICK1R - am33xx::SCRATCH2,
        relock: false,
    }),
};

pub static AM62X: RegisterFamily = RegisterFamily {
    kind: BackendKind::Am62x,
    compatibles: &["ti,am625", "ti,am62a7"],
    address: am62x::BASE + am62x::SCRATCH2,
    unlock: Some(Unlock {
        kick0: am62x::KICK0R - am62x::SCRATCH2,
        kick1: am62x::KICK1R - am62x::SCRATCH2,
        relock: true,
    }),
};

pub static STM32MP1: RegisterFamily = RegisterFamily {
    kind: BackendKind::Stm32mp1,
    compatibles: &["st,stm32mp153", "st,stm32mp157"],
    address: stm32mp1::BASE + stm32mp1::BKP21R,
    unlock: None,
};

pub static IMX8M: RegisterFamily = RegisterFamily {
    kind: BackendKind::Imx8m,
    compatibles: &["fsl,imx8mm", "fsl,imx8mn", "fsl,imx8mp", "fsl,imx8mq"],
    address: imx8m::BASE + imx8m::LPGPR0,
    unlock: None,
};

pub static IMX93: RegisterFamily = RegisterFamily {
    kind: BackendKind::Imx93,
    compatibles: &["fsl,imx93"],
    address: imx93::BASE + imx93::GPR0,
    unlock: None,
};

/// Pack a counter value with the register magic.
pub fn encode(value: u16) -> u32 {
    (u32::from(REGISTER_MAGIC) << 16) | u32::from(value)
}

/// Unpack a register word, rejecting a foreign magic.
pub fn decode(word: u32) -> Result<u16> {
    let magic = (word >> 16) as u16;
    if magic != REGISTER_MAGIC {
        return Err(BootcountError::BadMagic {
            expected: u32::from(REGISTER_MAGIC),
            found: u32::from(magic),
        });
    }
    Ok((word & 0xffff) as u16)
}

impl RegisterFamily {
    /// Bytes to map: the counter register through the last gate register.
    pub fn window_len(&self) -> u64 {
        match self.unlock {
            Some(u) => u.kick0.max(u.kick1) + REG_SIZE,
            None => REG_SIZE,
        }
    }

    pub fn detect(&self, compat: &mut CompatibleList) -> bool {
        self.compatibles.iter().any(|c| compat.matches(c))
    }

    pub fn read(&self, mem: &dyn PhysicalMemory) -> Result<u16> {
        let window = mem.map_window(self.address, self.window_len())?;
        let word = window.read_u32(0);
        debug!("{} register {:#x} = {:#010x}", self.kind.name(), self.address, word);
        decode(word)
    }

    /// Store `value`, then read it back; the media give no other signal
    /// that a store was dropped.
    pub fn write(&self, mem: &dyn PhysicalMemory, value: u16) -> Result<()> {
        {
            let mut window = mem.map_window(self.address, self.window_len())?;
            if let Some(unlock) = self.unlock {
                window.write_u32(unlock.kick0, registers::KICK0_MAGIC);
                window.write_u32(unlock.kick1, registers::KICK1_MAGIC);
            }
            window.write_u32(0, encode(value));
            if let Some(Unlock { kick1, relock: true, .. }) = self.unlock {
                window.write_u32(kick1, 0);
            }
        }

        match self.read(mem) {
            Ok(found) if found == value => {
                info!("{}: bootcount set to {}", self.kind.name(), value);
                Ok(())
            }
            Ok(found) => Err(BootcountError::WriteVerification {
                expected: value,
                found: Some(found),
            }),
            Err(BootcountError::BadMagic { .. }) => Err(BootcountError::WriteVerification {
                expected: value,
                found: None,
            }),
            Err(e) => Err(e),
        }
    }
}
