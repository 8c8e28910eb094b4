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

//! uboot-bootcount - read and reset U-Boot's bootcount from Linux
//!
//! This library finds where the bootloader keeps its boot counter (a SoC
//! scratch register, an I2C EEPROM or an RTC's NVMEM) and reads or writes
//! it with the record format U-Boot expects.

pub mod backend;
pub mod compatible;
pub mod config;
pub mod constants;
pub mod dt;
pub mod logger;
pub mod mem;
pub mod platform;
pub mod sysfs;

pub use backend::{Backend, BackendKind};
pub use bc_error::{BootcountError, ErrorKind, Result};
pub use config::Config;
pub use platform::Platform;

#[cfg(test)]
pub mod test_utils;
