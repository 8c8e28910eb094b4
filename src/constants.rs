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

//! Constants and configuration defaults for uboot-bootcount
//!
//! Centralizes magic numbers, paths, and register addresses so backends
//! never carry literals of their own.

/// Default filesystem locations
pub mod paths {
    /// Root compatible property of the running board
    pub const COMPATIBLE: &str = "/proc/device-tree/compatible";

    /// Flattened device tree exported by the kernel
    pub const DEVICETREE_ROOT: &str = "/sys/firmware/devicetree/base";

    /// Kernel I2C bus devices
    pub const I2C_DEVICES: &str = "/sys/bus/i2c/devices";

    /// Kernel NVMEM bus devices
    pub const NVMEM_DEVICES: &str = "/sys/bus/nvmem/devices";

    /// Physical memory device
    pub const MEMORY_DEVICE: &str = "/dev/mem";

    /// System configuration file
    pub const CONFIG_FILE: &str = "/etc/uboot-bootcount.json";

    /// Environment variable overriding [`CONFIG_FILE`]
    pub const CONFIG_ENV: &str = "BOOTCOUNT_CONFIG";

    /// Structured event log
    pub const EVENT_LOG: &str = "/var/log/bootcount.json";
    pub const EVENT_LOG_FALLBACK: &str = "/tmp/bootcount_logs.json";
}

/// Device tree property and node names
pub mod dt {
    pub const PHANDLE: &str = "phandle";
    pub const LEGACY_PHANDLE: &str = "linux,phandle";
    pub const COMPATIBLE: &str = "compatible";
    pub const REG: &str = "reg";
    pub const OFFSET: &str = "offset";
    pub const I2C_EEPROM: &str = "i2c-eeprom";
    pub const RTC: &str = "rtc";
    pub const NVMEM_OFFSET: &str = "linux,nvmem-offset";
    pub const NVMEM_TYPE: &str = "linux,nvmem-type";

    /// Chosen-node property naming the bootcount device
    pub const CHOSEN_BOOTCOUNT: &str = "chosen/u-boot,bootcount-device";

    /// Compatible prefix shared by all U-Boot bootcount nodes
    pub const BOOTCOUNT_PREFIX: &str = "u-boot,bootcount";
    pub const BOOTCOUNT_I2C_EEPROM: &str = "u-boot,bootcount-i2c-eeprom";
    pub const BOOTCOUNT_RTC: &str = "u-boot,bootcount-rtc";

    /// Traversal depth cap for phandle/compatible searches
    pub const MAX_DEPTH: usize = 8;

    /// Longest string property we care about (nvmem type names and paths)
    pub const MAX_STRING_LEN: usize = 256;
}

/// Sysfs attribute names
pub mod sysfs {
    pub const OF_NODE: &str = "of_node";
    pub const NVMEM_TYPE: &str = "type";
    pub const NVMEM_DATA: &str = "nvmem";
    pub const EEPROM_DATA: &str = "eeprom";
}

/// Compatible-string cache sizing
pub mod compatible {
    /// Buffer capacity; a read that fills `CAPACITY - 1` bytes is flagged as truncated
    pub const CAPACITY: usize = 512;
}

/// Boot counter record layout
pub mod record {
    /// U-Boot BOOTCOUNT_MAGIC (include/common.h)
    pub const BOOTCOUNT_MAGIC: u32 = 0xB001_C041;

    /// Magic stored in the high half of a 32-bit register record
    pub const REGISTER_MAGIC: u16 = (BOOTCOUNT_MAGIC >> 16) as u16;

    /// Magic byte used by U-Boot's i2c, dm_i2c and rtc bootcount drivers
    pub const BYTE_MAGIC: u8 = 0xBC;

    /// Bytes occupied by a byte-file record: counter, magic
    pub const BYTE_RECORD_LEN: usize = 2;
}

/// Physical register map of the memory-mapped families
pub mod registers {
    pub const REG_SIZE: u64 = 4;

    /// RTC KICK0R/KICK1R unlock values (TI RTCSS)
    pub const KICK0_MAGIC: u32 = 0x83E7_0B13;
    pub const KICK1_MAGIC: u32 = 0x95A4_F1E0;

    /// TI AM335x RTCSS (spruh73p 20.3.5.22-24)
    pub mod am33xx {
        pub const BASE: u64 = 0x44E3_E000;
        pub const SCRATCH2: u64 = 0x68;
        pub const KICK0R: u64 = 0x6C;
        pub const KICK1R: u64 = 0x70;
    }

    /// TI AM62x RTC (spruiv7 14.8.7.3.12 / 14.8.7.3.19)
    pub mod am62x {
        pub const BASE: u64 = 0x2B1F_0000;
        pub const SCRATCH2: u64 = 0x30 + 2 * super::REG_SIZE;
        pub const KICK0R: u64 = 0x70;
        pub const KICK1R: u64 = 0x74;
    }

    /// STM32MP1 TAMP backup register 21
    pub mod stm32mp1 {
        pub const BASE: u64 = 0x5C00_A100;
        pub const BKP21R: u64 = 0x54;
    }

    /// i.MX8M SNVS LPGPR0 alias
    pub mod imx8m {
        pub const BASE: u64 = 0x3037_0000;
        pub const LPGPR0: u64 = 0x90;
    }

    /// i.MX93 BBNSM GPR0
    pub mod imx93 {
        pub const BASE: u64 = 0x4444_0000;
        pub const GPR0: u64 = 0x300;
    }
}

/// Legacy static-path I2C EEPROM defaults
pub mod eeprom {
    pub const BUS: u8 = 2;
    pub const ADDRESS: u16 = 0x50;
    pub const OFFSET: u64 = 0x100;
    /// Largest 7-bit I2C slave address
    pub const MAX_ADDRESS: u16 = 0x7F;
}
