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

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bc_error::{BootcountError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{eeprom, paths};

/// Location of the legacy, statically addressed I2C EEPROM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EepromConfig {
    pub bus: u8,
    pub address: u16,
    pub offset: u64,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            bus: eeprom::BUS,
            address: eeprom::ADDRESS,
            offset: eeprom::OFFSET,
        }
    }
}

/// Every filesystem input the backends consume. Defaults point at the
/// real kernel interfaces; tests and unusual targets relocate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub compatible_path: PathBuf,
    pub devicetree_root: PathBuf,
    pub i2c_devices_root: PathBuf,
    pub nvmem_devices_root: PathBuf,
    pub memory_device: PathBuf,
    pub eeprom: EepromConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compatible_path: PathBuf::from(paths::COMPATIBLE),
            devicetree_root: PathBuf::from(paths::DEVICETREE_ROOT),
            i2c_devices_root: PathBuf::from(paths::I2C_DEVICES),
            nvmem_devices_root: PathBuf::from(paths::NVMEM_DEVICES),
            memory_device: PathBuf::from(paths::MEMORY_DEVICE),
            eeprom: EepromConfig::default(),
        }
    }
}

impl Config {
    /// Sysfs data file of the legacy EEPROM, e.g. `/sys/bus/i2c/devices/2-0050/eeprom`
    pub fn legacy_eeprom_path(&self) -> PathBuf {
        self.i2c_devices_root
            .join(format!("{}-{:04x}", self.eeprom.bus, self.eeprom.address))
            .join(crate::constants::sysfs::EEPROM_DATA)
    }
}

pub fn config_path() -> PathBuf {
    match env::var_os(paths::CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from(paths::CONFIG_FILE),
    }
}

/// Load the system configuration. A missing file yields the defaults.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(BootcountError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let cfg: Config = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    let roots = [
        ("compatible_path", &cfg.compatible_path),
        ("devicetree_root", &cfg.devicetree_root),
        ("i2c_devices_root", &cfg.i2c_devices_root),
        ("nvmem_devices_root", &cfg.nvmem_devices_root),
        ("memory_device", &cfg.memory_device),
    ];
    for (field, path) in roots {
        if !path.is_absolute() {
            return Err(BootcountError::invalid_config(
                field,
                format!("{} is not an absolute path", path.display()),
            ));
        }
    }
    if cfg.eeprom.address > eeprom::MAX_ADDRESS {
        return Err(BootcountError::invalid_config(
            "eeprom.address",
            format!("{:#x} is not a 7-bit I2C address", cfg.eeprom.address),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_paths() {
        let cfg = Config::default();
        assert_eq!(cfg.compatible_path, PathBuf::from("/proc/device-tree/compatible"));
        assert_eq!(cfg.devicetree_root, PathBuf::from("/sys/firmware/devicetree/base"));
        assert_eq!(cfg.memory_device, PathBuf::from("/dev/mem"));
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_legacy_eeprom_path_format() {
        let cfg = Config::default();
        assert_eq!(
            cfg.legacy_eeprom_path(),
            PathBuf::from("/sys/bus/i2c/devices/2-0050/eeprom")
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "memory_device": "/tmp/fake-mem", "eeprom": {{ "bus": 1 }} }}"#).unwrap();

        let cfg = load_config_from(file.path()).unwrap();
        assert_eq!(cfg.memory_device, PathBuf::from("/tmp/fake-mem"));
        assert_eq!(cfg.eeprom.bus, 1);
        assert_eq!(cfg.eeprom.address, 0x50);
        assert_eq!(cfg.eeprom.offset, 0x100);
        assert_eq!(cfg.devicetree_root, PathBuf::from("/sys/firmware/devicetree/base"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "memory": "/dev/mem" }}"#).unwrap();
        assert!(matches!(
            load_config_from(file.path()),
            Err(BootcountError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.eeprom.address = 0x80;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.devicetree_root = PathBuf::from("relative/base");
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("devicetree_root"));
    }
}
