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

//! Two-byte bootcount records in sysfs EEPROM/NVMEM files, plus the
//! legacy statically addressed I2C EEPROM backend.
//!
//! Layout at the record offset: byte 0 holds the low 8 bits of the
//! counter, byte 1 the magic. Writes are not read back; the sysfs
//! eeprom/nvmem drivers report I/O errors themselves, and the register
//! backends are the only ones verified.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use bc_error::{BootcountError, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::record::BYTE_RECORD_LEN;

/// Resolved location of a byte-file record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteLocation {
    pub path: PathBuf,
    pub offset: u64,
}

impl ByteLocation {
    pub fn new(path: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    fn open_at(&self, write: bool) -> Result<File> {
        let mut file = OpenOptions::new()
            .read(!write)
            .write(write)
            .open(&self.path)
            .map_err(|e| BootcountError::device(&self.path, e))?;
        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| BootcountError::device(&self.path, e))?;
        Ok(file)
    }

    /// Read the record and return its counter byte.
    pub fn read_record(&self, magic: u8) -> Result<u16> {
        let mut file = self.open_at(false)?;
        let mut bytes = [0u8; BYTE_RECORD_LEN];
        let mut filled = 0;
        while filled < bytes.len() {
            match file.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BootcountError::device(&self.path, e)),
            }
        }
        if filled != bytes.len() {
            return Err(BootcountError::ShortIo {
                path: self.path.clone(),
                expected: bytes.len(),
                actual: filled,
            });
        }
        debug!("{} @ {:#x}: {:02x?}", self.path.display(), self.offset, bytes);

        // U-Boot's driver resets the counter on a bad magic; here a read
        // never writes, the caller decides.
        if bytes[1] != magic {
            return Err(BootcountError::BadMagic {
                expected: u32::from(magic),
                found: u32::from(bytes[1]),
            });
        }
        Ok(u16::from(bytes[0]))
    }

    /// Write the record unconditionally. Only the low 8 bits of `value` fit.
    pub fn write_record(&self, magic: u8, value: u16) -> Result<()> {
        if value > u16::from(u8::MAX) {
            warn!(
                "bootcount {} does not fit the one-byte record, storing {}",
                value,
                value & 0xff
            );
        }
        let bytes = [(value & 0xff) as u8, magic];
        let mut file = self.open_at(true)?;
        let written = file
            .write(&bytes)
            .map_err(|e| BootcountError::device(&self.path, e))?;
        if written != bytes.len() {
            return Err(BootcountError::ShortIo {
                path: self.path.clone(),
                expected: bytes.len(),
                actual: written,
            });
        }
        info!("{} @ {:#x}: bootcount set to {}", self.path.display(), self.offset, bytes[0]);
        Ok(())
    }
}

/// Location of the legacy EEPROM record, present only when the sysfs file exists.
pub fn detect_legacy(config: &Config) -> Option<ByteLocation> {
    let path = config.legacy_eeprom_path();
    if !path.exists() {
        debug!("legacy EEPROM {} not present", path.display());
        return None;
    }
    Some(ByteLocation::new(path, config.eeprom.offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::record::BYTE_MAGIC;
    use crate::test_utils::test_utils::DtFixture;
    use bc_error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn eeprom_file(dir: &TempDir, len: usize) -> PathBuf {
        let path = dir.path().join("eeprom");
        fs::write(&path, vec![0xffu8; len]).unwrap();
        path
    }

    #[test]
    fn test_record_layout_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = eeprom_file(&dir, 64);
        let loc = ByteLocation::new(&path, 0x30);

        loc.write_record(BYTE_MAGIC, 3).unwrap();
        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[0x30..0x32], &[3, 0xBC]);
        assert_eq!(raw[0x2f], 0xff);
        assert_eq!(raw[0x32], 0xff);
        assert_eq!(raw.len(), 64);
    }

    #[test]
    fn test_round_trip_and_truncation() {
        let dir = TempDir::new().unwrap();
        let loc = ByteLocation::new(eeprom_file(&dir, 16), 4);

        for value in [0u16, 1] {
            loc.write_record(BYTE_MAGIC, value).unwrap();
            assert_eq!(loc.read_record(BYTE_MAGIC).unwrap(), value);
        }
        // Unverified medium: a value wider than the record comes back truncated.
        loc.write_record(BYTE_MAGIC, 65534).unwrap();
        assert_eq!(loc.read_record(BYTE_MAGIC).unwrap(), 254);
    }

    #[test]
    fn test_bad_magic_not_reset() {
        let dir = TempDir::new().unwrap();
        let path = eeprom_file(&dir, 16);
        let loc = ByteLocation::new(&path, 0);

        for counter in [0u8, 7, 0xff] {
            fs::write(&path, [counter, 0xBD]).unwrap();
            let err = loc.read_record(BYTE_MAGIC).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadMagic);
            assert_eq!(fs::read(&path).unwrap(), vec![counter, 0xBD]);
        }
    }

    #[test]
    fn test_short_read_is_device_error() {
        let dir = TempDir::new().unwrap();
        let loc = ByteLocation::new(eeprom_file(&dir, 8), 7);
        let err = loc.read_record(BYTE_MAGIC).unwrap_err();
        assert!(matches!(err, BootcountError::ShortIo { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_missing_file_is_device_error() {
        let dir = TempDir::new().unwrap();
        let loc = ByteLocation::new(dir.path().join("gone"), 0);
        assert_eq!(loc.read_record(BYTE_MAGIC).unwrap_err().kind(), ErrorKind::Device);
        assert_eq!(loc.write_record(BYTE_MAGIC, 1).unwrap_err().kind(), ErrorKind::Device);
    }

    #[test]
    fn test_detect_legacy_by_path() {
        let fx = DtFixture::new();
        let cfg = fx.config();
        assert!(detect_legacy(&cfg).is_none());

        fx.legacy_eeprom(&cfg);
        let loc = detect_legacy(&cfg).unwrap();
        assert_eq!(loc.path, fx.i2c_root().join("2-0050/eeprom"));
        assert_eq!(loc.offset, 0x100);
    }
}
