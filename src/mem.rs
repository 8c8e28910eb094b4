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

//! Physical memory register access through `/dev/mem`.
//!
//! Registers are reached through a [`RegisterWindow`], which only offers
//! whole 32-bit volatile loads and stores. Each access is issued exactly
//! once, in program order, and is never merged, split or cached.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use bc_error::{BootcountError, Result};
use tracing::trace;

/// Fixed-width access to a run of memory-mapped registers.
///
/// Offsets are in bytes from the mapped physical address, 4-byte aligned
/// and inside the window; anything else is a programming error and panics.
#[cfg_attr(test, mockall::automock)]
pub trait RegisterWindow {
    fn read_u32(&self, offset: u64) -> u32;
    fn write_u32(&mut self, offset: u64, value: u32);
}

/// Source of register windows.
pub trait PhysicalMemory {
    /// Map `len` bytes starting at physical address `phys_addr`.
    fn map_window(&self, phys_addr: u64, len: u64) -> Result<Box<dyn RegisterWindow>>;
}

/// The privileged physical memory device.
#[derive(Debug, Clone)]
pub struct DevMem {
    path: PathBuf,
}

impl DevMem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if ps > 0 {
        ps as u64
    } else {
        4096
    }
}

impl PhysicalMemory for DevMem {
    fn map_window(&self, phys_addr: u64, len: u64) -> Result<Box<dyn RegisterWindow>> {
        let page = page_size();
        // mmap offsets must be page aligned; address the remainder inside the mapping.
        let page_base = phys_addr - phys_addr % page;
        let remainder = phys_addr - page_base;
        let map_len = (remainder + len) as usize;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&self.path)
            .map_err(|e| BootcountError::device(&self.path, e))?;

        // SAFETY: fresh shared mapping of an open descriptor; the result is
        // checked against MAP_FAILED before use.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                page_base as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(BootcountError::device(&self.path, io::Error::last_os_error()));
        }
        // The mapping stays valid after the descriptor is closed.
        drop(file);

        let base = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| BootcountError::device(&self.path, io::Error::from(io::ErrorKind::AddrNotAvailable)))?;
        trace!(
            "mapped {:#x}+{:#x} via page {:#x} ({} bytes)",
            phys_addr,
            len,
            page_base,
            map_len
        );
        Ok(Box::new(MmioWindow {
            base,
            map_len,
            remainder: remainder as usize,
            len,
        }))
    }
}

/// A live mapping of physical memory, unmapped on drop.
#[derive(Debug)]
pub struct MmioWindow {
    base: NonNull<u8>,
    map_len: usize,
    remainder: usize,
    len: u64,
}

impl MmioWindow {
    fn register(&self, offset: u64) -> *mut u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "register offset {:#x} outside {:#x}-byte window",
            offset,
            self.len
        );
        // SAFETY: in bounds of the mapping per the assertion above.
        unsafe { self.base.as_ptr().add(self.remainder + offset as usize).cast::<u32>() }
    }
}

impl RegisterWindow for MmioWindow {
    fn read_u32(&self, offset: u64) -> u32 {
        // SAFETY: aligned, in-bounds pointer into a live mapping.
        let raw = unsafe { ptr::read_volatile(self.register(offset)) };
        // Peripheral registers are little-endian.
        u32::from_le(raw)
    }

    fn write_u32(&mut self, offset: u64, value: u32) {
        // SAFETY: aligned, in-bounds pointer into a live mapping.
        unsafe { ptr::write_volatile(self.register(offset), value.to_le()) }
    }
}

impl Drop for MmioWindow {
    fn drop(&mut self) {
        // SAFETY: base/map_len describe exactly the region returned by mmap.
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.map_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn backing_file(dir: &TempDir, len: u64) -> PathBuf {
        let path = dir.path().join("mem");
        let file = fs::File::create(&path).unwrap();
        file.set_len(len).unwrap();
        path
    }

    #[test]
    fn test_window_addresses_unaligned_physical_offset() {
        let dir = TempDir::new().unwrap();
        let page = page_size();
        let path = backing_file(&dir, page * 2);
        let mem = DevMem::new(&path);
        let phys = page + 0x68;

        {
            let mut window = mem.map_window(phys, 12).unwrap();
            window.write_u32(0, 0xB001_0003);
            window.write_u32(4, 0x83E7_0B13);
            window.write_u32(8, 0x95A4_F1E0);
            assert_eq!(window.read_u32(0), 0xB001_0003);
        }

        let raw = fs::read(&path).unwrap();
        let at = (phys) as usize;
        assert_eq!(&raw[at..at + 4], &0xB001_0003u32.to_le_bytes());
        assert_eq!(&raw[at + 8..at + 12], &0x95A4_F1E0u32.to_le_bytes());

        let window = mem.map_window(phys + 4, 4).unwrap();
        assert_eq!(window.read_u32(0), 0x83E7_0B13);
    }

    #[test]
    fn test_open_failure_is_device_error() {
        let dir = TempDir::new().unwrap();
        let mem = DevMem::new(dir.path().join("no-such-mem"));
        let err = mem.map_window(0x1000, 4).err().unwrap();
        assert_eq!(err.kind(), bc_error::ErrorKind::Device);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_out_of_window_access_panics() {
        let dir = TempDir::new().unwrap();
        let path = backing_file(&dir, page_size());
        let window = DevMem::new(&path).map_window(0x10, 4).unwrap();
        window.read_u32(4);
    }
}
