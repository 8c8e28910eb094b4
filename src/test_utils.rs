/*
 * Test utilities and fixtures for uboot-bootcount
 *
 * This module provides a scratch device tree / sysfs layout builder and
 * simulated physical memory that can be used across different test modules.
 */

#[cfg(test)]
pub mod test_utils {
    use crate::config::Config;
    use crate::constants::registers::{KICK0_MAGIC, KICK1_MAGIC};
    use crate::dt::{DeviceNode, DeviceTree};
    use crate::mem::{PhysicalMemory, RegisterWindow};
    use bc_error::{BootcountError, Result};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::fs;
    use std::io;
    use std::os::unix::fs::symlink;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Size of the eeprom file created for fixture I2C devices
    pub const FIXTURE_EEPROM_SIZE: usize = 512;

    /// Scratch root holding a device tree (`base/`), I2C and NVMEM bus
    /// device roots (`i2c/`, `nvmem/`) and a root compatible file.
    pub struct DtFixture {
        dir: TempDir,
    }

    impl DtFixture {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            for sub in ["base", "i2c", "nvmem"] {
                fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            Self { dir }
        }

        pub fn dt_root(&self) -> PathBuf {
            self.dir.path().join("base")
        }

        pub fn i2c_root(&self) -> PathBuf {
            self.dir.path().join("i2c")
        }

        pub fn nvmem_root(&self) -> PathBuf {
            self.dir.path().join("nvmem")
        }

        pub fn compatible_path(&self) -> PathBuf {
            self.dir.path().join("compatible")
        }

        pub fn tree(&self) -> DeviceTree {
            DeviceTree::new(self.dt_root())
        }

        /// Create (if needed) the node directory at `rel` below the tree root.
        pub fn node(&self, rel: &str) -> DeviceNode {
            let path = self.dt_root().join(rel);
            fs::create_dir_all(&path).unwrap();
            DeviceNode::new(path)
        }

        /// Write a raw property file.
        pub fn prop(&self, node_rel: &str, name: &str, value: &[u8]) {
            let node = self.node(node_rel);
            fs::write(node.property_path(name), value).unwrap();
        }

        pub fn phandle(&self, node_rel: &str, phandle: u32) {
            self.prop(node_rel, "phandle", &phandle.to_be_bytes());
        }

        /// Root compatible list, NUL separated and terminated.
        pub fn compatible(&self, entries: &[&str]) {
            let mut raw = Vec::new();
            for e in entries {
                raw.extend_from_slice(e.as_bytes());
                raw.push(0);
            }
            fs::write(self.compatible_path(), raw).unwrap();
        }

        /// I2C client directory linked to `node`, with an erased eeprom file.
        pub fn i2c_device(&self, name: &str, node: &DeviceNode) -> PathBuf {
            let dir = self.i2c_root().join(name);
            fs::create_dir_all(&dir).unwrap();
            symlink(node.path(), dir.join("of_node")).unwrap();
            fs::write(dir.join("eeprom"), vec![0xffu8; FIXTURE_EEPROM_SIZE]).unwrap();
            dir
        }

        /// NVMEM provider directory linked to `node` with a `type` attribute
        /// and a zeroed `nvmem` file of `size` bytes.
        pub fn nvmem_device(&self, name: &str, node: &DeviceNode, nvmem_type: &str, size: usize) -> PathBuf {
            let dir = self.nvmem_root().join(name);
            fs::create_dir_all(&dir).unwrap();
            symlink(node.path(), dir.join("of_node")).unwrap();
            fs::write(dir.join("type"), format!("{}\n", nvmem_type)).unwrap();
            fs::write(dir.join("nvmem"), vec![0u8; size]).unwrap();
            dir
        }

        /// Erased legacy EEPROM at the path `cfg` expects; returns the data file.
        pub fn legacy_eeprom(&self, cfg: &Config) -> PathBuf {
            let path = cfg.legacy_eeprom_path();
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, vec![0xffu8; FIXTURE_EEPROM_SIZE]).unwrap();
            path
        }

        /// Configuration pointing every input into this fixture.
        pub fn config(&self) -> Config {
            Config {
                compatible_path: self.compatible_path(),
                devicetree_root: self.dt_root(),
                i2c_devices_root: self.i2c_root(),
                nvmem_devices_root: self.nvmem_root(),
                memory_device: self.dir.path().join("mem"),
                ..Config::default()
            }
        }
    }

    #[derive(Default)]
    struct SimState {
        words: RefCell<HashMap<u64, u32>>,
        gate: Cell<Option<(u64, u64, u64)>>,
        stuck: RefCell<HashSet<u64>>,
        maps: Cell<usize>,
    }

    impl SimState {
        fn store(&self, addr: u64, value: u32) {
            if self.stuck.borrow().contains(&addr) {
                return;
            }
            if let Some((target, kick0, kick1)) = self.gate.get() {
                let words = self.words.borrow();
                let open = words.get(&kick0) == Some(&KICK0_MAGIC) && words.get(&kick1) == Some(&KICK1_MAGIC);
                if addr == target && !open {
                    return;
                }
            }
            self.words.borrow_mut().insert(addr, value);
        }
    }

    /// Physical address space backed by a map of 32-bit words, zero when unset.
    #[derive(Clone, Default)]
    pub struct SimMemory {
        state: Rc<SimState>,
    }

    impl SimMemory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Drop stores to `target` unless both kick registers hold their magic.
        pub fn gate(&self, target: u64, kick0: u64, kick1: u64) {
            self.state.gate.set(Some((target, kick0, kick1)));
        }

        /// Set a word directly, bypassing gates.
        pub fn set(&self, addr: u64, value: u32) {
            self.state.words.borrow_mut().insert(addr, value);
        }

        pub fn get(&self, addr: u64) -> u32 {
            self.state.words.borrow().get(&addr).copied().unwrap_or(0)
        }

        /// Make `addr` ignore every store.
        pub fn stick(&self, addr: u64) {
            self.state.stuck.borrow_mut().insert(addr);
        }

        pub fn map_count(&self) -> usize {
            self.state.maps.get()
        }
    }

    struct SimWindow {
        base: u64,
        len: u64,
        state: Rc<SimState>,
    }

    impl SimWindow {
        fn addr(&self, offset: u64) -> u64 {
            assert!(offset % 4 == 0 && offset + 4 <= self.len, "offset {:#x} outside window", offset);
            self.base + offset
        }
    }

    impl RegisterWindow for SimWindow {
        fn read_u32(&self, offset: u64) -> u32 {
            let addr = self.addr(offset);
            self.state.words.borrow().get(&addr).copied().unwrap_or(0)
        }

        fn write_u32(&mut self, offset: u64, value: u32) {
            let addr = self.addr(offset);
            self.state.store(addr, value);
        }
    }

    impl PhysicalMemory for SimMemory {
        fn map_window(&self, phys_addr: u64, len: u64) -> Result<Box<dyn RegisterWindow>> {
            self.state.maps.set(self.state.maps.get() + 1);
            Ok(Box::new(SimWindow {
                base: phys_addr,
                len,
                state: Rc::clone(&self.state),
            }))
        }
    }

    /// Hands out prepared windows in order and records each mapping request.
    pub struct QueuedMemory {
        windows: RefCell<VecDeque<Box<dyn RegisterWindow>>>,
        requests: RefCell<Vec<(u64, u64)>>,
    }

    impl QueuedMemory {
        pub fn new(windows: Vec<Box<dyn RegisterWindow>>) -> Self {
            Self {
                windows: RefCell::new(windows.into()),
                requests: RefCell::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<(u64, u64)> {
            self.requests.borrow().clone()
        }
    }

    impl PhysicalMemory for QueuedMemory {
        fn map_window(&self, phys_addr: u64, len: u64) -> Result<Box<dyn RegisterWindow>> {
            self.requests.borrow_mut().push((phys_addr, len));
            self.windows.borrow_mut().pop_front().ok_or_else(|| {
                BootcountError::device(
                    "queued-memory",
                    io::Error::new(io::ErrorKind::Other, "no window queued"),
                )
            })
        }
    }
}
