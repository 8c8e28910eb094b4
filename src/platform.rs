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

//! Backend selection.
//!
//! A [`Platform`] evaluates the backends in [`BackendKind::PRIORITY`] order,
//! commits to the first one present and keeps the result, including any
//! discovered sysfs path, for the rest of its life.

use bc_error::{BootcountError, Result};
use tracing::{debug, info};

use crate::backend::{dm_eeprom, dm_rtc, eeprom, Backend, BackendKind};
use crate::compatible::CompatibleList;
use crate::config::Config;
use crate::dt::DeviceTree;
use crate::mem::{DevMem, PhysicalMemory};

pub struct Platform {
    config: Config,
    compat: CompatibleList,
    tree: DeviceTree,
    memory: Box<dyn PhysicalMemory>,
    detected: Option<Backend>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("config", &self.config)
            .field("detected", &self.detected)
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// Platform backed by the configured physical memory device.
    pub fn new(config: Config) -> Self {
        let memory = DevMem::new(&config.memory_device);
        Self::with_memory(config, Box::new(memory))
    }

    pub fn with_memory(config: Config, memory: Box<dyn PhysicalMemory>) -> Self {
        Self {
            compat: CompatibleList::new(&config.compatible_path),
            tree: DeviceTree::new(&config.devicetree_root),
            config,
            memory,
            detected: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn probe(&mut self, kind: BackendKind) -> Option<Backend> {
        match kind {
            BackendKind::Am33xx
            | BackendKind::Am62x
            | BackendKind::Stm32mp1
            | BackendKind::Imx8m
            | BackendKind::Imx93 => {
                let family = kind.register_family()?;
                family.detect(&mut self.compat).then_some(Backend::Register(family))
            }
            BackendKind::DmI2cEeprom => {
                dm_eeprom::discover(&self.tree, &self.config.i2c_devices_root).map(Backend::DmI2cEeprom)
            }
            BackendKind::DmRtc => {
                dm_rtc::discover(&self.tree, &self.config.nvmem_devices_root).map(Backend::DmRtc)
            }
            BackendKind::I2cEeprom => eeprom::detect_legacy(&self.config).map(Backend::I2cEeprom),
        }
    }

    fn select(&mut self) -> Result<Backend> {
        let mut checked = Vec::with_capacity(BackendKind::PRIORITY.len());
        for kind in BackendKind::PRIORITY {
            debug!("Checking for {}", kind.name());
            checked.push(kind.name().to_string());
            if let Some(backend) = self.probe(kind) {
                info!("Detected {}", backend.name());
                return Ok(backend);
            }
        }
        Err(BootcountError::PlatformUnknown { checked })
    }

    /// The selected backend. Detection runs once; later calls reuse it.
    pub fn detect(&mut self) -> Result<&Backend> {
        let backend = match self.detected.take() {
            Some(backend) => backend,
            None => self.select()?,
        };
        Ok(&*self.detected.insert(backend))
    }

    pub fn read(&mut self) -> Result<u16> {
        let backend = self.detect()?.clone();
        backend.read(self.memory.as_ref())
    }

    pub fn write(&mut self, value: u16) -> Result<()> {
        let backend = self.detect()?.clone();
        backend.write(self.memory.as_ref(), value)
    }
}
