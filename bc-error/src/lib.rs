//! Unified error handling for uboot-bootcount
//!
//! This crate provides the single error type returned by every bootcount
//! backend. It uses thiserror for ergonomic error definitions with proper
//! Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using BootcountError
pub type Result<T> = std::result::Result<T, BootcountError>;

/// Coarse classification of a [`BootcountError`], for callers that only
/// care about the outcome category (e.g. to pick a process exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Device,
    BadMagic,
    PlatformUnknown,
    WriteVerification,
    Config,
}

/// Unified error type for all bootcount operations
#[derive(thiserror::Error, Debug)]
pub enum BootcountError {
    // ============================================================================
    // Storage Medium Errors
    // ============================================================================
    #[error("Device error on {path}: {source}")]
    Device {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Short transfer on {path}: expected {expected} bytes, got {actual}")]
    ShortIo {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    // ============================================================================
    // Record Errors
    // ============================================================================
    #[error("Bootcount magic does not match (expected {expected:#x}, found {found:#x})")]
    BadMagic {
        expected: u32,
        found: u32,
    },

    #[error("Write verification failed: wrote {expected}, read back {found:?}")]
    WriteVerification {
        expected: u16,
        found: Option<u16>,
    },

    // ============================================================================
    // Platform Errors
    // ============================================================================
    #[error("Unknown platform, no bootcount backend detected (checked: {})", .checked.join(", "))]
    PlatformUnknown {
        checked: Vec<String>,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl BootcountError {
    /// Create a device error for an I/O failure on `path`
    pub fn device(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Device {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Outcome category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Device { .. } | Self::ShortIo { .. } => ErrorKind::Device,
            Self::BadMagic { .. } => ErrorKind::BadMagic,
            Self::WriteVerification { .. } => ErrorKind::WriteVerification,
            Self::PlatformUnknown { .. } => ErrorKind::PlatformUnknown,
            Self::ConfigRead { .. } | Self::ConfigParse(_) | Self::InvalidConfig { .. } => {
                ErrorKind::Config
            }
        }
    }

    /// Process exit code for the CLI, numbered like the historic C tool
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::BadMagic => 1,
            ErrorKind::Device => 2,
            ErrorKind::PlatformUnknown => 3,
            ErrorKind::WriteVerification => 4,
            ErrorKind::Config => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_unknown_lists_backends() {
        let err = BootcountError::PlatformUnknown {
            checked: vec!["TI AM335x".into(), "I2C EEPROM".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("TI AM335x, I2C EEPROM"));
        assert_eq!(err.kind(), ErrorKind::PlatformUnknown);
    }

    #[test]
    fn test_kinds_and_exit_codes() {
        let dev = BootcountError::device("/dev/mem", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(dev.kind(), ErrorKind::Device);
        assert_eq!(dev.exit_code(), 2);

        let short = BootcountError::ShortIo { path: "/x".into(), expected: 2, actual: 1 };
        assert_eq!(short.kind(), ErrorKind::Device);

        let magic = BootcountError::BadMagic { expected: 0xb001, found: 0 };
        assert_eq!(magic.exit_code(), 1);
        assert!(magic.to_string().contains("0xb001"));

        let verify = BootcountError::WriteVerification { expected: 3, found: Some(2) };
        assert_eq!(verify.exit_code(), 4);

        let cfg = BootcountError::invalid_config("eeprom.address", "out of range");
        assert_eq!(cfg.kind(), ErrorKind::Config);
    }
}
