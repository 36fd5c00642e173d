#![cfg_attr(docsrs, feature(doc_cfg))]
//! Connection contract consumed by the configuration and device crates.
//!
//! The crates in this workspace never open hypervisor connections
//! themselves. They talk to whatever implements [`Connection`], which keeps
//! them testable and transport-agnostic.

pub mod caps;
pub mod memory;
pub mod uri;

use thiserror::Error;

pub use caps::{Capabilities, CapsError, Guest, Host};
pub use memory::MemoryConnection;
pub use uri::{is_uri_remote, UriParts};

/// Classification of a failed connection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The driver does not implement the call.
    NoSupport,
    /// The remote protocol does not know the call.
    Rpc,
    /// The requested device does not exist.
    NoDevice,
    /// Any other transport or driver failure.
    Other,
}

/// Error reported by a [`Connection`] implementation.
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct ConnectionError {
    pub code: ErrorCode,
    pub message: String,
}

impl ConnectionError {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `true` when the failure only means the call is not available.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.code, ErrorCode::NoSupport | ErrorCode::Rpc)
    }
}

/// Hypervisor connection used to query metadata and host devices.
pub trait Connection {
    /// Canonical URI of the connection, e.g. `qemu:///system`.
    fn uri(&self) -> Result<String, ConnectionError>;
    /// Host capabilities XML document.
    fn capabilities_xml(&self) -> Result<String, ConnectionError>;
    /// Names of host devices, optionally filtered by capability type.
    fn list_devices(&self, capability: Option<&str>) -> Result<Vec<String>, ConnectionError>;
    /// XML description of the host device `name`.
    fn device_xml(&self, name: &str) -> Result<String, ConnectionError>;
    /// Whether host devices can be detached from their host driver and reset.
    fn node_device_detach_supported(&self) -> Result<bool, ConnectionError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_codes() {
        assert!(ConnectionError::new(ErrorCode::NoSupport, "x").is_unsupported());
        assert!(ConnectionError::new(ErrorCode::Rpc, "x").is_unsupported());
        assert!(!ConnectionError::new(ErrorCode::Other, "x").is_unsupported());
        assert!(!ConnectionError::new(ErrorCode::NoDevice, "x").is_unsupported());
    }

    #[test]
    fn error_display_includes_code() {
        let err = ConnectionError::new(ErrorCode::Other, "connection reset");
        assert_eq!(err.to_string(), "Other: connection reset");
    }
}
