//! In-memory [`Connection`] serving fixed documents.
//!
//! Useful for offline tooling working on saved XML and for tests. Calls can
//! be made to fail with a chosen [`ErrorCode`] to mimic drivers lacking
//! host device support.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::{Connection, ConnectionError, ErrorCode};

#[derive(Debug, Default)]
pub struct MemoryConnection {
    uri: String,
    capabilities: Option<String>,
    devices: BTreeMap<String, (String, String)>,
    device_failure: Option<ErrorCode>,
    detach_failure: Option<ErrorCode>,
    calls: RefCell<BTreeMap<&'static str, usize>>,
}

impl MemoryConnection {
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_capabilities<S: Into<String>>(mut self, xml: S) -> Self {
        self.capabilities = Some(xml.into());
        self
    }

    /// Register a device named `name` with capability type `capability`.
    pub fn with_device<S: Into<String>>(mut self, name: &str, capability: &str, xml: S) -> Self {
        self.devices
            .insert(name.to_string(), (capability.to_string(), xml.into()));
        self
    }

    /// Make every host device call fail with `code`.
    pub fn failing_devices(mut self, code: ErrorCode) -> Self {
        self.device_failure = Some(code);
        self
    }

    /// Make the detach support check fail with `code`.
    pub fn failing_detach(mut self, code: ErrorCode) -> Self {
        self.detach_failure = Some(code);
        self
    }

    /// Number of times `call` was invoked.
    pub fn call_count(&self, call: &str) -> usize {
        self.calls.borrow().get(call).copied().unwrap_or(0)
    }

    fn record(&self, call: &'static str) {
        *self.calls.borrow_mut().entry(call).or_default() += 1;
    }

    fn check_devices(&self) -> Result<(), ConnectionError> {
        match self.device_failure {
            Some(code) => Err(ConnectionError::new(
                code,
                "host device enumeration failed",
            )),
            None => Ok(()),
        }
    }
}

impl Connection for MemoryConnection {
    fn uri(&self) -> Result<String, ConnectionError> {
        self.record("uri");
        Ok(self.uri.clone())
    }

    fn capabilities_xml(&self) -> Result<String, ConnectionError> {
        self.record("capabilities_xml");
        self.capabilities
            .clone()
            .ok_or_else(|| ConnectionError::new(ErrorCode::NoSupport, "no capabilities"))
    }

    fn list_devices(&self, capability: Option<&str>) -> Result<Vec<String>, ConnectionError> {
        self.record("list_devices");
        self.check_devices()?;
        Ok(self
            .devices
            .iter()
            .filter(|(_, (cap, _))| capability.map_or(true, |wanted| wanted == cap))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn device_xml(&self, name: &str) -> Result<String, ConnectionError> {
        self.record("device_xml");
        self.check_devices()?;
        self.devices
            .get(name)
            .map(|(_, xml)| xml.clone())
            .ok_or_else(|| {
                ConnectionError::new(ErrorCode::NoDevice, format!("no device named '{name}'"))
            })
    }

    fn node_device_detach_supported(&self) -> Result<bool, ConnectionError> {
        self.record("node_device_detach_supported");
        match self.detach_failure {
            Some(code) => Err(ConnectionError::new(code, "detach support check failed")),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_devices_by_capability() {
        let conn = MemoryConnection::new("test:///default")
            .with_device("pci_0000_00_02_0", "pci", "<device/>")
            .with_device("usb_1_2", "usb_device", "<device/>");
        assert_eq!(conn.list_devices(None).unwrap().len(), 2);
        assert_eq!(
            conn.list_devices(Some("pci")).unwrap(),
            vec!["pci_0000_00_02_0".to_string()]
        );
        assert_eq!(conn.call_count("list_devices"), 2);
        let err = conn.device_xml("missing").unwrap_err();
        assert_eq!(err.code, ErrorCode::NoDevice);
    }

    #[test]
    fn injected_failures() {
        let conn = MemoryConnection::new("test:///default").failing_devices(ErrorCode::Rpc);
        let err = conn.list_devices(None).unwrap_err();
        assert!(err.is_unsupported());
        assert!(conn.capabilities_xml().is_err());
    }
}
