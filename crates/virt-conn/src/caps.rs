//! Host capabilities document parsing.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CapsError {
    #[error("xml: {0}")]
    Xml(String),
    #[error("invalid capabilities: {0}")]
    Invalid(String),
}

/// Host section of the capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Host {
    pub uuid: Option<String>,
    pub arch: Option<String>,
}

/// One `<guest>` entry: an OS type runnable on an architecture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guest {
    pub os_type: String,
    pub arch: String,
    pub emulator: Option<String>,
    pub domain_types: Vec<String>,
}

/// Parsed capabilities of a hypervisor connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub host: Host,
    pub guests: Vec<Guest>,
}

impl Capabilities {
    /// Parse a capabilities XML document.
    pub fn parse(xml: &str) -> Result<Self, CapsError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut caps = Capabilities::default();
        let mut seen_root = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = element_name(&e);
                    handle_start(&e, &name, &stack, &mut caps, &mut seen_root)?;
                    stack.push(name);
                }
                Ok(Event::Empty(e)) => {
                    let name = element_name(&e);
                    handle_start(&e, &name, &stack, &mut caps, &mut seen_root)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|err| CapsError::Xml(err.to_string()))?
                        .trim()
                        .to_string();
                    handle_text(&stack, text, &mut caps);
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(CapsError::Xml(err.to_string())),
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(CapsError::Invalid("root element is not 'capabilities'".into()));
        }
        debug!(guests = caps.guests.len(), arch = ?caps.host.arch, "parsed capabilities");
        Ok(caps)
    }

    /// Guest entry for `os_type` on `arch`.
    pub fn guest(&self, os_type: &str, arch: &str) -> Option<&Guest> {
        self.guests
            .iter()
            .find(|guest| guest.os_type == os_type && guest.arch == arch)
    }

    /// Whether any guest of `os_type` can run under hypervisor `domain_type` (`kvm`, `qemu`, ...).
    pub fn supports_domain_type(&self, os_type: &str, domain_type: &str) -> bool {
        self.guests.iter().any(|guest| {
            guest.os_type == os_type && guest.domain_types.iter().any(|t| t == domain_type)
        })
    }
}

fn element_name(event: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(event.name().as_ref()).to_string()
}

fn attribute_value(event: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, CapsError> {
    for attr in event.attributes() {
        let attr = attr.map_err(|err| CapsError::Xml(err.to_string()))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| CapsError::Xml(err.to_string()))?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn handle_start(
    event: &BytesStart<'_>,
    name: &str,
    stack: &[String],
    caps: &mut Capabilities,
    seen_root: &mut bool,
) -> Result<(), CapsError> {
    let parent = stack.last().map(String::as_str);
    match (parent, name) {
        (None, "capabilities") => *seen_root = true,
        (None, other) => {
            return Err(CapsError::Invalid(format!(
                "root element is '{other}', expected 'capabilities'"
            )))
        }
        (Some("capabilities"), "guest") => caps.guests.push(Guest::default()),
        (Some("guest"), "arch") => {
            if let Some(guest) = caps.guests.last_mut() {
                guest.arch = attribute_value(event, b"name")?.unwrap_or_default();
            }
        }
        (Some("arch"), "domain") if stack.iter().any(|s| s == "guest") => {
            if let (Some(guest), Some(kind)) =
                (caps.guests.last_mut(), attribute_value(event, b"type")?)
            {
                guest.domain_types.push(kind);
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_text(stack: &[String], text: String, caps: &mut Capabilities) {
    let path: Vec<&str> = stack.iter().map(String::as_str).collect();
    match path.as_slice() {
        ["capabilities", "host", "uuid"] => caps.host.uuid = Some(text),
        ["capabilities", "host", "cpu", "arch"] => caps.host.arch = Some(text),
        ["capabilities", "guest", "os_type"] => {
            if let Some(guest) = caps.guests.last_mut() {
                guest.os_type = text;
            }
        }
        ["capabilities", "guest", "arch", "emulator"] => {
            if let Some(guest) = caps.guests.last_mut() {
                guest.emulator = Some(text);
            }
        }
        _ => {}
    }
}
