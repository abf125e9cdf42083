//! Hardware address lookup

use crate::error::{AgentError, Result};
use std::path::Path;

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated) into raw bytes
pub fn parse_hardware_address(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.split([':', '-'])
        .map(|part| {
            if part.len() != 2 {
                return None;
            }
            u8::from_str_radix(part, 16).ok()
        })
        .collect()
}

/// Read an interface's hardware address from sysfs
pub fn read_hardware_address(interface: &str) -> Result<Vec<u8>> {
    read_hardware_address_from(Path::new("/sys/class/net"), interface)
}

/// Read `<root>/<interface>/address`
pub fn read_hardware_address_from(root: &Path, interface: &str) -> Result<Vec<u8>> {
    let path = root.join(interface).join("address");
    let text = std::fs::read_to_string(&path).map_err(|e| AgentError::HardwareAddress {
        interface: interface.to_string(),
        reason: format!("{}: {}", path.display(), e),
    })?;

    parse_hardware_address(&text).ok_or_else(|| AgentError::HardwareAddress {
        interface: interface.to_string(),
        reason: format!("unparseable address {:?}", text.trim()),
    })
}
