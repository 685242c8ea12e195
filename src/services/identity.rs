//! Per-file device identity resolution
//!
//! Rows may carry the stable device EUI, the transient network address, or
//! both. Rows carrying both teach the resolver the address mapping, which
//! then applies to later rows of the same file that only carry the address.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct IdentityResolver {
    addr_to_eui: HashMap<String, String>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the device EUI of one row, learning from it first.
    ///
    /// Returns `None` when the row cannot be attributed to any device.
    pub fn resolve(&mut self, dev_eui: Option<&str>, dev_addr: Option<&str>) -> Option<String> {
        match (dev_eui, dev_addr) {
            (Some(eui), Some(addr)) => {
                self.addr_to_eui.insert(addr.to_string(), eui.to_string());
                Some(eui.to_string())
            }
            (Some(eui), None) => Some(eui.to_string()),
            (None, Some(addr)) => self.addr_to_eui.get(addr).cloned(),
            (None, None) => None,
        }
    }

    /// Number of learned address mappings
    pub fn known_addresses(&self) -> usize {
        self.addr_to_eui.len()
    }
}
