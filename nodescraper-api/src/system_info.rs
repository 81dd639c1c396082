//! Target-system identity, mutable until the first plugin starts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::enums::{OsFamily, SystemLocation};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    pub os_family: OsFamily,
    pub sku: Option<String>,
    pub platform: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub location: SystemLocation,
}

impl SystemInfo {
    pub fn new(name: impl Into<String>, location: SystemLocation) -> Self {
        SystemInfo {
            name: name.into(),
            os_family: OsFamily::Unknown,
            sku: None,
            platform: None,
            metadata: HashMap::new(),
            location,
        }
    }

    pub fn supports_sku(&self, supported: &[String]) -> bool {
        supported.is_empty() || self.sku.as_ref().map_or(false, |s| supported.contains(s))
    }

    pub fn supports_platform(&self, supported: &[String]) -> bool {
        supported.is_empty() || self.platform.as_ref().map_or(false, |p| supported.contains(p))
    }

    pub fn supports_os_family(&self, supported: &[OsFamily]) -> bool {
        supported.is_empty() || supported.contains(&self.os_family)
    }
}
