//! Static port -> (service, risk, description) lookup table.
//!
//! The backing JSON file has three sub-tables, `tcp`, `udp` and `malware`,
//! each keyed by the decimal port number. They are merged into one index in
//! that order, so on a duplicate key UDP overrides TCP and malware overrides
//! both. Malware signatures therefore win for ports like 4444 that also have
//! a benign registration.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogError;
use crate::types::ServiceEntry;

/// Table shipped with the binary.
pub const EMBEDDED_CATALOG: &str = include_str!("../data/common_ports.json");

#[derive(Deserialize)]
struct RawCatalog {
    tcp: BTreeMap<String, ServiceEntry>,
    udp: BTreeMap<String, ServiceEntry>,
    malware: BTreeMap<String, ServiceEntry>,
}

/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    entries: HashMap<u16, ServiceEntry>,
    unknown: ServiceEntry,
}

impl ServiceCatalog {
    /// Parse the catalog from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(s)?;
        let mut entries = HashMap::new();
        // Load order is the override order.
        for (table, rows) in [("tcp", raw.tcp), ("udp", raw.udp), ("malware", raw.malware)] {
            for (key, entry) in rows {
                let port = parse_port_key(&key).ok_or(CatalogError::BadPortKey {
                    table,
                    key: key.clone(),
                })?;
                if let Some(prev) = entries.insert(port, entry) {
                    log::trace!("[catalog] override: table={table} port={port} previous={}", prev.name);
                }
            }
        }
        log::debug!("[catalog] loaded: entries={}", entries.len());
        Ok(Self {
            entries,
            unknown: ServiceEntry::unknown(),
        })
    }

    /// Load the catalog from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// The table compiled into the binary.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json_str(EMBEDDED_CATALOG)
    }

    /// Entry for `port`, or the unknown-service fallback. Never fails.
    pub fn lookup(&self, port: u16) -> &ServiceEntry {
        self.entries.get(&port).unwrap_or(&self.unknown)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.entries.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_port_key(key: &str) -> Option<u16> {
    match key.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(p) => Some(p),
    }
}
