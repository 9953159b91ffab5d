use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default number of probes allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 300;
/// Upper clamp for the concurrency cap.
pub const MAX_CONCURRENCY: usize = 5_000;
/// Default per-probe connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Risk rating attached to a known service.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Risk::Critical => "critical",
            Risk::High => "high",
            Risk::Medium => "medium",
            Risk::Low => "low",
            Risk::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One row of the service catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub risk: Risk,
    pub description: String,
}

impl ServiceEntry {
    /// Entry returned for ports the catalog does not know.
    pub fn unknown() -> Self {
        Self {
            name: "unknown".to_string(),
            risk: Risk::Unknown,
            description: "Unknown service".to_string(),
        }
    }
}

/// Only open ports are ever surfaced, so this has a single state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("open")
    }
}

/// One discovered open port, classified against the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    pub service: String,
    pub risk: Risk,
    pub description: String,
}

impl PortResult {
    pub fn open(port: u16, entry: &ServiceEntry) -> Self {
        Self {
            port,
            state: PortState::Open,
            service: entry.name.clone(),
            risk: entry.risk,
            description: entry.description.clone(),
        }
    }
}

/// A target as typed by the caller together with the address every probe uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    original: String,
    ip: IpAddr,
}

impl ScanTarget {
    pub(crate) fn new(original: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            original: original.into(),
            ip,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

/// Validated input for one scan: a sorted, deduplicated port set plus limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    ports: Vec<u16>,
    concurrency: usize,
    timeout: Duration,
}

impl ScanRequest {
    /// Port 0 is rejected, the cap is clamped to `1..=MAX_CONCURRENCY`.
    pub fn new(ports: Vec<u16>, concurrency: usize, timeout: Duration) -> Result<Self, ScanError> {
        if let Some(&bad) = ports.iter().find(|&&p| p == 0) {
            return Err(ScanError::InvalidPort(u32::from(bad)));
        }
        if timeout.is_zero() {
            return Err(ScanError::InvalidConfig("probe timeout must be non-zero".into()));
        }
        let mut ports = ports;
        ports.sort_unstable();
        ports.dedup();
        Ok(Self {
            ports,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            timeout,
        })
    }

    /// Request with the default cap and timeout.
    pub fn with_defaults(ports: Vec<u16>) -> Result<Self, ScanError> {
        Self::new(ports, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT)
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Aggregate results and progress counters for one scan.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub target: String,
    pub ip: String,
    pub scanned_total: u64,
    pub scanned_done: u64,
    pub open_count: u64,
    pub cancelled: bool,
    pub started_at: String,
    pub finished_at: String,
    /// Open ports, ascending by port number.
    pub entries: Vec<PortResult>,
}

impl ScanReport {
    pub fn open_ports(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.port).collect()
    }
}
