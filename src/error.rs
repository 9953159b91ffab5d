use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that abort a single scan invocation.
///
/// Closed, filtered or timed-out ports are never reported through this type:
/// they are simply absent from the results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("cannot resolve {target}: {reason}")]
    Resolution { target: String, reason: String },

    #[error("resolving {target} timed out after {}ms", .timeout.as_millis())]
    ResolutionTimeout { target: String, timeout: Duration },

    #[error("invalid port range {start}-{end} (ports must satisfy 1 <= start <= end <= 65535)")]
    InvalidRange { start: u32, end: u32 },

    #[error("invalid port {0} (must be within 1-65535)")]
    InvalidPort(u32),

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("scan of {target} cancelled before the target was resolved")]
    Cancelled { target: String },
}

impl ScanError {
    /// True for the resolution failures (including timeouts).
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            ScanError::Resolution { .. } | ScanError::ResolutionTimeout { .. }
        )
    }
}

/// Failure to build the service/risk catalog. Fatal at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read service catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse service catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service catalog table `{table}` has invalid port key `{key}`")]
    BadPortKey { table: &'static str, key: String },
}
