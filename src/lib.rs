//! Library crate for portrisk: concurrent TCP connect scanning, service/risk
//! classification and remote risk assessment.
pub mod assess;
pub mod catalog;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod output;
pub mod ports;
pub mod probe;
pub mod resolve;
pub mod scanner;
pub mod types;

pub use assess::{assess, assess_with_cancel, Assessment, RiskAssessment, RiskRequester};
pub use catalog::ServiceCatalog;
pub use error::{CatalogError, ScanError};
pub use ports::ScanProfile;
pub use scanner::{scan, scan_profile, scan_with_cancel, scan_with_shared, SharedProgress};
pub use types::{PortResult, Risk, ScanReport, ScanRequest, ScanTarget, ServiceEntry};
