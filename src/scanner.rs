use crate::catalog::ServiceCatalog;
use crate::error::ScanError;
use crate::ports::ScanProfile;
use crate::probe::probe_with_cancel;
use crate::resolve::resolve;
use crate::types::{PortResult, ScanReport, ScanRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use ::time::{format_description::well_known, OffsetDateTime};

/// Scan one target over the request's ports using asynchronous TCP connects.
///
/// - Resolves the target once; every probe reuses that address.
/// - Limits concurrent socket attempts using a `Semaphore`.
/// - Waits for every dispatched probe, then returns open ports sorted ascending.
pub async fn scan(
    target: &str,
    request: &ScanRequest,
    catalog: Arc<ServiceCatalog>,
) -> Result<ScanReport, ScanError> {
    scan_internal(target, request, catalog, None, None).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
///
/// On cancellation no further probes are dispatched, in-flight probes are
/// abandoned, and the report holds whatever was collected with `cancelled` set.
/// Cancelling before the target has resolved yields `ScanError::Cancelled`.
pub async fn scan_with_cancel(
    target: &str,
    request: &ScanRequest,
    catalog: Arc<ServiceCatalog>,
    cancel: CancellationToken,
) -> Result<ScanReport, ScanError> {
    scan_internal(target, request, catalog, Some(cancel), None).await
}

/// Live counters a caller can poll while a scan runs.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub scanned_total: Arc<AtomicU64>,
    pub scanned_done: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
    /// Probes currently holding a permit.
    pub in_flight: Arc<AtomicU64>,
    /// Highest `in_flight` seen during the current scan.
    pub peak_in_flight: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            scanned_total: Arc::new(AtomicU64::new(0)),
            scanned_done: Arc::new(AtomicU64::new(0)),
            open_count: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Zero every counter and set the total for a new scan.
    fn reset(&self, total: u64) {
        self.scanned_total.store(total, Ordering::Relaxed);
        self.scanned_done.store(0, Ordering::Relaxed);
        self.open_count.store(0, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
        self.peak_in_flight.store(0, Ordering::Relaxed);
    }

    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// `(done, total, open)` snapshot.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.scanned_done.load(Ordering::Relaxed),
            self.scanned_total.load(Ordering::Relaxed),
            self.open_count.load(Ordering::Relaxed),
        )
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn scan_with_shared(
    target: &str,
    request: &ScanRequest,
    catalog: Arc<ServiceCatalog>,
    cancel: CancellationToken,
    shared: SharedProgress,
) -> Result<ScanReport, ScanError> {
    scan_internal(target, request, catalog, Some(cancel), Some(shared)).await
}

/// Expand `profile`, build the request and scan. Profile errors surface before
/// the target is resolved.
pub async fn scan_profile(
    target: &str,
    profile: &ScanProfile,
    concurrency: usize,
    timeout: Duration,
    catalog: Arc<ServiceCatalog>,
) -> Result<ScanReport, ScanError> {
    let request = ScanRequest::new(profile.ports()?, concurrency, timeout)?;
    scan(target, &request, catalog).await
}

async fn scan_internal(
    target: &str,
    request: &ScanRequest,
    catalog: Arc<ServiceCatalog>,
    cancel_opt: Option<CancellationToken>,
    shared_opt: Option<SharedProgress>,
) -> Result<ScanReport, ScanError> {
    let started_at = now_rfc3339();
    let cancel = cancel_opt.unwrap_or_default();
    let cancelled = || ScanError::Cancelled {
        target: target.to_string(),
    };
    if cancel.is_cancelled() {
        return Err(cancelled());
    }
    let resolved = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(cancelled()),
        res = resolve(target) => res?,
    };
    let ip = resolved.ip();

    let total = request.ports().len() as u64;
    let shared = shared_opt.unwrap_or_default();
    shared.reset(total);
    let scanned_done = shared.scanned_done.clone();
    let open_count = shared.open_count.clone();

    log::info!(
        "[scanner] scan_started: target={} ip={} ports={} concurrency={} timeout_ms={}",
        resolved.original(),
        ip,
        total,
        request.concurrency(),
        request.timeout().as_millis()
    );

    let sem = Arc::new(Semaphore::new(request.concurrency()));
    let mut set = JoinSet::new();
    let timeout = request.timeout();

    for &port in request.ports() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = sem.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        let catalog = catalog.clone();
        let scanned_done = scanned_done.clone();
        let open_count = open_count.clone();
        let cancel = cancel.clone();
        let in_flight = shared.in_flight.clone();
        let peak_in_flight = shared.peak_in_flight.clone();

        set.spawn(async move {
            let _permit = permit; // keep permit until task completes

            let now = in_flight.fetch_add(1, Ordering::Relaxed) + 1;
            peak_in_flight.fetch_max(now, Ordering::Relaxed);
            let res = probe_with_cancel(&catalog, ip, port, timeout, &cancel).await;
            in_flight.fetch_sub(1, Ordering::Relaxed);
            if res.is_some() {
                open_count.fetch_add(1, Ordering::Relaxed);
            }
            if !cancel.is_cancelled() {
                scanned_done.fetch_add(1, Ordering::Relaxed);
            }
            res
        });
    }

    let mut entries: Vec<PortResult> = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => log::warn!("[scanner] probe_task_failed: target={} error={}", ip, e),
        }
    }
    entries.sort_by_key(|e| e.port);

    let report = ScanReport {
        target: resolved.original().to_string(),
        ip: ip.to_string(),
        scanned_total: total,
        scanned_done: scanned_done.load(Ordering::Relaxed),
        open_count: entries.len() as u64,
        cancelled: cancel.is_cancelled(),
        started_at,
        finished_at: now_rfc3339(),
        entries,
    };
    log::info!(
        "[scanner] scan_finished: target={} scanned={}/{} open={} cancelled={}",
        report.target,
        report.scanned_done,
        report.scanned_total,
        report.open_count,
        report.cancelled
    );
    Ok(report)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
