use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use portrisk::assess::{assess, Assessment, RiskRequester, Severity};
use portrisk::gemini::GeminiRequester;
use portrisk::scanner::{scan, scan_profile, scan_with_shared, SharedProgress};
use portrisk::{ScanProfile, ScanRequest, ServiceCatalog};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

fn catalog() -> Arc<ServiceCatalog> {
    Arc::new(ServiceCatalog::embedded().expect("embedded catalog"))
}

/// Find `base` such that `base+1` and `base+2` are listening and the rest of
/// `base..=base+10` was free a moment ago.
async fn listeners_in_block() -> (u16, Vec<TcpListener>) {
    for _ in 0..50 {
        let base = {
            let first = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            first.local_addr().unwrap().port()
        };
        if base > 65_525 {
            continue;
        }
        let mut listeners = Vec::new();
        for p in [base + 1, base + 2] {
            if let Ok(l) = TcpListener::bind((Ipv4Addr::LOCALHOST, p)).await {
                listeners.push(l);
            }
        }
        if listeners.len() != 2 {
            continue;
        }
        let mut free = true;
        for p in (base..=base + 10).filter(|p| *p != base + 1 && *p != base + 2) {
            if TcpListener::bind((Ipv4Addr::LOCALHOST, p)).await.is_err() {
                free = false;
                break;
            }
        }
        if free {
            return (base, listeners);
        }
    }
    panic!("could not reserve a block of local ports");
}

#[tokio::test]
async fn range_scan_returns_only_listening_ports_in_order() {
    let (base, _listeners) = listeners_in_block().await;
    let profile = ScanProfile::Range {
        start: u32::from(base),
        end: u32::from(base) + 10,
    };

    let report = scan_profile("127.0.0.1", &profile, 300, Duration::from_secs(1), catalog())
        .await
        .expect("scan ok");

    assert_eq!(report.open_ports(), vec![base + 1, base + 2]);
    assert_eq!(report.scanned_total, 11);
    assert_eq!(report.scanned_done, 11);
    assert!(report.entries.iter().all(|e| e.state.to_string() == "open"));
}

/// Listener with a full accept queue: further connects stall until timeout.
/// Returns `None` when the platform keeps accepting handshakes anyway.
async fn stalled_listener() -> Option<(u16, TcpListener, Vec<TcpStream>)> {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..64 {
        match timeout(Duration::from_millis(300), TcpStream::connect(addr)).await {
            Ok(Ok(s)) => queued.push(s),
            Ok(Err(_)) => return None,
            Err(_) => return Some((addr.port(), listener, queued)),
        }
    }
    None
}

#[tokio::test]
async fn cancel_mid_scan_returns_partial_sorted_results() {
    let Some((stalled_port, _stalled, _queued)) = stalled_listener().await else {
        eprintln!("accept queue overflow does not stall connects here; skipping");
        return;
    };
    let mut listeners = Vec::new();
    let mut open = Vec::new();
    for _ in 0..4 {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        open.push(l.local_addr().unwrap().port());
        listeners.push(l);
    }
    let mut ports = open.clone();
    ports.push(stalled_port);
    // One slot, so the stalled connect holds the scan open until cancelled.
    let req = ScanRequest::new(ports, 1, Duration::from_secs(30)).unwrap();

    let shared = SharedProgress::new();
    let cancel = CancellationToken::new();
    let started = Instant::now();
    let scan_task = {
        let (req, shared, cancel) = (req.clone(), shared.clone(), cancel.clone());
        tokio::spawn(async move {
            scan_with_shared("127.0.0.1", &req, catalog(), cancel, shared).await
        })
    };

    // Wait until the stalled connect is the one holding the slot.
    while !scan_task.is_finished()
        && (shared.in_flight.load(std::sync::atomic::Ordering::Relaxed) == 0
            || started.elapsed() < Duration::from_millis(200))
    {
        sleep(Duration::from_millis(20)).await;
    }
    cancel.cancel();

    let report = timeout(Duration::from_secs(5), scan_task)
        .await
        .expect("cancelled scan returns promptly")
        .unwrap()
        .unwrap();

    assert!(report.cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    let got = report.open_ports();
    assert!(got.windows(2).all(|w| w[0] < w[1]), "not ascending: {got:?}");
    assert!(got.iter().all(|p| open.contains(p)), "unexpected ports: {got:?}");
    assert!(!got.contains(&stalled_port));
    assert!(report.scanned_done < report.scanned_total);
}

#[tokio::test]
async fn repeated_scan_returns_same_ports() {
    let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ports = vec![b.local_addr().unwrap().port(), a.local_addr().unwrap().port()];
    let req = ScanRequest::new(ports, 8, Duration::from_millis(500)).unwrap();

    let first = scan("127.0.0.1", &req, catalog()).await.unwrap();
    let second = scan("127.0.0.1", &req, catalog()).await.unwrap();
    assert_eq!(first.open_ports(), second.open_ports());
    assert_eq!(first.open_ports().len(), 2);
    assert!(first.open_ports().windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn localhost_hostname_resolves_once_and_scans() {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = l.local_addr().unwrap().port();
    let req = ScanRequest::with_defaults(vec![port]).unwrap();

    let report = scan("localhost", &req, catalog()).await.unwrap();
    assert_eq!(report.target, "localhost");
    assert_eq!(report.ip, "127.0.0.1");
    assert_eq!(report.open_ports(), vec![port]);
}

#[tokio::test]
async fn unresolvable_target_fails_before_any_probe() {
    let req = ScanRequest::with_defaults(vec![22, 80, 443]).unwrap();
    let shared = SharedProgress::new();
    let err = scan_with_shared(
        "no such host.invalid",
        &req,
        catalog(),
        CancellationToken::new(),
        shared.clone(),
    )
    .await
    .unwrap_err();

    assert!(err.is_resolution(), "unexpected error: {err}");
    assert_eq!(shared.snapshot(), (0, 0, 0));
}

struct Malformed;

impl RiskRequester for Malformed {
    async fn request(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(r#"{"severity": "high", "critical_findings": []}"#.to_string())
    }
}

#[tokio::test]
async fn malformed_assessment_leaves_scan_results_intact() {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = l.local_addr().unwrap().port();
    let req = ScanRequest::with_defaults(vec![port]).unwrap();
    let report = scan("127.0.0.1", &req, catalog()).await.unwrap();
    let before = report.entries.clone();

    let assessment = assess(&Malformed, &report.target, &report.entries).await;

    let Assessment::Degraded { cause, report: degraded } = &assessment else {
        panic!("expected degraded assessment, got {assessment:?}");
    };
    assert_eq!(degraded.risk_score, 0);
    assert_eq!(degraded.severity, Severity::Error);
    assert!(degraded.critical_findings.is_empty());
    assert!(degraded.attack_vectors.is_empty());
    assert_eq!(
        degraded.immediate_actions,
        vec![format!("Error analyzing results: {cause}")]
    );
    assert_eq!(degraded.reconnaissance_notes, "Analysis failed.");
    assert_eq!(report.entries, before);
    assert_eq!(report.open_ports(), vec![port]);
}

#[tokio::test]
async fn unreachable_gemini_endpoint_degrades() {
    let closed = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    };
    let requester = GeminiRequester::new("test-key", "test-model")
        .unwrap()
        .with_endpoint(format!("http://127.0.0.1:{closed}"));

    let assessment = assess(&requester, "127.0.0.1", &[]).await;
    assert!(assessment.is_degraded());
    assert_eq!(assessment.report().reconnaissance_notes, "Analysis failed.");
}
