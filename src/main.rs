use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tokio_util::sync::CancellationToken;

use portrisk::assess::{assess_with_cancel, Assessment};
use portrisk::catalog::ServiceCatalog;
use portrisk::error::ScanError;
use portrisk::gemini::{GeminiRequester, DEFAULT_MODEL};
use portrisk::output::{self, ScanOutput};
use portrisk::ports::{self, ScanProfile};
use portrisk::scanner::{self, SharedProgress};
use portrisk::types::{ScanReport, ScanRequest, DEFAULT_CONCURRENCY};

/// Scans above this many ports get a periodic progress line.
const PROGRESS_THRESHOLD: usize = 1_000;

/// portrisk — concurrent TCP connect scanner with service/risk classification and AI risk assessment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portrisk",
    version,
    about = "Concurrent TCP connect scanner with service/risk classification and AI risk assessment.",
    long_about = None
)]
#[command(group(ArgGroup::new("mode").args(["quick", "full", "range", "port", "ports_file"])))]
struct Cli {
    /// Target IP or hostname.
    target: String,

    /// Scan the common well-known ports (default).
    #[arg(long)]
    quick: bool,

    /// Scan every port from 1 to 65535.
    #[arg(long)]
    full: bool,

    /// Scan an inclusive port range, e.g. 8000-8100.
    #[arg(long, value_name = "START-END")]
    range: Option<String>,

    /// Scan a single port.
    #[arg(long)]
    port: Option<u32>,

    /// Path to ports list file (one port or range per line).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Max concurrent TCP connect attempts.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Service/risk table to use instead of the built-in one.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Gemini API key.
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model used for the risk assessment.
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Skip the AI risk assessment.
    #[arg(long = "no-ai", default_value_t = false)]
    no_ai: bool,

    /// Write report and assessment as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn profile(&self) -> Result<ScanProfile> {
        if self.full {
            return Ok(ScanProfile::Full);
        }
        if let Some(r) = self.range.as_deref() {
            return ports::parse_range_arg(r);
        }
        if let Some(p) = self.port {
            return Ok(ScanProfile::Single(p));
        }
        if let Some(path) = self.ports_file.as_deref() {
            return Ok(ScanProfile::List(ports::load_ports_from_path(path)?));
        }
        Ok(ScanProfile::Quick)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    portrisk::logging::init_logging(cli.verbose);

    let catalog = match cli.catalog.as_deref() {
        Some(path) => ServiceCatalog::from_path(path),
        None => ServiceCatalog::embedded(),
    }
    .context("cannot load service catalog")?;
    let catalog = Arc::new(catalog);

    let profile = cli.profile()?;
    let request = ScanRequest::new(
        profile.ports()?,
        cli.concurrency,
        Duration::from_millis(cli.timeout_ms),
    )?;

    println!("portrisk configuration:");
    println!("  target       : {}", cli.target);
    println!("  profile      : {}", describe_profile(&profile));
    println!("  ports        : {}", request.ports().len());
    println!("  concurrency  : {}", request.concurrency());
    println!("  timeout_ms   : {}", cli.timeout_ms);
    println!("  catalog      : {} entries", catalog.len());

    // Ctrl-C cancels the scan and the assessment; whatever was found so far is still reported.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("[main] interrupt received, cancelling scan");
            cancel_ctrlc.cancel();
        }
    });

    let progress = SharedProgress::new();
    let ticker_done = CancellationToken::new();
    if request.ports().len() > PROGRESS_THRESHOLD {
        tokio::spawn(report_progress(progress.clone(), ticker_done.clone()));
    }

    let result = scanner::scan_with_shared(
        &cli.target,
        &request,
        catalog,
        cancel.clone(),
        progress,
    )
    .await;
    ticker_done.cancel();
    let report = match result {
        Err(ScanError::Cancelled { target }) => {
            println!("\nScan of {target} interrupted before it started.");
            return Ok(());
        }
        other => other?,
    };

    print_results_table(&report);

    let assessment = if cli.no_ai || report.cancelled {
        None
    } else {
        run_assessment(&cli, &report, &cancel).await
    };
    if let Some(a) = assessment.as_ref() {
        print_assessment(a);
    }

    if let Some(path) = cli.output.as_deref() {
        let out = ScanOutput {
            report: &report,
            assessment: assessment.as_ref(),
        };
        output::write_json(path, &out).context("cannot write --output")?;
        println!("Wrote JSON results to {}", path.display());
    }

    Ok(())
}

async fn run_assessment(
    cli: &Cli,
    report: &ScanReport,
    cancel: &CancellationToken,
) -> Option<Assessment> {
    let Some(key) = cli.api_key.as_deref() else {
        println!("\nNo Gemini API key (set GEMINI_API_KEY or --api-key); skipping AI assessment.");
        return None;
    };
    match GeminiRequester::new(key, cli.model.clone()) {
        Ok(requester) => {
            println!("\nRequesting AI risk assessment ({})...", requester.model());
            Some(assess_with_cancel(&requester, &report.target, &report.entries, cancel).await)
        }
        Err(e) => Some(Assessment::degraded(e.to_string())),
    }
}

async fn report_progress(progress: SharedProgress, done: CancellationToken) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.tick().await;
    loop {
        tokio::select! {
            _ = done.cancelled() => return,
            _ = tick.tick() => {
                let (scanned, total, open) = progress.snapshot();
                log::info!("[main] progress: scanned={}/{} open={}", scanned, total, open);
            }
        }
    }
}

fn describe_profile(p: &ScanProfile) -> String {
    match p {
        ScanProfile::Quick => "quick".into(),
        ScanProfile::Full => "full (1-65535)".into(),
        ScanProfile::Range { start, end } => format!("range {start}-{end}"),
        ScanProfile::Single(port) => format!("single {port}"),
        ScanProfile::List(list) => format!("list ({} ports)", list.len()),
    }
}

fn print_results_table(report: &ScanReport) {
    let port_w = 5usize;
    let state_w = 5usize;
    let mut svc_w = "service".len();
    let risk_w = "critical".len();
    for e in &report.entries {
        svc_w = svc_w.max(e.service.len());
    }

    println!(
        "\n{} ({}) open ports: {} (scanned: {}/{}){}",
        report.target,
        report.ip,
        report.open_count,
        report.scanned_done,
        report.scanned_total,
        if report.cancelled { " [cancelled]" } else { "" }
    );
    if report.entries.is_empty() {
        return;
    }
    println!(
        "{:>port_w$}  {:<state_w$}  {:<svc_w$}  {:<risk_w$}  {}",
        "port", "state", "service", "risk", "description"
    );
    println!(
        "{:->port_w$}  {:-<state_w$}  {:-<svc_w$}  {:-<risk_w$}  {:-<11}",
        "", "", "", "", ""
    );
    for e in &report.entries {
        println!(
            "{:>port_w$}  {:<state_w$}  {:<svc_w$}  {:<risk_w$}  {}",
            e.port,
            e.state.to_string(),
            e.service,
            e.risk.to_string(),
            e.description
        );
    }
}

fn print_assessment(a: &Assessment) {
    let r = a.report();
    println!("\nAI risk assessment{}:", if a.is_degraded() { " (failed)" } else { "" });
    println!("  risk score   : {}/10", r.risk_score);
    println!("  severity     : {}", r.severity);
    for f in &r.critical_findings {
        println!(
            "  finding      : {}/{} {} (likelihood {}, impact {})",
            f.port, f.service, f.vulnerability, f.exploit_likelihood, f.impact
        );
    }
    for v in &r.attack_vectors {
        println!("  vector       : {v}");
    }
    for act in &r.immediate_actions {
        println!("  action       : {act}");
    }
    println!("  notes        : {}", r.reconnaissance_notes);
}
