//! Risk assessment of scan findings by a remote reasoning service.
//!
//! The scan results are serialized into an analysis prompt, sent through a
//! [`RiskRequester`], and the reply is validated against the expected shape.
//! Any failure along the way yields [`Assessment::Degraded`] carrying the
//! uniform error payload; it never turns into an error for the caller.

use std::fmt;
use std::future::Future;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::types::PortResult;

/// Highest accepted `risk_score`.
pub const MAX_RISK_SCORE: u8 = 10;

/// Transport to the remote reasoning service: prompt in, raw text out.
pub trait RiskRequester {
    fn request(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Structured data handed to the requester.
#[derive(Serialize, Debug, Clone)]
pub struct AssessmentRequest<'a> {
    pub target: &'a str,
    pub results: &'a [PortResult],
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub port: u16,
    pub service: String,
    pub vulnerability: String,
    pub exploit_likelihood: String,
    pub impact: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub risk_score: u8,
    pub severity: Severity,
    pub critical_findings: Vec<Finding>,
    pub attack_vectors: Vec<String>,
    pub immediate_actions: Vec<String>,
    pub reconnaissance_notes: String,
}

impl RiskAssessment {
    /// The fixed payload substituted when the assessment fails.
    pub fn failed(cause: &str) -> Self {
        Self {
            risk_score: 0,
            severity: Severity::Error,
            critical_findings: Vec::new(),
            attack_vectors: Vec::new(),
            immediate_actions: vec![format!("Error analyzing results: {cause}")],
            reconnaissance_notes: "Analysis failed.".to_string(),
        }
    }
}

/// Outcome of an assessment. `Degraded` means the subsystem failed, which is
/// distinct from a completed assessment that happens to report low risk.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Assessment {
    Completed(RiskAssessment),
    Degraded { cause: String, report: RiskAssessment },
}

impl Assessment {
    pub fn degraded(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        let report = RiskAssessment::failed(&cause);
        Assessment::Degraded { cause, report }
    }

    pub fn report(&self) -> &RiskAssessment {
        match self {
            Assessment::Completed(r) => r,
            Assessment::Degraded { report, .. } => report,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Assessment::Degraded { .. })
    }
}

/// Ask `requester` to assess `results` for `target`. Never fails.
pub async fn assess<R: RiskRequester>(
    requester: &R,
    target: &str,
    results: &[PortResult],
) -> Assessment {
    match request_assessment(requester, target, results).await {
        Ok(report) => {
            log::info!(
                "[assess] completed: target={} risk_score={} severity={}",
                target,
                report.risk_score,
                report.severity
            );
            Assessment::Completed(report)
        }
        Err(e) => {
            log::warn!("[assess] degraded: target={} error={:#}", target, e);
            Assessment::degraded(format!("{e:#}"))
        }
    }
}

/// Like [`assess`], but gives up with a degraded `"interrupted"` result once
/// `cancel` fires.
pub async fn assess_with_cancel<R: RiskRequester>(
    requester: &R,
    target: &str,
    results: &[PortResult],
    cancel: &CancellationToken,
) -> Assessment {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            log::warn!("[assess] interrupted: target={}", target);
            Assessment::degraded("interrupted")
        }
        a = assess(requester, target, results) => a,
    }
}

async fn request_assessment<R: RiskRequester>(
    requester: &R,
    target: &str,
    results: &[PortResult],
) -> Result<RiskAssessment> {
    let prompt = build_prompt(&AssessmentRequest { target, results })?;
    log::debug!("[assess] requesting: target={} findings={}", target, results.len());
    let text = requester.request(&prompt).await?;
    parse_response(&text)
}

/// Render the analysis prompt embedding the request as JSON.
pub fn build_prompt(request: &AssessmentRequest<'_>) -> Result<String> {
    let results = serde_json::to_string_pretty(request.results)
        .context("failed to serialize scan results")?;
    Ok(format!(
        r#"You are a senior cybersecurity engineer performing threat assessment. Analyze this port scan with precision.

TARGET: {target}
SCAN RESULTS:
{results}

Provide technical analysis in valid JSON (no markdown):
{{
  "risk_score": <integer 0-10>,
  "severity": "<critical|high|medium|low>",
  "critical_findings": [
    {{
      "port": <int>,
      "service": "<name>",
      "vulnerability": "<specific CVE or weakness>",
      "exploit_likelihood": "<high|medium|low>",
      "impact": "<brief technical impact>"
    }}
  ],
  "attack_vectors": [
    "<specific attack technique with port number>"
  ],
  "immediate_actions": [
    "<prioritized remediation step>"
  ],
  "reconnaissance_notes": "<what this reveals about the target infrastructure>"
}}

Rules:
- Only include ports with actual security implications
- Reference specific CVEs when applicable
- Prioritize by exploitability and impact
- No generic advice - be surgical
- If score >= 8, it must be immediately actionable critical risk
- Focus on what an attacker would exploit first
"#,
        target = request.target,
    ))
}

/// Validate a raw reply against the expected shape.
pub fn parse_response(text: &str) -> Result<RiskAssessment> {
    let body = strip_code_fence(text);
    let report: RiskAssessment =
        serde_json::from_str(body).context("malformed assessment response")?;
    if report.risk_score > MAX_RISK_SCORE {
        bail!(
            "risk_score {} out of range 0-{}",
            report.risk_score,
            MAX_RISK_SCORE
        );
    }
    Ok(report)
}

/// Models like to wrap JSON in a markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}
