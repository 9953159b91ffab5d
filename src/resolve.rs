use std::net::IpAddr;
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time;

use crate::error::ScanError;
use crate::types::ScanTarget;

/// Upper bound on a single hostname lookup.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve a hostname or IP literal into the address every probe of a scan will use.
///
/// IP literals are returned as-is. Hostnames go through the system resolver and
/// an IPv4 answer is preferred when one exists.
pub async fn resolve(input: &str) -> Result<ScanTarget, ScanError> {
    resolve_with_timeout(input, RESOLVE_TIMEOUT).await
}

pub async fn resolve_with_timeout(input: &str, timeout: Duration) -> Result<ScanTarget, ScanError> {
    let host = input.trim();
    if host.is_empty() {
        return Err(ScanError::Resolution {
            target: input.to_string(),
            reason: "empty target".into(),
        });
    }
    if let Some(ip) = parse_ip_literal(host) {
        log::debug!("[resolve] literal: target={host} ip={ip}");
        return Ok(ScanTarget::new(input, ip));
    }

    // Port is irrelevant, lookup_host just needs a socket address form.
    let addrs = match time::timeout(timeout, lookup_host((host, 0))).await {
        Err(_) => {
            return Err(ScanError::ResolutionTimeout {
                target: input.to_string(),
                timeout,
            })
        }
        Ok(Err(e)) => {
            return Err(ScanError::Resolution {
                target: input.to_string(),
                reason: e.to_string(),
            })
        }
        Ok(Ok(addrs)) => addrs.map(|sa| sa.ip()).collect::<Vec<_>>(),
    };

    let ip = pick_address(&addrs).ok_or_else(|| ScanError::Resolution {
        target: input.to_string(),
        reason: "no addresses returned".into(),
    })?;
    log::debug!("[resolve] resolved: target={host} ip={ip} candidates={}", addrs.len());
    Ok(ScanTarget::new(input, ip))
}

/// Accepts plain addresses and bracketed IPv6 (`[::1]`).
fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse().ok()
}

fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
}
