use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::error::ScanError;

/// Well-known ports checked by a quick scan.
pub const QUICK_PORTS: &[u16] = &[21, 22, 23, 25, 80, 443, 445, 3306, 3389, 8080];

/// Named port-set generators, expanded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProfile {
    Quick,
    Full,
    Range { start: u32, end: u32 },
    Single(u32),
    List(Vec<u16>),
}

impl ScanProfile {
    /// Port set for this profile, validated to lie within 1..=65535.
    pub fn ports(&self) -> Result<Vec<u16>, ScanError> {
        match self {
            ScanProfile::Quick => Ok(quick_ports()),
            ScanProfile::Full => Ok(full_ports()),
            ScanProfile::Range { start, end } => range_ports(*start, *end),
            ScanProfile::Single(port) => single_port(*port),
            ScanProfile::List(list) => match list.iter().find(|&&p| p == 0) {
                Some(&bad) => Err(ScanError::InvalidPort(u32::from(bad))),
                None => Ok(list.clone()),
            },
        }
    }
}

pub fn quick_ports() -> Vec<u16> {
    QUICK_PORTS.to_vec()
}

/// Every TCP port, 1 through 65535.
pub fn full_ports() -> Vec<u16> {
    (1..=u16::MAX).collect()
}

/// Inclusive range. Fails if `start > end` or either bound is outside 1..=65535.
pub fn range_ports(start: u32, end: u32) -> Result<Vec<u16>, ScanError> {
    let valid = |p: u32| (1..=u32::from(u16::MAX)).contains(&p);
    if start > end || !valid(start) || !valid(end) {
        return Err(ScanError::InvalidRange { start, end });
    }
    // Both bounds fit in u16 after the check above.
    Ok((start as u16..=end as u16).collect())
}

pub fn single_port(port: u32) -> Result<Vec<u16>, ScanError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(vec![p]),
        _ => Err(ScanError::InvalidPort(port)),
    }
}

/// Parse a `a-b` range argument such as `8000-8010`.
pub fn parse_range_arg(s: &str) -> Result<ScanProfile> {
    let (a, b) = s
        .split_once('-')
        .with_context(|| format!("invalid range `{s}`, expected START-END"))?;
    let start: u32 = a.trim().parse().with_context(|| format!("invalid range start: {a}"))?;
    let end: u32 = b.trim().parse().with_context(|| format!("invalid range end: {b}"))?;
    range_ports(start, end)?;
    Ok(ScanProfile::Range { start, end })
}

/// Parse a ports list into a deduplicated list of TCP ports (1..=65535).
///
/// Supported formats per line:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - several of the above separated by commas: `22, 80, 8000-8002`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");

        for item in line.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(item)
                .with_context(|| format!("line {line_no}: invalid port value: {item}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Load a ports list from a file path. Errors if the file cannot be read or parsed.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
