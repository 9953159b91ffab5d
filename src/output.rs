use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::assess::Assessment;
use crate::types::ScanReport;

/// What `--output` writes: the scan report and, when one ran, the assessment.
#[derive(Serialize, Debug)]
pub struct ScanOutput<'a> {
    pub report: &'a ScanReport,
    pub assessment: Option<&'a Assessment>,
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to write JSON to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write JSON to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("portrisk-{}-{}", std::process::id(), name))
    }

    #[test]
    fn writes_report_and_assessment() {
        let report = ScanReport {
            target: "127.0.0.1".into(),
            ..Default::default()
        };
        let assessment = Assessment::degraded("boom");
        let path = scratch_path("out.json");
        write_json(
            &path,
            &ScanOutput {
                report: &report,
                assessment: Some(&assessment),
            },
        )
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written["report"]["target"], "127.0.0.1");
        assert_eq!(written["assessment"]["status"], "degraded");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let path = scratch_path("missing-dir").join("out.json");
        let report = ScanReport::default();
        let err = write_json(
            &path,
            &ScanOutput {
                report: &report,
                assessment: None,
            },
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("out.json"), "{err:#}");
    }
}
