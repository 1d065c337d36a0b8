// Run outcome aggregation and reporting

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::errors::{DownloadError, FetchError};
use super::queue::ItemStatus;

/// Per-item failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Unsatisfiable,
    /// Catalog itself is malformed (duplicate format ids)
    InvalidCatalog,
    Transient,
    Permanent,
    Cancelled,
}

impl ErrorClass {
    pub fn from_fetch(err: &FetchError) -> Self {
        match &err.error {
            DownloadError::Unsatisfiable => Self::Unsatisfiable,
            DownloadError::DuplicateFormatId(_) => Self::InvalidCatalog,
            _ if err.transient => Self::Transient,
            _ => Self::Permanent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsatisfiable => "unsatisfiable",
            Self::InvalidCatalog => "invalid_catalog",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub index: usize,
    pub url: String,
    pub status: ItemStatus,
    /// Adapter attempts made; 0 for items never dispatched
    pub attempts: u32,
    pub error: Option<ErrorClass>,
    pub message: Option<String>,
    pub output: Option<PathBuf>,
    pub degraded: bool,
}

impl ItemOutcome {
    pub fn succeeded(index: usize, url: &str, attempts: u32, output: PathBuf, degraded: bool) -> Self {
        Self {
            index,
            url: url.to_string(),
            status: ItemStatus::Succeeded,
            attempts,
            error: None,
            message: None,
            output: Some(output),
            degraded,
        }
    }

    pub fn failed(index: usize, url: &str, attempts: u32, err: &FetchError) -> Self {
        Self {
            index,
            url: url.to_string(),
            status: ItemStatus::FailedPermanent,
            attempts,
            error: Some(ErrorClass::from_fetch(err)),
            message: Some(err.to_string()),
            output: None,
            degraded: false,
        }
    }

    pub fn skipped(index: usize, url: &str, attempts: u32) -> Self {
        Self {
            index,
            url: url.to_string(),
            status: ItemStatus::Skipped,
            attempts,
            error: Some(ErrorClass::Cancelled),
            message: Some("cancelled before completion".to_string()),
            output: None,
            degraded: false,
        }
    }
}

/// Result of processing the whole queue, ordered by queue index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub items: Vec<ItemOutcome>,
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    items: &'a [ItemOutcome],
}

impl RunOutcome {
    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(ItemStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::FailedPermanent)
    }

    pub fn skipped(&self) -> usize {
        self.count(ItemStatus::Skipped)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Human-readable summary printed at the end of a run
    pub fn summary(&self, output_dir: &Path) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Done: {} succeeded, {} failed, {} skipped (of {})",
            self.succeeded(),
            self.failed(),
            self.skipped(),
            self.items.len()
        );

        for item in self.items.iter().filter(|i| i.status == ItemStatus::FailedPermanent) {
            let _ = writeln!(
                out,
                "  #{} {} [{}] {}",
                item.index + 1,
                item.url,
                item.error.map_or("unknown", |e| e.as_str()),
                item.message.as_deref().unwrap_or("")
            );
        }

        let degraded = self.items.iter().filter(|i| i.degraded).count();
        if degraded > 0 {
            let _ = writeln!(out, "  {} item(s) downloaded with a closest-match format", degraded);
        }

        let _ = write!(out, "Output directory: {}", output_dir.display());
        out
    }

    /// Write the outcome as JSON
    pub fn write_report(&self, path: &Path) -> io::Result<()> {
        let report = Report {
            generated_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            items: &self.items,
        };
        let json = serde_json::to_string_pretty(&report).map_err(io::Error::from)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunOutcome {
        RunOutcome {
            items: vec![
                ItemOutcome::succeeded(0, "https://youtu.be/a", 1, PathBuf::from("out/a.mp4"), true),
                ItemOutcome::failed(
                    1,
                    "https://youtu.be/b",
                    3,
                    &FetchError::transient(DownloadError::NetworkTimeout),
                ),
                ItemOutcome::skipped(2, "https://youtu.be/c", 0),
            ],
        }
    }

    #[test]
    fn test_counts() {
        let outcome = sample();
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.skipped(), 1);
        assert!(outcome.has_failures());
        assert!(!RunOutcome::default().has_failures());
    }

    #[test]
    fn test_error_class() {
        let unsat = FetchError::permanent(DownloadError::Unsatisfiable);
        assert_eq!(ErrorClass::from_fetch(&unsat), ErrorClass::Unsatisfiable);
        let bad_url = FetchError::from(DownloadError::InvalidUrl("x".into()));
        assert_eq!(ErrorClass::from_fetch(&bad_url), ErrorClass::Permanent);
        let timeout = FetchError::from(DownloadError::NetworkTimeout);
        assert_eq!(ErrorClass::from_fetch(&timeout), ErrorClass::Transient);
    }

    #[test]
    fn test_duplicate_ids_reported_as_invalid_catalog() {
        let dup = FetchError::permanent(DownloadError::DuplicateFormatId("137".into()));
        assert_eq!(ErrorClass::from_fetch(&dup), ErrorClass::InvalidCatalog);

        let outcome = RunOutcome {
            items: vec![ItemOutcome::failed(0, "https://youtu.be/d", 1, &dup)],
        };
        assert!(outcome
            .summary(Path::new("out"))
            .contains("#1 https://youtu.be/d [invalid_catalog] Invalid catalog: duplicate format id '137'"));
        assert_eq!(
            serde_json::to_value(ErrorClass::InvalidCatalog).unwrap(),
            "invalid_catalog"
        );
    }

    #[test]
    fn test_summary_lists_failures() {
        let text = sample().summary(Path::new("out"));
        assert!(text.starts_with("Done: 1 succeeded, 1 failed, 1 skipped (of 3)"));
        assert!(text.contains("#2 https://youtu.be/b [transient]"));
        assert!(text.contains("1 item(s) downloaded with a closest-match format"));
        assert!(text.ends_with("Output directory: out"));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        sample().write_report(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["items"][1]["status"], "FAILED_PERMANENT");
        assert_eq!(json["items"][1]["error"], "transient");
        assert_eq!(json["items"][2]["error"], "cancelled");
        assert!(json["generated_at"].as_str().unwrap().contains('T'));
    }
}
