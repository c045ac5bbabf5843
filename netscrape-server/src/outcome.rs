//! Result of one scrape and its mapping to an HTTP status.

use axum::http::StatusCode;
use serde::Serialize;

use netscrape_poller::{EXIT_FAILURE, EXIT_USAGE, ScrapeError};

/// Diagnostic message used when a scrape exceeds its budget.
pub const TIMED_OUT: &str = "Killed: Timed out";

/// Everything known about one finished (or killed) scrape.
///
/// Serialized as-is for debug responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeOutcome {
    /// Exit code; `None` when the scrape was killed or crashed.
    pub returncode: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Handoff file, process isolation only.
    pub metrics_filename: Option<String>,
    /// Exposition text.
    pub metrics: String,
}

impl ScrapeOutcome {
    pub fn success(metrics: String) -> Self {
        Self {
            returncode: Some(0),
            metrics,
            ..Self::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            stderr: TIMED_OUT.to_string(),
            ..Self::default()
        }
    }

    /// A scrape that died without an exit code.
    pub fn crashed(reason: impl Into<String>) -> Self {
        Self {
            stderr: reason.into(),
            ..Self::default()
        }
    }

    /// Outcome of an in-process scrape, shaped like the scrape binary's
    /// exit code and output streams.
    pub fn from_result(result: Result<String, ScrapeError>) -> Self {
        match result {
            Ok(metrics) => Self::success(metrics),
            Err(ScrapeError::Usage(message)) => Self {
                returncode: Some(i32::from(EXIT_USAGE)),
                stdout: message,
                ..Self::default()
            },
            Err(e) => Self {
                returncode: Some(i32::from(EXIT_FAILURE)),
                stderr: format!("Error: {}", e),
                ..Self::default()
            },
        }
    }

    /// 0 → 200, 255 → 404, anything else (including no code) → 500.
    pub fn status(&self) -> StatusCode {
        match self.returncode {
            Some(0) => StatusCode::OK,
            Some(code) if code == i32::from(EXIT_USAGE) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body for the status: metrics, stdout or stderr.
    pub fn into_body(self) -> String {
        match self.returncode {
            Some(0) => self.metrics,
            Some(code) if code == i32::from(EXIT_USAGE) => self.stdout,
            _ => self.stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(code: i32) -> ScrapeOutcome {
        ScrapeOutcome {
            returncode: Some(code),
            stdout: "out".into(),
            stderr: "err".into(),
            metrics_filename: None,
            metrics: "m 1\n".into(),
        }
    }

    #[test]
    fn test_success_maps_to_ok_with_metrics() {
        let o = outcome(0);
        assert_eq!(o.status(), StatusCode::OK);
        assert_eq!(o.into_body(), "m 1\n");
    }

    #[test]
    fn test_usage_maps_to_not_found_with_stdout() {
        let o = outcome(255);
        assert_eq!(o.status(), StatusCode::NOT_FOUND);
        assert_eq!(o.into_body(), "out");
    }

    #[test]
    fn test_other_codes_map_to_server_error_with_stderr() {
        let o = outcome(7);
        assert_eq!(o.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(o.into_body(), "err");
    }

    #[test]
    fn test_timeout_is_a_server_error() {
        let o = ScrapeOutcome::timed_out();
        assert_eq!(o.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(o.into_body(), "Killed: Timed out");
    }

    #[test]
    fn test_from_scrape_error() {
        let usage = ScrapeOutcome::from_result(Err(ScrapeError::usage("unknown exporter 'x'")));
        assert_eq!(usage.returncode, Some(255));
        assert_eq!(usage.stdout, "unknown exporter 'x'");

        let failed = ScrapeOutcome::from_result(Err(ScrapeError::AllTargetsFailed(Vec::new())));
        assert_eq!(failed.returncode, Some(1));
        assert!(failed.stderr.starts_with("Error: all 0 targets failed"));
    }

    #[test]
    fn test_debug_serialization() {
        let value = serde_json::to_value(ScrapeOutcome::success("m 1\n".into())).unwrap();

        assert_eq!(value["returncode"], 0);
        assert_eq!(value["metrics"], "m 1\n");
        assert!(value["metrics_filename"].is_null());
        assert_eq!(value["stderr"], "");
    }
}
