//! CLI error types, exit-code mapping, and error enhancement

use thiserror::Error;

/// CLI-level error.
///
/// `ThresholdExceeded` carries the `--fail-on` exit code without being a
/// runtime failure; the report has already been written when it is raised.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A scan or subcommand operation failed.
    #[error("{0:#}")]
    Command(#[from] anyhow::Error),

    /// IO failure (output file, stdout).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed.
    #[error("report encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Findings met the `--fail-on` severity and count threshold.
    #[error("{count} findings at or above severity '{severity}'")]
    ThresholdExceeded { severity: String, count: usize },
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                        |
    /// |------|--------------------------------|
    /// | 0    | Success                        |
    /// | 1    | Threshold exceeded / any error |
    /// | 2    | Configuration error            |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::ThresholdExceeded { .. } => 1,
            Self::Command(_) | Self::Io(_) | Self::Encode(_) => 1,
        }
    }
}

/// Wrap an error with the failing action and, for well-known GCP failure
/// signatures, an actionable hint. First matching signature wins; unknown
/// errors pass through with only the action prefix.
pub fn enhance(action: &str, err: anyhow::Error) -> anyhow::Error {
    let msg = format!("{err:#}");

    let hint = if msg.contains("could not find default credentials") {
        Some("Configure GCP credentials: run 'gcloud auth application-default login' or set GOOGLE_APPLICATION_CREDENTIALS")
    } else if msg.contains("oauth2: cannot fetch token") {
        Some("GCP credentials expired. Run 'gcloud auth application-default login' to refresh")
    } else if msg.contains("403") || msg.contains("Forbidden") {
        Some("Insufficient permissions. Ensure your account has Compute Viewer and Monitoring Viewer roles")
    } else if msg.contains("429") || msg.contains("RESOURCE_EXHAUSTED") {
        Some("GCP API rate limit hit. Retry with fewer projects or increase timeout")
    } else if msg.contains("404") || msg.contains("notFound") {
        Some("Resource or API not found. Verify the project ID and that required APIs are enabled")
    } else {
        None
    };

    match hint {
        Some(hint) => anyhow::anyhow!("{action}: {msg}\n  hint: {hint}"),
        None => anyhow::anyhow!("{action}: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("bad yaml".to_string()).exit_code(), 2);
        assert_eq!(
            CliError::ThresholdExceeded {
                severity: "high".to_string(),
                count: 3
            }
            .exit_code(),
            1
        );
        assert_eq!(CliError::Command(anyhow!("boom")).exit_code(), 1);
    }

    #[test]
    fn test_enhance_credentials_hint() {
        let err = enhance(
            "initialize GCP Compute client",
            anyhow!("could not find default credentials"),
        );
        let msg = format!("{err:#}");
        assert!(msg.starts_with("initialize GCP Compute client: "));
        assert!(msg.contains("gcloud auth application-default login"));
    }

    #[test]
    fn test_enhance_forbidden_hint() {
        let err = enhance("scan resources", anyhow!("GET …: 403 Forbidden: denied"));
        assert!(format!("{err:#}").contains("Compute Viewer"));
    }

    #[test]
    fn test_enhance_rate_limit_hint() {
        let err = enhance("scan resources", anyhow!("429 RESOURCE_EXHAUSTED"));
        assert!(format!("{err:#}").contains("rate limit"));
    }

    #[test]
    fn test_enhance_not_found_hint() {
        let err = enhance("scan resources", anyhow!("project notFound"));
        assert!(format!("{err:#}").contains("required APIs are enabled"));
    }

    #[test]
    fn test_enhance_first_match_wins() {
        // Both the credentials and 403 signatures appear; credentials is
        // checked first and supplies the hint.
        let err = enhance(
            "scan",
            anyhow!("could not find default credentials (403)"),
        );
        assert!(format!("{err:#}").contains("GOOGLE_APPLICATION_CREDENTIALS"));
        assert!(!format!("{err:#}").contains("Compute Viewer"));
    }

    #[test]
    fn test_enhance_unknown_error_no_hint() {
        let err = enhance("scan resources", anyhow!("socket hangup"));
        let msg = format!("{err:#}");
        assert_eq!(msg, "scan resources: socket hangup");
    }
}
