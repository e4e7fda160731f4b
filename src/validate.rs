//! External structural-validator boundary.
//!
//! The rule engine itself is out of scope: this module defines the seam the
//! pipeline consumes — raw report JSON in, nothing else — plus a CLI-backed
//! implementation for veraPDF. The trait is synchronous by design: validator
//! binaries block on subprocess I/O, so the orchestrator runs calls inside
//! `tokio::task::spawn_blocking` under a per-call timeout rather than
//! pretending the subprocess is async.

use crate::error::RemediateError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

/// Validation profiles understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationProfile {
    /// PDF/UA-1 (default — the compliance model this pipeline remediates).
    #[default]
    PdfUa1,
    /// PDF/UA-2.
    PdfUa2,
    /// PDF/A-1b.
    PdfA1b,
    /// PDF/A-2b.
    PdfA2b,
}

impl ValidationProfile {
    /// The flavour flag the veraPDF CLI expects.
    pub fn flavour(self) -> &'static str {
        match self {
            ValidationProfile::PdfUa1 => "ua1",
            ValidationProfile::PdfUa2 => "ua2",
            ValidationProfile::PdfA1b => "1b",
            ValidationProfile::PdfA2b => "2b",
        }
    }
}

/// A structural validator producing a raw report for [`crate::report::parse_report`].
///
/// Implementations must be cheap to call repeatedly: the pipeline validates
/// once before remediation and once after.
pub trait StructuralValidator: Send + Sync {
    /// Validate document bytes against a profile, returning the raw report.
    ///
    /// Blocking is expected; the orchestrator wraps calls in
    /// `spawn_blocking` + timeout.
    fn validate(
        &self,
        bytes: &[u8],
        profile: ValidationProfile,
    ) -> Result<serde_json::Value, RemediateError>;
}

/// veraPDF CLI adapter.
///
/// Writes the document to a scratch file (the CLI cannot read stdin),
/// invokes `verapdf --format json --flavour <profile>`, and returns the
/// parsed stdout. Exit code 1 means "validated, non-compliant" and is not an
/// error.
pub struct VeraPdfCli {
    binary: PathBuf,
}

impl VeraPdfCli {
    /// Well-known install locations, checked after the `VERAPDF_PATH`
    /// environment variable.
    const KNOWN_PATHS: [&'static str; 3] = [
        "/opt/homebrew/bin/verapdf",
        "/usr/local/bin/verapdf",
        "/usr/bin/verapdf",
    ];

    /// Use an explicit binary path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate the binary: `VERAPDF_PATH` env var, then well-known paths.
    pub fn locate() -> Result<Self, RemediateError> {
        if let Ok(path) = std::env::var("VERAPDF_PATH") {
            if !path.is_empty() {
                return Ok(Self::with_binary(path));
            }
        }
        for candidate in Self::KNOWN_PATHS {
            if std::path::Path::new(candidate).exists() {
                return Ok(Self::with_binary(candidate));
            }
        }
        Err(RemediateError::ValidatorUnavailable {
            detail: "veraPDF not found; install it or set VERAPDF_PATH".to_string(),
        })
    }
}

impl StructuralValidator for VeraPdfCli {
    fn validate(
        &self,
        bytes: &[u8],
        profile: ValidationProfile,
    ) -> Result<serde_json::Value, RemediateError> {
        let mut scratch = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| RemediateError::ValidatorUnavailable {
                detail: format!("scratch file: {e}"),
            })?;
        scratch
            .write_all(bytes)
            .map_err(|e| RemediateError::ValidatorUnavailable {
                detail: format!("scratch write: {e}"),
            })?;

        info!(
            "Running {} --flavour {} ({} bytes)",
            self.binary.display(),
            profile.flavour(),
            bytes.len()
        );

        let output = Command::new(&self.binary)
            .arg("--format")
            .arg("json")
            .arg("--flavour")
            .arg(profile.flavour())
            .arg(scratch.path())
            .output()
            .map_err(|e| RemediateError::ValidatorUnavailable {
                detail: format!("spawn {}: {e}", self.binary.display()),
            })?;

        // 0 = compliant, 1 = validated with failures; anything else is an
        // invocation problem.
        let code = output.status.code().unwrap_or(-1);
        if code != 0 && code != 1 {
            return Err(RemediateError::ValidatorUnavailable {
                detail: format!(
                    "exit code {code}: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        debug!("Validator produced {} bytes of report", output.stdout.len());
        serde_json::from_slice(&output.stdout).map_err(|e| RemediateError::MalformedReport {
            detail: format!("report is not valid JSON: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavour_flags_match_cli_vocabulary() {
        assert_eq!(ValidationProfile::PdfUa1.flavour(), "ua1");
        assert_eq!(ValidationProfile::PdfUa2.flavour(), "ua2");
        assert_eq!(ValidationProfile::PdfA1b.flavour(), "1b");
        assert_eq!(ValidationProfile::PdfA2b.flavour(), "2b");
    }

    #[test]
    fn missing_binary_is_a_validator_error() {
        let cli = VeraPdfCli::with_binary("/definitely/not/verapdf");
        let err = cli
            .validate(b"%PDF-1.7", ValidationProfile::PdfUa1)
            .unwrap_err();
        assert!(matches!(err, RemediateError::ValidatorUnavailable { .. }));
    }
}
