//! Output formatting for the installer CLI.
//!
//! Progress and results go to an injected writer so they can be captured in
//! tests. The status report can also be rendered as JSON for scripting.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::io::Write;

use crate::marker::{LOCAL_SENTINEL, VersionStore};
use crate::orchestrator::EnsureOutcome;
use crate::platform::ArtifactDescriptor;

/// Write `message` and a newline to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// What is currently installed in an install directory.
///
/// # Example
///
/// ```
/// use camino::Utf8Path;
/// use dynmod_installer::output::StatusReport;
/// use dynmod_installer::platform::{ArtifactDescriptor, Platform};
///
/// let descriptor = ArtifactDescriptor::new(Platform::MacOs, "tsc-dyn", "tsc_dyn");
/// let report = StatusReport::collect(Utf8Path::new("/nonexistent"), "DYN-VERSION", &descriptor);
///
/// assert_eq!(report.marker, None);
/// assert!(!report.artifact_present);
/// assert!(report.display_text().contains("tsc-dyn.dylib"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// The install directory inspected.
    pub install_dir: Utf8PathBuf,
    /// The recorded version marker, if any.
    pub marker: Option<String>,
    /// Whether the marker pins a locally managed artifact.
    pub pinned: bool,
    /// The platform's artifact naming.
    pub descriptor: ArtifactDescriptor,
    /// The canonical artifact path.
    pub artifact_path: Utf8PathBuf,
    /// Whether the canonical artifact exists.
    pub artifact_present: bool,
}

impl StatusReport {
    /// Inspect `install_dir`.
    #[must_use]
    pub fn collect(
        install_dir: &Utf8Path,
        marker_file: &str,
        descriptor: &ArtifactDescriptor,
    ) -> Self {
        let marker = VersionStore::new(install_dir, marker_file).read();
        let artifact_path = install_dir.join(descriptor.filename());
        Self {
            install_dir: install_dir.to_owned(),
            pinned: marker.as_deref() == Some(LOCAL_SENTINEL),
            marker,
            descriptor: descriptor.clone(),
            artifact_present: artifact_path.is_file(),
            artifact_path,
        }
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn display_text(&self) -> String {
        let marker = match (&self.marker, self.pinned) {
            (Some(_), true) => "LOCAL (pinned; never replaced)".to_owned(),
            (Some(version), false) => version.clone(),
            (None, _) => "none".to_owned(),
        };
        let presence = if self.artifact_present {
            "present"
        } else {
            "missing"
        };
        format!(
            concat!(
                "Install directory: {}\n",
                "Platform: {}\n",
                "Installed version: {}\n",
                "Artifact: {} ({})"
            ),
            self.install_dir,
            self.descriptor.platform(),
            marker,
            self.artifact_path,
            presence
        )
    }

    /// JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Format the result of `ensure` for the user.
#[must_use]
pub fn ensure_message(requested: &str, outcome: &EnsureOutcome) -> String {
    let action = if outcome.acquired {
        "installed and loaded"
    } else {
        "loaded"
    };
    let mut message = format!(
        "Native module {requested} {action} from {}",
        outcome.module_path.display()
    );
    if let Some(mismatch) = &outcome.mismatch {
        message.push_str("\nwarning: ");
        message.push_str(&mismatch.to_string());
    }
    message
}

/// Format a success message after a standalone fetch or build.
#[must_use]
pub fn installed_message(what: &str, artifact_path: &Utf8Path) -> String {
    format!("Successfully {what} {artifact_path}")
}
