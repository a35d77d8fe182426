//! Failure artifacts: screenshots and DOM snapshots
//!
//! When a case fails we grab what a human needs to triage it. Capture is
//! best-effort by contract: a broken page must not turn one failure into
//! two, so errors here are logged and the artifact is simply absent.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::error::E2eResult;
use crate::session::ChatSession;

pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> E2eResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stamped(&self, name: &str, extension: &str) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        self.dir.join(format!("{name}_{timestamp}.{extension}"))
    }

    /// Full-page screenshot; returns the path on success.
    pub async fn screenshot(&self, session: &mut ChatSession, name: &str) -> Option<PathBuf> {
        let path = self.stamped(name, "png");
        match session.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(err) => {
                warn!("screenshot '{}' failed: {}", name, err);
                None
            }
        }
    }

    /// Current DOM serialized to an HTML file; returns the path on success.
    pub async fn dom_snapshot(&self, session: &mut ChatSession, name: &str) -> Option<PathBuf> {
        let path = self.stamped(name, "html");
        let html = match session.page_content().await {
            Ok(html) => html,
            Err(err) => {
                warn!("DOM capture '{}' failed: {}", name, err);
                return None;
            }
        };
        match std::fs::write(&path, html) {
            Ok(()) => Some(path),
            Err(err) => {
                warn!("writing DOM snapshot '{}' failed: {}", path.display(), err);
                None
            }
        }
    }

    /// Standard failure bundle for a case: screenshot plus DOM snapshot.
    pub async fn capture_failure(&self, session: &mut ChatSession, case_id: &str) -> Vec<PathBuf> {
        let mut artifacts = Vec::new();
        if let Some(path) = self.screenshot(session, &format!("FAILED_{case_id}")).await {
            artifacts.push(path);
        }
        if let Some(path) = self.dom_snapshot(session, &format!("DOM_{case_id}")).await {
            artifacts.push(path);
        }
        artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_creates_its_directory_and_stamps_names() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = ArtifactSink::new(tmp.path().join("reports")).unwrap();
        assert!(sink.dir().is_dir());

        let path = sink.stamped("FAILED_visa_en", "png");
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("FAILED_visa_en_"));
        assert!(file_name.ends_with(".png"));
    }
}
