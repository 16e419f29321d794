//! Diagnostic snapshot store
//!
//! Point-in-time screenshots of the automated page, written to a transient
//! per-run directory and attached to the outcome report at the end. Capture
//! failures are never fatal; a missing snapshot must not take down the run
//! it is supposed to document.

use crate::Result;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Collects screenshots for the current run
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captures a screenshot under `<dir>/<name>.png`. `name` may contain
    /// path separators for grouping (e.g. "redeem/0"). Best-effort: failures
    /// are logged and swallowed.
    pub async fn capture(&self, page: &Page, name: &str) -> Option<PathBuf> {
        match self.capture_inner(page, name).await {
            Ok(path) => {
                debug!("Captured snapshot {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Snapshot \"{}\" failed: {}", name, e);
                None
            }
        }
    }

    async fn capture_inner(&self, page: &Page, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("{name}.png"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let bytes = page.screenshot(params).await?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// All snapshot files captured so far, recursively, in path order.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.dir, &mut files);
        files.sort();
        files
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_walks_recursively_in_order() {
        let dir = std::env::temp_dir().join(format!("giftrun-snap-test-{}", std::process::id()));
        let store = SnapshotStore::new(&dir).unwrap();

        std::fs::create_dir_all(dir.join("redeem")).unwrap();
        std::fs::write(dir.join("redeem/1.png"), b"b").unwrap();
        std::fs::write(dir.join("checkout.png"), b"a").unwrap();
        std::fs::write(dir.join("redeem/0.png"), b"c").unwrap();

        let files: Vec<String> = store
            .files()
            .into_iter()
            .map(|p| {
                p.strip_prefix(&dir)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(files, vec!["checkout.png", "redeem/0.png", "redeem/1.png"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
