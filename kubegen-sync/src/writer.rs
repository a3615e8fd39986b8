//! Atomic output writer.
//!
//! ## `publish` protocol
//!
//! 1. Stage the rendered bytes in a fresh temp file in the scratch dir.
//! 2. If the target exists, copy its mode and owner onto the temp file and
//!    read it for comparison.
//! 3. Identical content: drop the temp file, leave the target alone.
//! 4. Otherwise rename the temp file over the target (atomic on POSIX).
//!
//! Without a target the bytes go straight to stdout.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use kubegen_core::{GeneratorConfig, PlatformOps};

use crate::error::{io_err, WriteError};

const TEMP_PREFIX: &str = ".kube-gen";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Target was replaced (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Target already held exactly these bytes.
    Unchanged { path: PathBuf },
    /// No target configured; content went to stdout.
    Stdout,
}

impl WriteResult {
    pub fn label(&self) -> &'static str {
        match self {
            WriteResult::Written { .. } => "written",
            WriteResult::Unchanged { .. } => "unchanged",
            WriteResult::Stdout => "stdout",
        }
    }
}

// ---------------------------------------------------------------------------
// OutputWriter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OutputWriter {
    target: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    refuse_overwrite: bool,
    platform: Arc<dyn PlatformOps>,
}

impl OutputWriter {
    pub fn new(target: Option<PathBuf>, platform: Arc<dyn PlatformOps>) -> Self {
        Self {
            target,
            scratch_dir: None,
            refuse_overwrite: false,
            platform,
        }
    }

    pub fn from_config(config: &GeneratorConfig, platform: Arc<dyn PlatformOps>) -> Self {
        Self::new(config.output.clone(), platform)
            .with_scratch_dir(config.scratch_dir.clone())
            .refusing_overwrite(config.refuses_overwrite())
    }

    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn refusing_overwrite(mut self, refuse: bool) -> Self {
        self.refuse_overwrite = refuse;
        self
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Publish `content` to the target, or stdout when there is none.
    pub fn publish(&self, content: &[u8]) -> Result<WriteResult, WriteError> {
        let Some(target) = &self.target else {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(content)
                .and_then(|()| lock.flush())
                .map_err(|e| io_err("<stdout>", e))?;
            return Ok(WriteResult::Stdout);
        };
        self.stage(target, content)?.commit()
    }

    /// Steps 1-2 of the protocol. The returned [`StagedOutput`] removes its
    /// temp file when dropped without [`StagedOutput::commit`].
    pub fn stage(&self, target: &Path, content: &[u8]) -> Result<StagedOutput, WriteError> {
        let parent = parent_dir(target);
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

        let scratch = self.scratch_dir.as_deref().unwrap_or(parent);
        fs::create_dir_all(scratch).map_err(|e| io_err(scratch, e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(scratch)
            .map_err(|e| io_err(scratch, e))?;
        temp.write_all(content)
            .and_then(|()| temp.flush())
            .map_err(|e| io_err(temp.path(), e))?;

        let existing = match fs::metadata(target) {
            Ok(meta) => {
                self.platform
                    .copy_file_metadata(&meta, temp.path())
                    .map_err(|e| io_err(temp.path(), e))?;
                Some(fs::read(target).map_err(|e| io_err(target, e))?)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err(target, e)),
        };

        let unchanged = existing.as_deref() == Some(content);
        Ok(StagedOutput {
            temp,
            target: target.to_path_buf(),
            exists: existing.is_some(),
            unchanged,
            refuse_overwrite: self.refuse_overwrite,
        })
    }
}

fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

// ---------------------------------------------------------------------------
// StagedOutput
// ---------------------------------------------------------------------------

/// Rendered bytes sitting in a temp file, not yet visible at the target.
#[derive(Debug)]
pub struct StagedOutput {
    temp: NamedTempFile,
    target: PathBuf,
    exists: bool,
    unchanged: bool,
    refuse_overwrite: bool,
}

impl StagedOutput {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn is_unchanged(&self) -> bool {
        self.unchanged
    }

    /// Steps 3-4 of the protocol.
    pub fn commit(self) -> Result<WriteResult, WriteError> {
        if self.unchanged {
            tracing::debug!(path = %self.target.display(), "output unchanged");
            return Ok(WriteResult::Unchanged { path: self.target });
        }
        if self.exists && self.refuse_overwrite {
            return Err(WriteError::RefusedOverwrite { path: self.target });
        }

        // On failure the temp file is handed back inside the error and
        // removed when that drops.
        self.temp
            .persist(&self.target)
            .map_err(|e| io_err(&self.target, e.error))?;
        tracing::info!(path = %self.target.display(), "output file created");
        Ok(WriteResult::Written { path: self.target })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kubegen_core::PosixPlatform;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn writer(target: &Path) -> OutputWriter {
        OutputWriter::new(Some(target.to_path_buf()), Arc::new(PosixPlatform))
    }

    fn leftover_temps(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TEMP_PREFIX))
            })
            .collect()
    }

    #[test]
    fn first_publish_returns_written() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        let result = writer(&path).publish(b"hello").expect("publish");
        assert_eq!(result, WriteResult::Written { path: path.clone() });
        assert_eq!(fs::read(&path).expect("read"), b"hello");
        assert!(leftover_temps(tmp.path()).is_empty(), "temp file must be gone");
    }

    #[test]
    fn identical_content_is_unchanged_and_keeps_mtime() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        let w = writer(&path);
        w.publish(b"same").expect("first");
        let mtime_1 = fs::metadata(&path).expect("meta").modified().expect("mtime");

        sleep(Duration::from_millis(1100));
        let result = w.publish(b"same").expect("second");
        assert_eq!(result, WriteResult::Unchanged { path: path.clone() });
        let mtime_2 = fs::metadata(&path).expect("meta").modified().expect("mtime");
        assert_eq!(mtime_2, mtime_1, "mtime changed; file was rewritten");
        assert!(leftover_temps(tmp.path()).is_empty());
    }

    #[test]
    fn changed_content_returns_written() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        let w = writer(&path);
        w.publish(b"v1").expect("first");
        let result = w.publish(b"v2").expect("second");
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read(&path).expect("read"), b"v2");
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("etc").join("nginx").join("upstreams.conf");
        writer(&path).publish(b"content").expect("publish");
        assert!(path.exists());
    }

    #[test]
    fn dropped_stage_leaves_target_intact() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        fs::write(&path, "old").expect("seed");

        let staged = writer(&path).stage(&path, b"new").expect("stage");
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists());
        drop(staged);

        assert_eq!(fs::read_to_string(&path).expect("read"), "old");
        assert!(!temp_path.exists(), "dropped stage must remove its temp file");
    }

    #[test]
    fn scratch_dir_holds_the_temp_file() {
        let tmp = TempDir::new().expect("tempdir");
        let scratch = tmp.path().join("scratch");
        let path = tmp.path().join("out").join("hosts");

        let w = writer(&path).with_scratch_dir(Some(scratch.clone()));
        let staged = w.stage(&path, b"x").expect("stage");
        assert_eq!(staged.temp_path().parent(), Some(scratch.as_path()));
        staged.commit().expect("commit");
        assert!(leftover_temps(&scratch).is_empty());
    }

    #[test]
    fn refused_overwrite_keeps_existing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        fs::write(&path, "old").expect("seed");

        let w = writer(&path).refusing_overwrite(true);
        let err = w.publish(b"new").expect_err("refused");
        assert!(matches!(err, WriteError::RefusedOverwrite { .. }), "got: {err}");
        assert_eq!(fs::read_to_string(&path).expect("read"), "old");

        // Identical content is not an overwrite.
        let result = w.publish(b"old").expect("unchanged");
        assert!(matches!(result, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn refusal_does_not_apply_to_new_files() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        let result = writer(&path).refusing_overwrite(true).publish(b"x").expect("publish");
        assert!(matches!(result, WriteResult::Written { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn existing_mode_is_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("hosts");
        fs::write(&path, "old").expect("seed");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).expect("chmod");

        writer(&path).publish(b"new").expect("publish");
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_temp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().expect("tempdir");
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).expect("mkdir");
        let path = readonly_dir.join("hosts");
        fs::write(&path, "original").expect("seed");
        fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o555)).expect("chmod");

        let scratch = TempDir::new().expect("scratch");
        let w = writer(&path).with_scratch_dir(Some(scratch.path().to_path_buf()));
        let result = w.publish(b"new content");

        fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o755)).expect("chmod");

        // Root ignores directory permissions; only assert when the rename failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).expect("read"), "original");
        }
        assert!(leftover_temps(scratch.path()).is_empty(), "temp file should be cleaned up");
    }
}
