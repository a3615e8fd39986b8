//! Platform operations: the command interpreter and file metadata handling.
//!
//! Chosen once at configuration time by [`detect`] and injected wherever a
//! shell command runs or a file's mode and owner are carried over.

use std::fmt;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

/// Captured result of one interpreter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

pub trait PlatformOps: Send + Sync + fmt::Debug {
    /// A command that runs `script` through the platform interpreter.
    fn shell_command(&self, script: &str) -> Command;

    /// Give `target` the permission bits (and, where supported, the owner and
    /// group) described by `source`.
    fn copy_file_metadata(&self, source: &Metadata, target: &Path) -> io::Result<()>;

    /// Run `script` to completion and capture its output.
    fn run(&self, script: &str) -> io::Result<CommandOutput> {
        let output = self.shell_command(script).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `/bin/sh -c`, with mode and ownership preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixPlatform;

impl PlatformOps for PosixPlatform {
    fn shell_command(&self, script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script);
        command
    }

    fn copy_file_metadata(&self, source: &Metadata, target: &Path) -> io::Result<()> {
        fs::set_permissions(target, source.permissions())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            let current = fs::metadata(target)?;
            if current.uid() != source.uid() || current.gid() != source.gid() {
                std::os::unix::fs::chown(target, Some(source.uid()), Some(source.gid()))?;
            }
        }
        Ok(())
    }
}

/// `cmd /C`; only the read-only flag carries over.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortablePlatform;

impl PlatformOps for PortablePlatform {
    fn shell_command(&self, script: &str) -> Command {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(script);
        command
    }

    fn copy_file_metadata(&self, source: &Metadata, target: &Path) -> io::Result<()> {
        fs::set_permissions(target, source.permissions())
    }
}

/// The platform operations for the current target.
pub fn detect() -> Arc<dyn PlatformOps> {
    if cfg!(windows) {
        Arc::new(PortablePlatform)
    } else {
        Arc::new(PosixPlatform)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn runs_through_sh_and_captures_both_streams() {
        let output = PosixPlatform.run("echo out; echo err >&2").expect("run");
        assert!(output.success);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[test]
    fn reports_exit_status() {
        let output = PosixPlatform.run("exit 3").expect("run");
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
    }

    #[test]
    fn mode_is_copied() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::write(&from, "a").expect("write");
        fs::write(&to, "b").expect("write");
        fs::set_permissions(&from, fs::Permissions::from_mode(0o640)).expect("chmod");

        let meta = fs::metadata(&from).expect("stat");
        PosixPlatform.copy_file_metadata(&meta, &to).expect("copy");

        let mode = fs::metadata(&to).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn differing_owner_is_carried_over() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::TempDir::new().expect("tempdir");
        let to = dir.path().join("to");
        fs::write(&to, "b").expect("write");

        if fs::metadata(&to).expect("stat").uid() == 0 {
            let from = dir.path().join("from");
            fs::write(&from, "a").expect("write");
            std::os::unix::fs::chown(&from, Some(1), Some(1)).expect("chown source");

            let meta = fs::metadata(&from).expect("stat");
            PosixPlatform.copy_file_metadata(&meta, &to).expect("copy");

            let copied = fs::metadata(&to).expect("stat");
            assert_eq!((copied.uid(), copied.gid()), (1, 1));
        } else {
            // Unprivileged: handing the file to root is refused by the kernel,
            // which shows the ownership change was attempted.
            let meta = fs::metadata("/").expect("stat root");
            assert_eq!(meta.uid(), 0);
            let err = PosixPlatform
                .copy_file_metadata(&meta, &to)
                .expect_err("chown to root");
            assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        }
    }
}
