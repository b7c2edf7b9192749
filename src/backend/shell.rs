use crate::backend::{BackendError, BackendResult, CommandRunner};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::trace;

/// How a shell command should be executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    /// Run via `sudo sh -c <cmd>`.
    Sudo,
    /// Run via `sh -c <cmd>` as the current user.
    User,
}

impl Privilege {
    pub fn from_config(use_sudo: bool) -> Self {
        if use_sudo {
            Privilege::Sudo
        } else {
            Privilege::User
        }
    }
}

#[derive(Clone, Debug)]
pub struct ShellRunner {
    privilege: Privilege,
}

impl ShellRunner {
    pub fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }

    fn command(&self, cmd: &str) -> Command {
        match self.privilege {
            Privilege::Sudo => {
                let mut command = Command::new("sudo");
                command.args(["sh", "-c", cmd]);
                command
            }
            Privilege::User => {
                let mut command = Command::new("sh");
                command.args(["-c", cmd]);
                command
            }
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> BackendResult<String> {
        trace!(cmd, privilege = ?self.privilege, "run");

        let output = self
            .command(cmd)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| BackendError::Spawn {
                command: cmd.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            Err(BackendError::Command {
                command: cmd.to_string(),
                detail,
            })
        }
    }

    fn write_file(&self, path: &Path, contents: &str) -> BackendResult<()> {
        trace!(path = %path.display(), privilege = ?self.privilege, "write_file");

        if self.privilege == Privilege::User {
            return std::fs::write(path, contents).map_err(|e| BackendError::Write {
                path: path.to_path_buf(),
                detail: e.to_string(),
            });
        }

        let write_err = |detail: String| BackendError::Write {
            path: path.to_path_buf(),
            detail,
        };

        let mut child = Command::new("sudo")
            .arg("tee")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| write_err(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(contents.as_bytes())
                .map_err(|e| write_err(e.to_string()))?;
        }

        let output = child.wait_with_output().map_err(|e| write_err(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(write_err(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}
