#[cfg(test)]
pub mod mock;
pub mod shell;
pub mod systemd;

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("command failed: {command}: {detail}")]
    Command { command: String, detail: String },

    #[error("could not run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {detail}", path.display())]
    Write { path: PathBuf, detail: String },

    #[error("service manager unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Runs administrative shell commands on the host.
pub trait CommandRunner {
    /// Runs `command` through the shell and returns trimmed stdout.
    fn run(&self, command: &str) -> BackendResult<String>;

    /// Replaces the file at `path` with `contents`.
    fn write_file(&self, path: &Path, contents: &str) -> BackendResult<()>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &str) -> BackendResult<String> {
        (**self).run(command)
    }

    fn write_file(&self, path: &Path, contents: &str) -> BackendResult<()> {
        (**self).write_file(path, contents)
    }
}

/// Starts, stops and enables system services by name (`dnsmasq`, `miniupnpd`).
pub trait ServiceManager {
    fn start(&self, service: &str) -> BackendResult<()>;
    fn stop(&self, service: &str) -> BackendResult<()>;
    fn restart(&self, service: &str) -> BackendResult<()>;
    fn enable(&self, service: &str) -> BackendResult<()>;
}
