use crate::backend::{BackendError, BackendResult, CommandRunner, ServiceManager};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

enum Reply {
    Output(String),
    Failure(String),
}

/// Records every command and answers from scripted replies matched by prefix.
/// Unscripted commands succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<String>>,
    replies: RefCell<Vec<(String, Reply)>>,
    writes: RefCell<Vec<(PathBuf, String)>>,
    fail_writes: Cell<bool>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: &str, output: &str) {
        self.replies
            .borrow_mut()
            .push((prefix.to_string(), Reply::Output(output.to_string())));
    }

    pub fn fail(&self, prefix: &str, detail: &str) {
        self.replies
            .borrow_mut()
            .push((prefix.to_string(), Reply::Failure(detail.to_string())));
    }

    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str) -> BackendResult<String> {
        self.commands.borrow_mut().push(command.to_string());

        let replies = self.replies.borrow();
        match replies.iter().find(|(prefix, _)| command.starts_with(prefix.as_str())) {
            Some((_, Reply::Output(output))) => Ok(output.clone()),
            Some((_, Reply::Failure(detail))) => Err(BackendError::Command {
                command: command.to_string(),
                detail: detail.clone(),
            }),
            None => Ok(String::new()),
        }
    }

    fn write_file(&self, path: &Path, contents: &str) -> BackendResult<()> {
        if self.fail_writes.get() {
            return Err(BackendError::Write {
                path: path.to_path_buf(),
                detail: "Permission denied (os error 13)".to_string(),
            });
        }
        self.writes
            .borrow_mut()
            .push((path.to_path_buf(), contents.to_string()));
        Ok(())
    }
}

/// Records service calls as `"<verb> <service>"`.
#[derive(Default)]
pub struct RecordingServices {
    calls: RefCell<Vec<String>>,
    failing: RefCell<Vec<String>>,
}

impl RecordingServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call that would be recorded as `call` fail.
    pub fn fail(&self, call: &str) {
        self.failing.borrow_mut().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, verb: &str, service: &str) -> BackendResult<()> {
        let call = format!("{verb} {service}");
        self.calls.borrow_mut().push(call.clone());
        if self.failing.borrow().contains(&call) {
            Err(BackendError::Unavailable(format!("{call} refused")))
        } else {
            Ok(())
        }
    }
}

impl ServiceManager for RecordingServices {
    fn start(&self, service: &str) -> BackendResult<()> {
        self.record("start", service)
    }

    fn stop(&self, service: &str) -> BackendResult<()> {
        self.record("stop", service)
    }

    fn restart(&self, service: &str) -> BackendResult<()> {
        self.record("restart", service)
    }

    fn enable(&self, service: &str) -> BackendResult<()> {
        self.record("enable", service)
    }
}
