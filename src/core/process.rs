//! Editor subprocess management
//!
//! Spawns the Neovim backend in embedded mode and owns its lifetime.
//! All RPC traffic flows over the child's stdin/stdout pipes; stderr is
//! discarded so backend diagnostics cannot corrupt the wire stream.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn editor process `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("editor process was spawned without stdio pipes")]
    MissingPipe,
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// Handle to the embedded editor process.
pub struct EditorProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl EditorProcess {
    /// Spawn the editor binary with the given launch arguments, an optional
    /// initialization script and a list of files to open.
    pub fn spawn(
        path: &str,
        args: &[String],
        init_script: Option<&Path>,
        files: &[PathBuf],
    ) -> Result<Self> {
        let mut command = Command::new(path);
        command.args(args);
        if let Some(script) = init_script {
            command.arg("-u").arg(script);
        }
        command.args(files);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            path: path.to_string(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Take ownership of the write half of the RPC channel.
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.stdin.take().ok_or(ProcessError::MissingPipe)
    }

    /// Take ownership of the read half of the RPC channel.
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.stdout.take().ok_or(ProcessError::MissingPipe)
    }

    /// Check whether the child is still alive without blocking.
    #[allow(dead_code)]
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Exit code, if the child has already terminated.
    #[allow(dead_code)]
    pub fn exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    /// Forcibly terminate the child.
    pub fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EditorProcess {
    fn drop(&mut self) {
        // Closing stdin first gives a well-behaved backend the chance to
        // exit on EOF before the kill lands.
        self.stdin.take();
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_reports_path() {
        let err = EditorProcess::spawn("/nonexistent/nvbridge-editor", &[], None, &[])
            .err()
            .expect("spawn must fail");
        match err {
            ProcessError::Spawn { path, .. } => {
                assert_eq!(path, "/nonexistent/nvbridge-editor");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn spawn_and_reap() {
        let mut process =
            EditorProcess::spawn("/bin/cat", &[], None, &[]).expect("cat should spawn");
        assert!(process.take_stdin().is_ok());
        assert!(process.take_stdout().is_ok());
        process.kill();
        assert!(!process.is_running());
    }
}
