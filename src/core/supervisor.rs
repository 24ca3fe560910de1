//! Lifecycle of the inference server subprocess.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum SupervisorError {
    Spawn { command: String, source: io::Error },
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::Spawn { command, source } => write!(
                f,
                "failed to start '{command}': {source}. Is it installed and on your PATH?"
            ),
        }
    }
}

impl StdError for SupervisorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SupervisorError::Spawn { source, .. } => Some(source),
        }
    }
}

/// Owns the server child process. The child is killed when the supervisor
/// is dropped.
pub struct ServerSupervisor {
    command_line: String,
    child: Option<Child>,
}

impl ServerSupervisor {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SupervisorError> {
        let command_line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        info!(command = %command_line, pid = child.id(), "started inference server");
        Ok(Self {
            command_line,
            child: Some(child),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// True while the child has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                debug!(%status, "inference server exited on its own");
                self.child = None;
                false
            }
            Some(Err(err)) => {
                warn!(error = %err, "could not query inference server status");
                false
            }
            None => false,
        }
    }

    /// Kill and reap the server. Safe to call more than once.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();

        if let Some(status) = child.try_wait()? {
            debug!(?pid, %status, "inference server had already exited");
            return Ok(());
        }

        info!(?pid, "stopping inference server");
        child.kill().await
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable; listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_reports_command() {
        let err = match ServerSupervisor::spawn("definitely-not-a-real-server-binary", &[
            "serve".to_string(),
        ]) {
            Ok(_) => panic!("spawn should fail"),
            Err(err) => err,
        };
        let text = err.to_string();
        assert!(text.contains("definitely-not-a-real-server-binary serve"));
        assert!(err.source().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shutdown_kills_and_is_idempotent() {
        let mut supervisor =
            ServerSupervisor::spawn("sleep", &["30".to_string()]).expect("sleep should spawn");
        assert!(supervisor.pid().is_some());
        assert!(supervisor.is_running());

        supervisor.shutdown().await.expect("first shutdown");
        assert!(!supervisor.is_running());
        assert!(supervisor.pid().is_none());
        supervisor.shutdown().await.expect("second shutdown");
    }
}
