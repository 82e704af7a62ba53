//! Notify action backed by an external program.
//!
//! Runs the configured program once per attempt and reports its exit status
//! back to the watchdog. The program is killed if it outlives its timeout or
//! if the attempt is abandoned during shutdown.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use deadman_core::watchdog::saturating_millis;
use deadman_core::{NotifyError, Notifier};

use crate::config::NotifyConfig;

/// Runs `program args...` for every notify attempt.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.timeout)
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    fn name(&self) -> &str {
        &self.program
    }

    async fn attempt(&self) -> Result<(), NotifyError> {
        let start = std::time::Instant::now();

        tracing::debug!(program = %self.program, args = ?self.args, "Running notify program");

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(&self.args)
                .stdin(std::process::Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let elapsed_ms = saturating_millis(start.elapsed());

        match result {
            Ok(Ok(output)) if output.status.success() => {
                tracing::debug!(program = %self.program, elapsed_ms, "Notify program finished");
                Ok(())
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(
                    program = %self.program,
                    elapsed_ms,
                    stderr = %stderr.trim(),
                    "Notify program failed"
                );
                Err(NotifyError::ExitStatus(output.status.code().unwrap_or(-1)))
            }
            Ok(Err(e)) => Err(NotifyError::Spawn(e)),
            Err(_) => Err(NotifyError::TimedOut(self.timeout)),
        }
    }
}
