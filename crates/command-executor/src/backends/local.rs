//! Local process execution backend

use async_process::Stdio;
use async_trait::async_trait;
use futures_lite::future;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::warn;

use crate::backend::Backend;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::process::CommandOutput;

/// Runs commands as child processes of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

#[async_trait]
impl Backend for LocalBackend {
    async fn execute(&self, command: &Command) -> Result<CommandOutput> {
        let mut async_cmd = command.prepare();
        async_cmd.stdin(Stdio::null());
        async_cmd.stdout(Stdio::piped());
        async_cmd.stderr(Stdio::piped());
        // Dropping the output future on timeout must take the child down with it.
        async_cmd.kill_on_drop(true);

        let child = async_cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::CommandNotFound {
                command: command.get_program().to_string_lossy().into_owned(),
            },
            _ => Error::spawn_failed(format!("Failed to spawn `{}`: {}", command, e)),
        })?;

        let output = match command.get_timeout() {
            Some(timeout) => {
                let finished = async { child.output().await.map(Some) };
                let expired = async {
                    async_io::Timer::after(timeout).await;
                    Ok::<_, std::io::Error>(None)
                };
                match future::or(finished, expired).await? {
                    Some(output) => output,
                    None => return Err(timed_out(command, timeout)),
                }
            }
            None => child.output().await?,
        };

        Ok(CommandOutput {
            status: output.status.into(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn timed_out(command: &Command, timeout: Duration) -> Error {
    warn!("Killed `{}` after {:?}", command, timeout);
    Error::TimedOut {
        command: command.to_string(),
        timeout,
    }
}
