// src/exec/command.rs

//! Sink that runs a shell command per reconciliation.
//!
//! The command sees the request in its environment:
//!
//! | variable           | value                                        |
//! |--------------------|----------------------------------------------|
//! | `RELOADQ_CONTEXT`  | owning context                               |
//! | `RELOADQ_SCOPE`    | base package scope                           |
//! | `RELOADQ_UNIT`     | unit id, e.g. `com.example.Foo`              |
//! | `RELOADQ_SOURCE`   | `live` or `file`                             |
//! | `RELOADQ_PAYLOAD`  | class file path (file events only)           |
//! | `RELOADQ_DIGEST`   | blake3 of the new bytes (live events only)   |
//!
//! A non-zero exit status is a failed reconciliation.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::backend::{ReconcileCommand, ReconciliationSink, SinkFuture};
use crate::errors::{ReloadqError, Result};

#[derive(Debug, Clone)]
pub struct CommandSink {
    cmd: String,
}

impl CommandSink {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    fn build(&self, request: &ReconcileCommand) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env("RELOADQ_CONTEXT", request.context.as_str())
            .env("RELOADQ_SCOPE", request.scope.as_str())
            .env("RELOADQ_UNIT", request.unit.as_str())
            .env("RELOADQ_SOURCE", request.source.label());
        if let Some(path) = request.payload.path() {
            cmd.env("RELOADQ_PAYLOAD", path);
        }
        if let Some(digest) = &request.digest {
            cmd.env("RELOADQ_DIGEST", digest);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, request: ReconcileCommand) -> Result<()> {
        let unit = request.unit.clone();
        info!(unit = %unit, cmd = %self.cmd, "starting reconcile command");

        let mut child = self
            .build(&request)
            .spawn()
            .with_context(|| format!("spawning reconcile command for '{unit}'"))?;

        // Always consume stderr so buffers don't fill; log at debug.
        if let Some(stderr) = child.stderr.take() {
            let unit = unit.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(unit = %unit, "stderr: {}", line);
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for reconcile command of '{unit}'"))?;

        if status.success() {
            Ok(())
        } else {
            Err(ReloadqError::Sink(format!(
                "command for '{}' exited with {}",
                unit,
                status.code().unwrap_or(-1)
            )))
        }
    }
}

impl ReconciliationSink for CommandSink {
    fn reconcile(&self, command: ReconcileCommand) -> SinkFuture<'_> {
        Box::pin(self.run(command))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::event::Payload;
    use crate::types::ChannelKind;

    fn request(payload: Payload) -> ReconcileCommand {
        ReconcileCommand {
            context: "app".into(),
            scope: "com.example".into(),
            unit: "com.example.Foo".into(),
            digest: payload.digest(),
            payload,
            source: ChannelKind::FileWatch,
            merged: 1,
            generation: 0,
        }
    }

    #[tokio::test]
    async fn exposes_request_in_environment() {
        let sink = CommandSink::new(
            r#"test "$RELOADQ_UNIT" = com.example.Foo && test "$RELOADQ_PAYLOAD" = /tmp/Foo.class && test "$RELOADQ_SOURCE" = file"#,
        );
        sink.reconcile(request(Payload::File(PathBuf::from("/tmp/Foo.class"))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let sink = CommandSink::new("exit 3");
        let err = sink
            .reconcile(request(Payload::File(PathBuf::from("/tmp/Foo.class"))))
            .await
            .unwrap_err();
        assert!(matches!(err, ReloadqError::Sink(msg) if msg.contains("exited with 3")));
    }
}
