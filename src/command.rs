//! Administrative commands.
//!
//! The dashboard can ask whatever owns the operations to terminate one of
//! them. The call is opaque: it either succeeds or fails, and nothing about
//! the displayed data changes until the next poll picks up its effect.

use std::fmt::Debug;

use async_trait::async_trait;
use opwatch_types::AdminCommand;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::CommandError;

/// Somewhere administrative commands can be sent.
#[async_trait]
pub trait CommandSink: Send + Sync + Debug {
    /// Deliver one command.
    async fn send(&self, command: &AdminCommand) -> Result<(), CommandError>;

    /// Terminate the operation with this identifier.
    async fn terminate(&self, id: &str) -> Result<(), CommandError> {
        if id.trim().is_empty() {
            return Err(CommandError::Rejected("empty identifier".to_string()));
        }
        self.send(&AdminCommand::Terminate { id: id.to_string() }).await
    }
}

/// Used when the data source has no way back to the producer (file mode).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCommands;

#[async_trait]
impl CommandSink for NoCommands {
    async fn send(&self, _command: &AdminCommand) -> Result<(), CommandError> {
        Err(CommandError::Unavailable)
    }
}

/// Forwards commands to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelCommandSink {
    tx: mpsc::Sender<AdminCommand>,
}

impl ChannelCommandSink {
    pub fn new(tx: mpsc::Sender<AdminCommand>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver that gets its commands.
    pub fn create(buffer: usize) -> (Self, mpsc::Receiver<AdminCommand>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl CommandSink for ChannelCommandSink {
    async fn send(&self, command: &AdminCommand) -> Result<(), CommandError> {
        self.tx
            .send(command.clone())
            .await
            .map_err(|_| CommandError::Unavailable)
    }
}

/// Writes commands as newline-delimited JSON, e.g. on the write half of the
/// connection the feeds arrive on.
#[derive(Debug)]
pub struct StreamCommandSink<W> {
    writer: Mutex<W>,
}

impl<W> StreamCommandSink<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> CommandSink for StreamCommandSink<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    async fn send(&self, command: &AdminCommand) -> Result<(), CommandError> {
        let mut line = serde_json::to_vec(command)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Result of a dispatched command, reported back to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: AdminCommand,
    pub result: Result<(), String>,
}

/// Forward commands from `rx` to `sink` until cancelled, reporting each
/// outcome on `outcomes`.
pub async fn dispatch(
    sink: std::sync::Arc<dyn CommandSink>,
    mut rx: mpsc::Receiver<AdminCommand>,
    outcomes: mpsc::Sender<CommandOutcome>,
    token: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(command) => command,
                None => break,
            },
        };

        let result = match &command {
            AdminCommand::Terminate { id } => sink.terminate(id).await,
        };
        match &result {
            Ok(()) => info!(?command, "Command sent"),
            Err(e) => error!(?command, error = %e, "Command failed"),
        }

        let outcome = CommandOutcome {
            command,
            result: result.map_err(|e| e.to_string()),
        };
        if outcomes.send(outcome).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn channel_sink_forwards_terminate() {
        let (sink, mut rx) = ChannelCommandSink::create(4);
        sink.terminate("q-1").await.unwrap();
        assert_eq!(rx.recv().await, Some(AdminCommand::Terminate { id: "q-1".into() }));
    }

    #[tokio::test]
    async fn channel_sink_unavailable_when_receiver_dropped() {
        let (sink, rx) = ChannelCommandSink::create(4);
        drop(rx);
        assert!(matches!(sink.terminate("q-1").await, Err(CommandError::Unavailable)));
    }

    #[tokio::test]
    async fn empty_id_is_rejected() {
        let (sink, _rx) = ChannelCommandSink::create(4);
        assert!(matches!(sink.terminate("  ").await, Err(CommandError::Rejected(_))));
    }

    #[tokio::test]
    async fn no_commands_is_unavailable() {
        assert!(matches!(NoCommands.terminate("q-1").await, Err(CommandError::Unavailable)));
    }

    #[tokio::test]
    async fn stream_sink_writes_ndjson() {
        let sink = StreamCommandSink::new(Vec::<u8>::new());
        sink.terminate("q-9").await.unwrap();
        sink.terminate("j-2").await.unwrap();

        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            written,
            "{\"command\":\"terminate\",\"id\":\"q-9\"}\n{\"command\":\"terminate\",\"id\":\"j-2\"}\n"
        );
    }

    #[tokio::test]
    async fn dispatch_reports_outcomes() {
        let (sink, mut sink_rx) = ChannelCommandSink::create(4);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let token = CancellationToken::new();

        let task = tokio::spawn(dispatch(Arc::new(sink), cmd_rx, out_tx, token.clone()));

        cmd_tx.send(AdminCommand::Terminate { id: "q-3".into() }).await.unwrap();
        let outcome = out_rx.recv().await.unwrap();
        assert_eq!(outcome.result, Ok(()));
        assert!(sink_rx.recv().await.is_some());

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_reports_failures() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let token = CancellationToken::new();

        tokio::spawn(dispatch(Arc::new(NoCommands), cmd_rx, out_tx, token.clone()));

        cmd_tx.send(AdminCommand::Terminate { id: "q-3".into() }).await.unwrap();
        let outcome = out_rx.recv().await.unwrap();
        assert!(outcome.result.unwrap_err().contains("No command handler"));
        token.cancel();
    }
}
