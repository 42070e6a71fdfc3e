//! JSON-lines loop: one [`CommandRequest`] per stdin line, one [`CommandResponse`] per
//! stdout line.
//!
//! Stdin requests and watcher reloads share one queue drained by a single task, so intents
//! run one at a time in arrival order.

use anyhow::{Context, Result};
use stepper_protocol::serialize_json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::command::{CommandAction, CommandHandler, CommandRequest, CommandResponse};

const QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum Intent {
    Request(CommandRequest),
    /// A line that did not parse as a request.
    Malformed(anyhow::Error),
    FileChanged,
    Eof,
}

pub fn intent_queue() -> (mpsc::Sender<Intent>, mpsc::Receiver<Intent>) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Forward each non-blank line of `input` into the queue, then [`Intent::Eof`].
pub fn spawn_reader<R>(input: R, intents: mpsc::Sender<Intent>)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            let intent = match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<CommandRequest>(&line) {
                    Ok(request) => Intent::Request(request),
                    Err(err) => Intent::Malformed(
                        anyhow::Error::new(err).context("Invalid JSON command request"),
                    ),
                },
                Ok(None) => Intent::Eof,
                Err(err) => {
                    log::error!("Failed to read stdin: {err}");
                    Intent::Eof
                }
            };
            let done = matches!(intent, Intent::Eof);
            if intents.send(intent).await.is_err() || done {
                break;
            }
        }
    });
}

/// Drain the queue until [`Intent::Eof`] or until every sender is gone.
pub async fn run<W>(
    handler: &mut CommandHandler,
    mut intents: mpsc::Receiver<Intent>,
    output: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(intent) = intents.recv().await {
        let response = match intent {
            Intent::Request(request) => handler.execute(request).await,
            Intent::Malformed(err) => CommandResponse::from_error(&err),
            Intent::FileChanged => {
                if handler.session().is_none() {
                    log::debug!("Trace changed with no open session");
                    continue;
                }
                handler
                    .execute(CommandRequest::bare(CommandAction::Reload))
                    .await
            }
            Intent::Eof => break,
        };
        let mut line = serialize_json(&response)?;
        line.push('\n');
        output
            .write_all(line.as_bytes())
            .await
            .context("Failed to write response")?;
        output.flush().await.context("Failed to flush response")?;
    }
    Ok(())
}
