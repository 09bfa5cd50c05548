//! Operator console.
//!
//! Every line typed on stdin is broadcast to all connected clients. The
//! console is not a registry member, so nobody is excluded from its fanout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::broadcast::{Origin, Payload};
use crate::state::AppState;

/// Relay each line of `input` until end-of-input. Returns the number of lines
/// relayed.
pub async fn run<R>(state: AppState, input: R) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut relayed = 0;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let message = line.trim_end();
                let report = state.relay(Origin::Console, Payload::text(message));
                relayed += 1;
                tracing::info!(
                    recipients = report.delivered,
                    "message sent from console: {message}"
                );
            }
            Ok(None) => {
                tracing::debug!("console input closed");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "console read failed, console disabled");
                break;
            }
        }
    }

    relayed
}

/// Spawn the console reader on the process's stdin.
pub fn spawn(state: AppState) -> JoinHandle<usize> {
    tokio::spawn(async move { run(state, BufReader::new(tokio::io::stdin())).await })
}
