//! Line-oriented control input: one command per line, forwarded to the scheduler.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::ControlAction;
use crate::sync::Command;

/// Map one input line to a command. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Result<Command, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return Some(Ok(Command::Quit));
    }
    Some(
        line.parse::<ControlAction>()
            .map(Command::Control)
            .map_err(|err| err.to_string()),
    )
}

/// Forward commands read from `input` until it ends, a `quit` line arrives,
/// or the scheduler goes away.
pub async fn forward_lines<R>(input: R, commands: mpsc::Sender<Command>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "failed to read control input");
                break;
            }
        };
        match parse_line(&line) {
            None => continue,
            Some(Err(err)) => warn!(%err, "ignoring control line"),
            Some(Ok(command)) => {
                let quit = command == Command::Quit;
                debug!(?command, "control input");
                if commands.send(command).await.is_err() || quit {
                    break;
                }
            }
        }
    }
    debug!("control input closed");
}
