//! Live log relay from a pipeline run to its consumer.
//!
//! A run writes progress lines through a [`RelaySender`]; the consumer (the
//! HTTP response stream or the terminal) reads them from a [`RelayReceiver`]
//! in order. Terminal escape codes are stripped and blank lines dropped. The
//! run marks the end explicitly with [`RelaySender::finish`].

use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

#[derive(Debug)]
enum RelayMessage {
    Line(String),
    End,
}

/// Create a relay with room for `capacity` undelivered lines.
pub fn channel(capacity: usize) -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RelaySender { tx }, RelayReceiver { rx, done: false })
}

/// Remove terminal escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Writing half of a relay.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::Sender<RelayMessage>,
}

impl RelaySender {
    /// Forward one line. Waits while the buffer is full.
    ///
    /// A consumer that has gone away is not an error for the run.
    pub async fn emit(&self, line: impl Into<String>) {
        let line = strip_ansi(&line.into());
        if line.trim().is_empty() {
            return;
        }
        let _ = self.tx.send(RelayMessage::Line(line)).await;
    }

    /// Signal end of stream.
    pub async fn finish(&self) {
        let _ = self.tx.send(RelayMessage::End).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reading half of a relay.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<RelayMessage>,
    done: bool,
}

impl RelayReceiver {
    /// Next line, or `None` once the run has finished or every sender is gone.
    pub async fn recv(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(RelayMessage::Line(line)) => Some(line),
            Some(RelayMessage::End) | None => {
                self.done = true;
                self.rx.close();
                None
            }
        }
    }

    /// Adapt into a stream of lines.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        let done = self.done;
        ReceiverStream::new(self.rx).map_while(move |message| match message {
            RelayMessage::Line(line) if !done => Some(line),
            _ => None,
        })
    }
}
