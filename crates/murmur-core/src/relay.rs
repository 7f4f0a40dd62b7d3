//! Token relay: ordered single-producer/single-consumer handoff between a
//! blocking generation context and an async consumption context.
//!
//! The producer side is safe to drive from a blocking thread; the bounded
//! channel provides backpressure if generation ever outpaces consumption.
//! Exactly one terminal event (`Done` or `Failed`) ends every relay;
//! sending anything after it is a programming error and fails fast.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use murmur_types::engine::TokenEvent;

/// Maximum tokens queued between producer and consumer.
///
/// Generation rarely outruns consumption; the bound is a memory safety cap.
const RELAY_CAPACITY: usize = 256;

/// How long a backpressured producer sleeps between cancellation checks.
const BACKPRESSURE_POLL: std::time::Duration = std::time::Duration::from_millis(5);

/// Errors from the producer side of the relay.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelaySendError {
    #[error("event sent after the terminal event")]
    AfterTerminal,

    #[error("relay cancelled by the consumer")]
    Cancelled,

    #[error("relay receiver dropped")]
    Disconnected,
}

/// Open a relay for one streaming request.
///
/// Exactly one sender and one receiver exist per request.
pub fn open() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(RELAY_CAPACITY);
    let cancel = CancellationToken::new();
    (
        RelaySender {
            tx,
            cancel: cancel.clone(),
            terminal_sent: false,
        },
        RelayReceiver {
            rx,
            cancel,
            terminal: None,
        },
    )
}

/// Producer half of the relay. Owned by the generation worker.
pub struct RelaySender {
    tx: mpsc::Sender<TokenEvent>,
    cancel: CancellationToken,
    terminal_sent: bool,
}

impl RelaySender {
    /// Enqueue an event, blocking the producer thread while the channel is
    /// full. Cancellation interrupts the wait, so a consumer that stops
    /// draining cannot wedge the producer.
    ///
    /// Must be called from a blocking context (the worker thread), never
    /// from an async task. Fails fast once a terminal event has been sent.
    pub fn send(&mut self, event: TokenEvent) -> Result<(), RelaySendError> {
        if self.terminal_sent {
            return Err(RelaySendError::AfterTerminal);
        }
        let terminal = event.is_terminal();
        let mut event = event;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RelaySendError::Cancelled);
            }
            match self.tx.try_send(event) {
                Ok(()) => {
                    if terminal {
                        self.terminal_sent = true;
                    }
                    return Ok(());
                }
                Err(mpsc::error::TrySendError::Full(returned)) => {
                    event = returned;
                    std::thread::sleep(BACKPRESSURE_POLL);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    return Err(RelaySendError::Disconnected);
                }
            }
        }
    }

    /// Whether the consumer has requested cancellation.
    ///
    /// The producer checks this between token productions.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumer half of the relay. Owned by the stream controller.
///
/// Dropping the receiver cancels the relay, so a client disconnect that
/// tears down the response stream stops the producer without any explicit
/// bookkeeping.
pub struct RelayReceiver {
    rx: mpsc::Receiver<TokenEvent>,
    cancel: CancellationToken,
    terminal: Option<TokenEvent>,
}

impl RelayReceiver {
    /// Receive the next event, suspending until one is available.
    ///
    /// Events arrive in send order. After the terminal event has been
    /// received, every subsequent call returns that same terminal event.
    /// `None` means the producer went away without sending a terminal
    /// event (producer panic).
    pub async fn receive(&mut self) -> Option<TokenEvent> {
        if let Some(terminal) = self.terminal.clone() {
            return Some(terminal);
        }
        let event = self.rx.recv().await?;
        if event.is_terminal() {
            self.terminal = Some(event.clone());
        }
        Some(event)
    }

    /// Signal the producer to stop as soon as possible.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RelayReceiver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
