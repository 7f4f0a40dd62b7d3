//! Generation worker: adapts the blocking engine to the token relay.
//!
//! One worker runs per in-flight request, on its own blocking task so the
//! engine call never stalls the consumer side. Tokens are forwarded to the
//! relay as they are produced; cancellation is observed between
//! productions.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use murmur_types::engine::{GenerationConfig, PromptMessage, TokenEvent};

use crate::engine::GenerationEngine;
use crate::relay::RelaySender;

/// Handle to one in-flight generation task.
pub struct GenerationWorker {
    handle: JoinHandle<()>,
}

impl GenerationWorker {
    /// Start the engine on a dedicated blocking task, forwarding each
    /// fragment to `sender` and closing with exactly one terminal event.
    pub fn spawn(
        engine: Arc<dyn GenerationEngine>,
        prompt: Vec<PromptMessage>,
        config: GenerationConfig,
        sender: RelaySender,
    ) -> Self {
        let handle = tokio::task::spawn_blocking(move || {
            run_generation(engine, prompt, config, sender);
        });
        Self { handle }
    }

    /// Await the underlying task so finished workers never leak.
    ///
    /// Safe to call after the terminal event has been consumed; the task
    /// ends once the engine call returns.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "generation worker task failed to join");
        }
    }
}

/// Forwarding loop, run inside the blocking task.
fn run_generation(
    engine: Arc<dyn GenerationEngine>,
    prompt: Vec<PromptMessage>,
    config: GenerationConfig,
    mut sender: RelaySender,
) {
    let fragments = match engine.generate(&prompt, &config) {
        Ok(fragments) => fragments,
        Err(e) => {
            let _ = sender.send(TokenEvent::Failed(e.to_string()));
            return;
        }
    };

    for fragment in fragments {
        // Cancellation is cooperative: checked between productions. The
        // engine call itself may not be abortable; dropping the iterator
        // lets it run out in the background.
        if sender.is_cancelled() {
            debug!("generation cancelled by consumer, stopping forward loop");
            return;
        }
        match fragment {
            Ok(text) => {
                if sender.send(TokenEvent::Token(text)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = sender.send(TokenEvent::Failed(e.to_string()));
                return;
            }
        }
    }

    let _ = sender.send(TokenEvent::Done);
}
