//! Stream controller: binds one request to one relay and one session.
//!
//! Translates relay events into wire frames and sequences persistence and
//! title side effects relative to delivery. Dropping the returned stream
//! (client disconnect) cancels the relay; the partial accumulator is
//! discarded, never committed -- at-most-once, no-partial-commit.

use std::sync::Arc;

use async_stream::stream;
use futures_util::Stream;
use tokio::sync::Mutex;
use tracing::warn;

use murmur_types::chat::Frame;
use murmur_types::engine::{GenerationConfig, MessageRole, PromptMessage, TokenEvent};

use crate::chat::session::ConversationSession;
use crate::chat::store::TurnStore;
use crate::engine::GenerationEngine;
use crate::relay;
use crate::retrieval::RetrievalAugmenter;
use crate::title::{fallback_title, generate_title};
use crate::worker::GenerationWorker;

/// Run one streaming exchange against a conversation session.
///
/// Frame sequence: zero or more `{token, continuing: true}`, then on the
/// first completed exchange a `{title}`, then exactly one terminal frame
/// (`{continuing: false}` or `{error, continuing: false}`), always last.
pub fn stream_exchange<S, R>(
    session: Arc<Mutex<ConversationSession>>,
    store: Arc<S>,
    engine: Arc<dyn GenerationEngine>,
    augmenter: Arc<R>,
    config: GenerationConfig,
    message: String,
) -> impl Stream<Item = Frame> + Send
where
    S: TurnStore + 'static,
    R: RetrievalAugmenter + 'static,
{
    stream! {
        let message = message.trim().to_string();
        if message.is_empty() {
            // Rejected before any side effect; generation never starts.
            yield Frame::error("message is required");
            return;
        }

        // Best-effort context lookup, no session side effects.
        let context = augmenter
            .retrieve(&message)
            .await
            .filter(|block| !block.trim().is_empty());

        // Append the user turn (synchronously persisted) and snapshot the
        // prompt under the session lock, before generation starts.
        let (prompt, first_exchange) = {
            let mut session = session.lock().await;
            let first_exchange = session.turns().is_empty();
            session.append_user(store.as_ref(), &message).await;
            let mut prompt = session.windowed_prompt();
            if let Some(block) = context {
                // Context goes ahead of the user's turn just appended.
                let at = prompt.len().saturating_sub(1);
                prompt.insert(
                    at,
                    PromptMessage::new(
                        MessageRole::System,
                        format!("Relevant context:\n{block}"),
                    ),
                );
            }
            (prompt, first_exchange)
        };

        let (sender, mut receiver) = relay::open();
        let worker = GenerationWorker::spawn(engine.clone(), prompt, config, sender);
        let mut accumulated = String::new();

        loop {
            match receiver.receive().await {
                Some(TokenEvent::Token(text)) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    accumulated.push_str(&text);
                    yield Frame::token(text);
                }
                Some(TokenEvent::Done) => {
                    let title = {
                        let mut session = session.lock().await;
                        session.commit_assistant(store.as_ref(), &accumulated).await;
                        if first_exchange {
                            let title = match generate_title(
                                engine.clone(),
                                &message,
                                &accumulated,
                            )
                            .await
                            {
                                Ok(title) if !title.is_empty() => title,
                                Ok(_) => {
                                    warn!(
                                        conversation_id = %session.id(),
                                        "title generation returned empty text, falling back"
                                    );
                                    fallback_title(&message)
                                }
                                Err(e) => {
                                    warn!(
                                        conversation_id = %session.id(),
                                        error = %e,
                                        "title generation failed, falling back"
                                    );
                                    fallback_title(&message)
                                }
                            };
                            session.set_title(store.as_ref(), &title).await;
                            Some(title)
                        } else {
                            None
                        }
                    };
                    worker.join().await;
                    if let Some(title) = title {
                        yield Frame::title(title);
                    }
                    yield Frame::terminal();
                    break;
                }
                Some(TokenEvent::Failed(reason)) => {
                    // No partial commit: the accumulator is discarded.
                    worker.join().await;
                    yield Frame::error(reason);
                    break;
                }
                None => {
                    // Producer went away without a terminal event.
                    worker.join().await;
                    yield Frame::error("generation ended unexpectedly");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::StreamExt;

    use crate::retrieval::NoRetrieval;
    use crate::testing::{MemoryTurnStore, ScriptedEngine};
    use murmur_types::engine::EngineError;

    struct StaticRetrieval(&'static str);

    impl RetrievalAugmenter for StaticRetrieval {
        async fn retrieve(&self, _query: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    struct Fixture {
        session: Arc<Mutex<ConversationSession>>,
        store: Arc<MemoryTurnStore>,
        engine: Arc<ScriptedEngine>,
    }

    async fn fixture(scripts: Vec<Vec<&str>>, max_pairs: usize) -> Fixture {
        let store = Arc::new(MemoryTurnStore::new());
        let session = Arc::new(Mutex::new(
            ConversationSession::load(store.as_ref(), "local", "conv-1", max_pairs, "Be helpful.")
                .await,
        ));
        Fixture {
            session,
            store,
            engine: Arc::new(ScriptedEngine::new(scripts)),
        }
    }

    fn exchange(
        f: &Fixture,
        message: &str,
    ) -> impl Stream<Item = Frame> + Send + use<> {
        let engine: Arc<dyn GenerationEngine> = f.engine.clone();
        stream_exchange(
            f.session.clone(),
            f.store.clone(),
            engine,
            Arc::new(NoRetrieval),
            GenerationConfig::default(),
            message.to_string(),
        )
    }

    async fn collect(stream: impl Stream<Item = Frame> + Send) -> Vec<Frame> {
        stream.collect().await
    }

    #[tokio::test]
    async fn empty_message_yields_single_error_frame_without_side_effects() {
        let f = fixture(vec![], 5).await;

        let frames = collect(exchange(&f, "   ")).await;

        assert_eq!(frames, vec![Frame::error("message is required")]);
        assert_eq!(f.store.turn_count("conv-1"), 0);
        assert!(f.engine.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn first_message_streams_tokens_title_then_terminal() {
        // First script answers, second script titles.
        let f = fixture(vec![vec!["Hel", "lo", "!"], vec!["Greeting"]], 5).await;

        let frames = collect(exchange(&f, "Hi")).await;

        assert_eq!(
            frames,
            vec![
                Frame::token("Hel"),
                Frame::token("lo"),
                Frame::token("!"),
                Frame::title("Greeting"),
                Frame::terminal(),
            ]
        );
        // Stored history has exactly the user and assistant turns.
        assert_eq!(f.store.turn_count("conv-1"), 2);
        let session = f.session.lock().await;
        assert_eq!(session.title(), Some("Greeting"));
        assert_eq!(session.turns()[1].content, "Hello!");
    }

    #[tokio::test]
    async fn title_fires_only_on_first_exchange() {
        let f = fixture(
            vec![vec!["one"], vec!["First title"], vec!["two"]],
            5,
        )
        .await;

        let first = collect(exchange(&f, "a")).await;
        let second = collect(exchange(&f, "b")).await;

        assert!(first.iter().any(|frame| frame.title.is_some()));
        assert!(!second.iter().any(|frame| frame.title.is_some()));
        assert_eq!(second.last(), Some(&Frame::terminal()));
    }

    #[tokio::test]
    async fn whitespace_only_tokens_are_skipped() {
        let f = fixture(vec![vec!["  ", "Hi", "\n", " there"], vec!["t"]], 5).await;

        let frames = collect(exchange(&f, "hello")).await;

        let tokens: Vec<&str> = frames
            .iter()
            .filter_map(|frame| frame.token.as_deref())
            .collect();
        assert_eq!(tokens, vec!["Hi", " there"]);
        let session = f.session.lock().await;
        assert_eq!(session.turns()[1].content, "Hi there");
    }

    #[tokio::test]
    async fn windowing_bounds_prompt_but_not_display_history() {
        let scripts = vec![
            vec!["r1"], vec!["title"],
            vec!["r2"], vec!["r3"], vec!["r4"], vec!["r5"], vec!["r6"],
        ];
        let f = fixture(scripts, 5).await;

        for i in 0..6 {
            let frames = collect(exchange(&f, &format!("m{i}"))).await;
            assert_eq!(frames.last(), Some(&Frame::terminal()));
        }

        // Full display history: all 12 turns stay in the store.
        assert_eq!(f.store.turn_count("conv-1"), 12);

        // Prompting window: system prompt + last 10 turns only.
        let session = f.session.lock().await;
        let prompt = session.windowed_prompt();
        assert_eq!(prompt.len(), 11);
        assert_eq!(prompt[0].role, MessageRole::System);
        assert_eq!(prompt[1].content, "m1");
    }

    #[tokio::test]
    async fn engine_failure_mid_stream_reports_error_and_commits_nothing() {
        let store = Arc::new(MemoryTurnStore::new());
        let session = Arc::new(Mutex::new(
            ConversationSession::load(store.as_ref(), "local", "conv-1", 5, "").await,
        ));
        let engine: Arc<dyn GenerationEngine> = Arc::new(ScriptedEngine::failing_after(
            vec!["a", "b", "c"],
            EngineError::Stream("engine exploded".to_string()),
        ));

        let frames = collect(stream_exchange(
            session.clone(),
            store.clone(),
            engine,
            Arc::new(NoRetrieval),
            GenerationConfig::default(),
            "question".to_string(),
        ))
        .await;

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], Frame::token("a"));
        assert_eq!(frames[2], Frame::token("c"));
        let last = frames.last().unwrap();
        assert!(last.error.as_deref().unwrap().contains("engine exploded"));
        assert!(last.is_terminal());

        // Only the user turn was persisted; no partial assistant commit.
        assert_eq!(store.turn_count("conv-1"), 1);
        assert_eq!(session.lock().await.turns().len(), 1);
    }

    #[tokio::test]
    async fn client_disconnect_discards_partial_accumulator() {
        let store = Arc::new(MemoryTurnStore::new());
        let session = Arc::new(Mutex::new(
            ConversationSession::load(store.as_ref(), "local", "conv-1", 5, "").await,
        ));
        let engine: Arc<dyn GenerationEngine> = Arc::new(ScriptedEngine::endless("tok"));

        let mut stream = Box::pin(stream_exchange(
            session.clone(),
            store.clone(),
            engine,
            Arc::new(NoRetrieval),
            GenerationConfig::default(),
            "question".to_string(),
        ));

        // Consume a couple of token frames, then drop mid-stream.
        assert!(stream.next().await.unwrap().token.is_some());
        assert!(stream.next().await.unwrap().token.is_some());
        drop(stream);

        // The user turn stays; the partial assistant response never lands.
        assert_eq!(store.turn_count("conv-1"), 1);
        assert_eq!(session.lock().await.turns().len(), 1);
    }

    #[tokio::test]
    async fn retrieval_context_is_injected_ahead_of_the_user_turn() {
        let store = Arc::new(MemoryTurnStore::new());
        let session = Arc::new(Mutex::new(
            ConversationSession::load(store.as_ref(), "local", "conv-1", 5, "Be helpful.").await,
        ));
        let engine = Arc::new(ScriptedEngine::new(vec![vec!["ok"], vec!["t"]]));
        let dyn_engine: Arc<dyn GenerationEngine> = engine.clone();

        let frames = collect(stream_exchange(
            session,
            store,
            dyn_engine,
            Arc::new(StaticRetrieval("stored fact")),
            GenerationConfig::default(),
            "what do you know".to_string(),
        ))
        .await;
        assert_eq!(frames.last(), Some(&Frame::terminal()));

        let prompts = engine.recorded_prompts();
        let prompt = &prompts[0];
        let context_at = prompt.len() - 2;
        assert_eq!(prompt[context_at].role, MessageRole::System);
        assert!(prompt[context_at].content.contains("stored fact"));
        assert_eq!(prompt[prompt.len() - 1].content, "what do you know");
    }
}
