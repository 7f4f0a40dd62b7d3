//! Shared test fakes: a scripted generation engine and an in-memory turn
//! store. Used by the session, worker, and controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use murmur_types::chat::{ConversationMeta, Turn};
use murmur_types::engine::{EngineError, GenerationConfig, PromptMessage};
use murmur_types::error::StoreError;

use crate::chat::store::TurnStore;
use crate::engine::{FragmentIter, GenerationEngine};

/// One scripted engine call: fragments to yield, then an optional failure.
type Script = Vec<Result<String, EngineError>>;

enum ScriptMode {
    /// Pop one script per `generate` call; empty script when exhausted.
    Queued(Mutex<VecDeque<Script>>),
    /// Fail every call before yielding anything.
    Refuse(Mutex<Option<EngineError>>),
    /// Yield the same fragment forever (cancellation tests).
    Endless(String),
}

/// Deterministic [`GenerationEngine`] for tests.
///
/// Records every prompt it is handed so tests can assert on prompt
/// assembly (windowing, retrieval injection).
pub struct ScriptedEngine {
    mode: ScriptMode,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedEngine {
    /// One script per expected `generate` call, in order.
    pub fn new(scripts: Vec<Vec<&str>>) -> Self {
        let queued = scripts
            .into_iter()
            .map(|script| script.into_iter().map(|s| Ok(s.to_string())).collect())
            .collect();
        Self::with_mode(ScriptMode::Queued(Mutex::new(queued)))
    }

    /// First call yields `fragments` then fails with `error`.
    pub fn failing_after(fragments: Vec<&str>, error: EngineError) -> Self {
        let mut script: Script = fragments.into_iter().map(|s| Ok(s.to_string())).collect();
        script.push(Err(error));
        Self::with_mode(ScriptMode::Queued(Mutex::new(VecDeque::from([script]))))
    }

    /// Every call fails during setup, before any fragment.
    pub fn refusing(error: EngineError) -> Self {
        Self::with_mode(ScriptMode::Refuse(Mutex::new(Some(error))))
    }

    /// Every call yields `fragment` forever.
    pub fn endless(fragment: &str) -> Self {
        Self::with_mode(ScriptMode::Endless(fragment.to_string()))
    }

    fn with_mode(mode: ScriptMode) -> Self {
        Self {
            mode,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt handed to `generate`, in call order.
    pub fn recorded_prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationEngine for ScriptedEngine {
    fn generate<'a>(
        &'a self,
        prompt: &[PromptMessage],
        _config: &GenerationConfig,
    ) -> Result<FragmentIter<'a>, EngineError> {
        self.prompts.lock().unwrap().push(prompt.to_vec());
        match &self.mode {
            ScriptMode::Queued(queue) => {
                let script = queue.lock().unwrap().pop_front().unwrap_or_default();
                Ok(Box::new(script.into_iter()))
            }
            ScriptMode::Refuse(error) => Err(error
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| EngineError::Request("refused".to_string()))),
            ScriptMode::Endless(fragment) => {
                let fragment = fragment.clone();
                Ok(Box::new(std::iter::repeat_with(
                    move || -> Result<String, EngineError> {
                        // Pace the producer so consumers get a chance to cancel.
                        std::thread::sleep(std::time::Duration::from_millis(1));
                        Ok(fragment.clone())
                    },
                )))
            }
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    turns: HashMap<String, Vec<Turn>>,
    conversations: HashMap<String, ConversationMeta>,
}

/// In-memory [`TurnStore`] with switchable read/write failures.
#[derive(Default)]
pub struct MemoryTurnStore {
    inner: Mutex<MemoryInner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryTurnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn turn_count(&self, conversation_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .turns
            .get(conversation_id)
            .map_or(0, Vec::len)
    }
}

impl TurnStore for MemoryTurnStore {
    async fn append(
        &self,
        conversation_id: &str,
        _owner_id: &str,
        turn: &Turn,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("write disabled".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationMeta {
                id: conversation_id.to_string(),
                title: None,
                created_at: Utc::now(),
            });
        inner
            .turns
            .entry(conversation_id.to_string())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn read_all(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Query("read disabled".to_string()));
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .turns
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_title(&self, conversation_id: &str, title: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("write disabled".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        match inner.conversations.get_mut(conversation_id) {
            Some(meta) => {
                meta.title = Some(title.to_string());
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_title(&self, conversation_id: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Query("read disabled".to_string()));
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .conversations
            .get(conversation_id)
            .and_then(|meta| meta.title.clone()))
    }

    async fn create_conversation(
        &self,
        _owner_id: &str,
        conversation_id: &str,
        title: Option<&str>,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("write disabled".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationMeta {
                id: conversation_id.to_string(),
                title: title.map(str::to_string),
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn list_conversations(&self, _owner_id: &str) -> Result<Vec<ConversationMeta>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Query("read disabled".to_string()));
        }
        let mut all: Vec<ConversationMeta> = self
            .inner
            .lock()
            .unwrap()
            .conversations
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
