//! GenerationEngine trait definition.
//!
//! This is the port to the external text-generation engine. The call is
//! assumed blocking and long-running (CPU- or GPU-bound), so it is always
//! driven from a dedicated blocking task by the generation worker, never
//! from an async context.
//!
//! The trait is object-safe: the worker and the title generator share an
//! `Arc<dyn GenerationEngine>`.

use murmur_types::engine::{EngineError, GenerationConfig, PromptMessage};

/// Boxed blocking iterator of generated text fragments.
///
/// The iterator may borrow the engine; it lives entirely inside the
/// worker's blocking task.
pub type FragmentIter<'a> = Box<dyn Iterator<Item = Result<String, EngineError>> + Send + 'a>;

/// Port to the external generation engine (prompt in, token stream out).
///
/// Implementations live in murmur-infra (e.g., `OpenAiCompatEngine`).
/// Failure must be observable through the iterator, never a silent hang.
pub trait GenerationEngine: Send + Sync {
    /// Start one blocking generation call.
    ///
    /// Yields text fragments in production order; the iterator ends when
    /// the engine finishes. Errors surface either here (request setup) or
    /// as an `Err` item mid-iteration (stream failure).
    fn generate<'a>(
        &'a self,
        prompt: &[PromptMessage],
        config: &GenerationConfig,
    ) -> Result<FragmentIter<'a>, EngineError>;
}
