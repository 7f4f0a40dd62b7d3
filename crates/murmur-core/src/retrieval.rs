//! RetrievalAugmenter trait definition.
//!
//! Port to the retrieval subsystem that augments a prompt with external
//! context. Pure, best-effort lookup with no side effects on the session:
//! when it returns a non-empty block, the controller injects it ahead of
//! the user's turn.

/// Best-effort context lookup for a user query.
pub trait RetrievalAugmenter: Send + Sync {
    /// Return a context block relevant to `query`, or `None`.
    fn retrieve(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Option<String>> + Send;
}

/// Default wiring: no retrieval.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetrieval;

impl RetrievalAugmenter for NoRetrieval {
    async fn retrieve(&self, _query: &str) -> Option<String> {
        None
    }
}
