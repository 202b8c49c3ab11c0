//! Completion provider abstraction.

use async_trait::async_trait;
use completion_client::{ChatRequest, Completion, CompletionClient, CompletionError};

/// A chat completion backend.
///
/// Implemented for [`CompletionClient`]; tests script responses with
/// [`crate::testing::MockCompletion`].
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, CompletionError>;
}

#[async_trait]
impl CompletionApi for CompletionClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, CompletionError> {
        self.chat_completion(request).await
    }
}
