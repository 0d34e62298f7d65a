//! Retrieval-augmented prompt assembly.
//!
//! [`assemble`] queries each knowledge base for context relevant to a
//! prompt and produces two strings: the augmented prompt sent to the model,
//! and the untouched prompt that goes into the persisted chat history.
//! Retrieved context never reaches the history.
//!
//! A failed knowledge-base query fails the whole assembly with
//! [`Error::Retrieval`]; the caller is never handed an un-grounded prompt
//! while believing it was grounded. A query that succeeds but returns no
//! content leaves the prompt un-augmented and logs a warning.

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::{Error, Result};
use crate::models::{QueryOptions, RetrievedChunk};

/// Separator placed between chunk contents in the context block.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Source of context chunks for one knowledge base.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns chunks relevant to `query`, best match first.
    async fn retrieve(
        &self,
        knowledge_id: &str,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Output of [`assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// What the model sees.
    pub for_model: String,
    /// What the history records. Always the caller's original prompt.
    pub for_history: String,
    /// Number of chunks that went into the context block.
    pub chunk_count: usize,
}

impl AssembledPrompt {
    fn passthrough(prompt: &str) -> Self {
        Self {
            for_model: prompt.to_string(),
            for_history: prompt.to_string(),
            chunk_count: 0,
        }
    }

    pub fn is_augmented(&self) -> bool {
        self.chunk_count > 0
    }
}

/// Builds the model prompt for `prompt` from the given knowledge bases.
///
/// With no knowledge ids this is a no-op: both outputs equal `prompt`.
/// Queries run concurrently; context is ordered by knowledge id (input
/// order) and then by rank.
pub async fn assemble(
    retriever: &dyn Retriever,
    prompt: &str,
    knowledge_ids: &[String],
    options: &QueryOptions,
) -> Result<AssembledPrompt> {
    if knowledge_ids.is_empty() {
        return Ok(AssembledPrompt::passthrough(prompt));
    }

    let queries = knowledge_ids.iter().map(|id| async move {
        tracing::debug!(knowledge_id = %id, "querying knowledge base for context");
        retriever
            .retrieve(id, prompt, options)
            .await
            .map_err(|e| Error::Retrieval {
                knowledge_id: id.clone(),
                cause: e.to_string(),
            })
    });
    let per_source = try_join_all(queries).await?;

    let contents: Vec<&str> = per_source
        .iter()
        .flatten()
        .map(|chunk| chunk.content.trim())
        .filter(|content| !content.is_empty())
        .collect();

    if contents.is_empty() {
        tracing::warn!(
            knowledge_bases = knowledge_ids.len(),
            "no context retrieved, sending prompt without augmentation"
        );
        return Ok(AssembledPrompt::passthrough(prompt));
    }

    let context = contents.join(CONTEXT_DELIMITER);
    tracing::info!(chunks = contents.len(), "augmented prompt with retrieved context");

    Ok(AssembledPrompt {
        for_model: build_augmented_prompt(&context, prompt),
        for_history: prompt.to_string(),
        chunk_count: contents.len(),
    })
}

/// Context block, then instruction, then the question.
pub fn build_augmented_prompt(context: &str, prompt: &str) -> String {
    format!(
        "--- Context ---\n{context}\n\n\
         --- Instructions ---\n\
         Please use the context above to answer the question below.\n\n\
         --- Question ---\n{prompt}"
    )
}
