//! Prompt context assembly from retrieval results or raw chunks.

use crate::error::StoreError;
use crate::models::RetrievalResult;
use crate::store::DocumentStore;

/// Separator between context fragments in a prompt.
const FRAGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Format retrieval results into a context block, most relevant first.
pub fn format_retrieved_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[Excerpt {} - relevance {:.1}%]\n{}",
                i + 1,
                result.similarity * 100.0,
                result.content
            )
        })
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

/// Non-semantic fallback: concatenate stored chunk text in index order,
/// truncated to `max_chars`.
///
/// Used when sources have no embeddings or retrieval returns nothing;
/// an empty retrieval result is a signal to fall back, never a failure.
pub async fn assemble_fallback_context(
    store: &dyn DocumentStore,
    source_ids: &[String],
    max_chars: usize,
) -> Result<String, StoreError> {
    let mut combined = String::new();

    'outer: for source_id in source_ids {
        let chunks = store.chunks_for_source(source_id).await?;
        for chunk in chunks {
            if !combined.is_empty() {
                combined.push_str(FRAGMENT_SEPARATOR);
            }
            combined.push_str(&chunk.content);
            if combined.len() >= max_chars {
                break 'outer;
            }
        }
    }

    if combined.len() > max_chars {
        let truncated = crate::utils::truncate_chars(&combined, max_chars).to_string();
        return Ok(truncated);
    }
    Ok(combined)
}
