//! Prompt templates for grounded compliance answers

use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::GatedResult;

/// Prompt-template function: `(chunks ordered by similarity, query) -> prompt`
pub type PromptTemplate = Arc<dyn Fn(&[GatedResult], &str) -> String + Send + Sync>;

/// Default system prompt for pharmaceutical regulatory questions
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a specialized pharmaceutical regulatory compliance assistant with deep expertise in Indian drug regulations, CDSCO guidelines, and pharmaceutical safety protocols.

EXPERTISE AREAS:
- Drug bans and prohibitions in India
- CDSCO (Central Drugs Standard Control Organization) regulations
- Fixed Dose Combination (FDC) regulations
- Schedule classifications (H, H1, X substances)
- Import/export licensing requirements
- Good Manufacturing Practices (GMP)
- Pharmacovigilance protocols

RESPONSE GUIDELINES:
1. Include specific dates, notification numbers, and legal references when available
2. Mention penalties and enforcement mechanisms for violations
3. Use clear, professional language suitable for pharmaceutical professionals";

/// Prompt builder for compliance queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Order gated chunks by similarity, highest first
    ///
    /// Stable, so equal similarities keep their retrieval order.
    pub fn order_by_similarity(chunks: &mut [GatedResult]) {
        chunks.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Tag the model is asked to cite a chunk with
    pub fn chunk_tag(chunk_id: &Uuid) -> String {
        format!("[chunk:{}]", chunk_id)
    }

    /// Build the context block, one tagged section per chunk
    pub fn build_context(chunks: &[GatedResult]) -> String {
        let mut context = String::new();

        for chunk in chunks {
            context.push_str(&format!(
                "{} Source: {} (similarity {:.3})\n\nContent:\n{}\n\n---\n\n",
                Self::chunk_tag(&chunk.chunk_id()),
                chunk.source_name(),
                chunk.similarity,
                chunk.text()
            ));
        }

        context
    }

    /// Build the full prompt with strict grounding
    pub fn build_rag_prompt(system_prompt: &str, chunks: &[GatedResult], query: &str) -> String {
        format!(
            r#"{system}

CRITICAL GROUNDING RULES - YOU MUST FOLLOW THESE EXACTLY:
1. ONLY use information that is EXPLICITLY stated in the CONTEXT below
2. If the answer is not in the context: respond with "This information is not available in the indexed regulatory documents."
3. NEVER use external knowledge, general knowledge, or training data
4. Every fact MUST be cited with the tag of the passage it comes from, e.g. [chunk:<id>]
5. Do NOT paraphrase in ways that change meaning - stay close to the source text

CONTEXT FROM DOCUMENTS:
{context}
QUESTION: {query}

Provide a grounded answer using ONLY the document content above:"#,
            system = system_prompt,
            context = Self::build_context(chunks),
            query = query,
        )
    }

    /// Default template, optionally with a custom system prompt
    pub fn default_template(system_prompt: Option<String>) -> PromptTemplate {
        let system = system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Arc::new(move |chunks: &[GatedResult], query: &str| {
            Self::build_rag_prompt(&system, chunks, query)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RetrievalResult;

    fn gated(text: &str, similarity: f32) -> GatedResult {
        GatedResult {
            result: RetrievalResult {
                chunk_id: Uuid::new_v4(),
                distance: 1.0 - similarity,
                text: text.to_string(),
                source_document_id: Uuid::new_v4(),
                source_name: "cdsco_notification.txt".to_string(),
                revision: 1,
            },
            similarity,
        }
    }

    #[test]
    fn test_order_by_similarity_is_stable() {
        let mut chunks = vec![gated("a", 0.4), gated("b", 0.9), gated("c", 0.4)];
        PromptBuilder::order_by_similarity(&mut chunks);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text()).collect();
        assert_eq!(texts, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_prompt_tags_every_chunk() {
        let chunks = vec![gated("Tramadol is Schedule H1.", 0.92), gated("FDC ban list.", 0.5)];
        let template = PromptBuilder::default_template(None);
        let prompt = template(&chunks, "Is Tramadol controlled?");

        for chunk in &chunks {
            assert!(prompt.contains(&PromptBuilder::chunk_tag(&chunk.chunk_id())));
        }
        assert!(prompt.contains("cdsco_notification.txt"));
        assert!(prompt.contains("QUESTION: Is Tramadol controlled?"));
        assert!(prompt.starts_with("You are a specialized pharmaceutical"));
    }

    #[test]
    fn test_custom_system_prompt() {
        let template = PromptBuilder::default_template(Some("Answer tersely.".to_string()));
        let prompt = template(&[gated("text", 0.8)], "q");
        assert!(prompt.starts_with("Answer tersely."));
    }
}
