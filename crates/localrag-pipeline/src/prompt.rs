//! Grounded prompt assembly.
//!
//! Layout of a grounded prompt: context header, numbered passages in ranked
//! order (each tagged with its chunk id), the verbatim question, then the
//! grounding instruction. When no passage survives, the fixed out-of-scope
//! prompt is produced instead and the prompt is marked ungrounded.

use localrag_core::config::PromptConfig;
use localrag_core::error::{Error, Result};
use localrag_core::types::{Prompt, RetrievalResult, ScoredChunk};

pub const CONTEXT_HEADER: &str = "Use the following context passages from the document collection.";

pub const GROUNDING_INSTRUCTION: &str = "Answer the question using only the context passages above. \
If the context does not contain the answer, say explicitly that the answer is not found in the provided context. \
Never use outside knowledge.";

pub const OUT_OF_SCOPE_INSTRUCTION: &str = "No passage in the document collection is relevant to this question. \
State that the question is out of scope for the provided documents and do not attempt to answer it.";

/// Returned to the caller whenever no context supports an answer.
pub const OUT_OF_SCOPE_ANSWER: &str =
    "This question is out of scope: the answer was not found in the provided context.";

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(config: PromptConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn max_chars(&self) -> usize {
        self.config.max_prompt_chars
    }

    /// Pure function of its inputs. Drops lowest-ranked passages one at a time
    /// until the prompt fits `max_prompt_chars`.
    pub fn assemble(&self, question: &str, retrieval: &RetrievalResult) -> Result<Prompt> {
        let limit = self.config.max_prompt_chars;
        let mut kept: &[ScoredChunk] = &retrieval.hits;

        while !kept.is_empty() {
            let text = render_grounded(question, kept);
            let len = text.chars().count();
            if len <= limit {
                let dropped: Vec<_> = retrieval.hits[kept.len()..].iter().map(|h| h.chunk.id.clone()).collect();
                if !dropped.is_empty() {
                    tracing::warn!(dropped = ?dropped, limit, "prompt too long, lowest-ranked passages dropped");
                }
                tracing::debug!(chars = len, passages = kept.len(), "grounded prompt assembled");
                return Ok(Prompt {
                    text,
                    grounded: true,
                    included: kept.iter().map(|h| h.chunk.id.clone()).collect(),
                    dropped,
                });
            }
            kept = &kept[..kept.len() - 1];
        }

        let text = render_out_of_scope(question);
        let len = text.chars().count();
        if len > limit {
            return Err(Error::PromptOverflow { required: len, limit });
        }
        if !retrieval.is_empty() {
            tracing::warn!(limit, "no passage fits the prompt limit, answering out of scope");
        }
        Ok(Prompt { text, grounded: false, included: Vec::new(), dropped: retrieval.ids() })
    }
}

fn render_grounded(question: &str, passages: &[ScoredChunk]) -> String {
    let mut out = String::new();
    out.push_str(CONTEXT_HEADER);
    out.push_str("\n\n");
    for (n, hit) in passages.iter().enumerate() {
        out.push_str(&format!("[{}] source: {}", n + 1, hit.chunk.id));
        if let Some(title) = &hit.meta.title {
            out.push_str(&format!(" ({})", title));
        }
        out.push('\n');
        out.push_str(&hit.chunk.text);
        out.push_str("\n\n");
    }
    out.push_str("Question: ");
    out.push_str(question);
    out.push_str("\n\n");
    out.push_str(GROUNDING_INSTRUCTION);
    out
}

fn render_out_of_scope(question: &str) -> String {
    format!("Question: {}\n\n{}", question, OUT_OF_SCOPE_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::{chunk_id, Chunk, SourceMeta};

    fn hit(seq: usize, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk { id: chunk_id("doc", seq), doc_id: "doc".into(), sequence: seq, start: 0, end: text.chars().count(), text: text.into() },
            score,
            meta: SourceMeta::default(),
        }
    }

    fn assembler(max: usize) -> PromptAssembler {
        PromptAssembler::new(PromptConfig { max_prompt_chars: max }).unwrap()
    }

    #[test]
    fn empty_retrieval_gives_the_fixed_out_of_scope_prompt() {
        let prompt = assembler(10_000).assemble("What is the capital of France?", &RetrievalResult::default()).unwrap();
        assert!(!prompt.grounded);
        assert!(prompt.included.is_empty());
        assert_eq!(prompt.text, render_out_of_scope("What is the capital of France?"));
        assert!(!prompt.text.contains(CONTEXT_HEADER));
    }

    #[test]
    fn passages_appear_in_rank_order_before_question_and_instruction() {
        let r = RetrievalResult { hits: vec![hit(0, "first passage", 0.9), hit(1, "second passage", 0.5)] };
        let prompt = assembler(10_000).assemble("why?", &r).unwrap();

        assert!(prompt.grounded);
        assert_eq!(prompt.included, vec!["doc:0", "doc:1"]);
        let first = prompt.text.find("first passage").unwrap();
        let second = prompt.text.find("second passage").unwrap();
        let question = prompt.text.find("Question: why?").unwrap();
        let instruction = prompt.text.find(GROUNDING_INSTRUCTION).unwrap();
        assert!(first < second && second < question && question < instruction);
        assert!(prompt.text.contains("[1] source: doc:0"));
    }

    #[test]
    fn drops_lowest_ranked_until_it_fits() {
        let r = RetrievalResult { hits: vec![hit(0, &"a".repeat(100), 0.9), hit(1, &"b".repeat(100), 0.8), hit(2, &"c".repeat(100), 0.7)] };
        let two = render_grounded("q", &r.hits[..2]).chars().count();
        let prompt = assembler(two).assemble("q", &r).unwrap();

        assert_eq!(prompt.included, vec!["doc:0", "doc:1"]);
        assert_eq!(prompt.dropped, vec!["doc:2"]);
        assert!(prompt.char_len() <= two);
        assert!(!prompt.text.contains('c'.to_string().repeat(100).as_str()));
    }

    #[test]
    fn falls_back_to_out_of_scope_when_nothing_fits() {
        let r = RetrievalResult { hits: vec![hit(0, &"x".repeat(5_000), 0.9)] };
        let prompt = assembler(1_000).assemble("q", &r).unwrap();
        assert!(!prompt.grounded);
        assert_eq!(prompt.dropped, vec!["doc:0"]);
        assert!(prompt.char_len() <= 1_000);
    }

    #[test]
    fn question_too_long_for_any_prompt_is_an_overflow() {
        let err = assembler(50).assemble(&"why ".repeat(50), &RetrievalResult::default()).unwrap_err();
        assert!(matches!(err, Error::PromptOverflow { limit: 50, .. }));
    }

    #[test]
    fn size_is_counted_in_characters() {
        let r = RetrievalResult { hits: vec![hit(0, "ééééé", 0.9)] };
        let exact = render_grounded("q", &r.hits).chars().count();
        assert!(render_grounded("q", &r.hits).len() > exact);
        assert!(assembler(exact).assemble("q", &r).unwrap().grounded);
    }
}
