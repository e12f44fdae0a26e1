//! Latency evaluation: runs questions through retrieval and generation
//! separately and records how long each stage took.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use localrag_core::types::ChunkId;
use localrag_core::{Embedder, GenerationClient};

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLog {
    pub question: String,
    pub answer: Option<String>,
    pub citations: Vec<ChunkId>,
    pub grounded: bool,
    pub retrieval_secs: f64,
    pub generation_secs: f64,
    /// Set when either stage failed; the timings then cover the work done.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub generated_at: String,
    pub index_version: String,
    pub queries: Vec<QueryLog>,
    pub avg_retrieval_secs: f64,
    pub avg_generation_secs: f64,
    pub failures: usize,
}

impl EvalReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One question per non-empty line, surrounding whitespace trimmed.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}

/// Failures are recorded per question and do not stop the run. Averages
/// cover the questions that completed.
pub fn run_eval<E: Embedder, G: GenerationClient>(pipeline: &Pipeline<E, G>, questions: &[String]) -> EvalReport {
    let mut queries = Vec::with_capacity(questions.len());
    for question in questions {
        let mut log = QueryLog {
            question: question.clone(),
            answer: None,
            citations: Vec::new(),
            grounded: false,
            retrieval_secs: 0.0,
            generation_secs: 0.0,
            error: None,
        };

        let start = Instant::now();
        let retrieval = pipeline.retrieve(question);
        log.retrieval_secs = start.elapsed().as_secs_f64();

        match retrieval {
            Ok(retrieval) => {
                let start = Instant::now();
                let answer = pipeline.answer_from(question, &retrieval);
                log.generation_secs = start.elapsed().as_secs_f64();
                match answer {
                    Ok(a) => {
                        log.answer = Some(a.answer);
                        log.citations = a.citations;
                        log.grounded = a.grounded;
                    }
                    Err(e) => log.error = Some(e.to_string()),
                }
            }
            Err(e) => log.error = Some(e.to_string()),
        }
        if let Some(err) = &log.error {
            tracing::warn!(question = %log.question, error = %err, "evaluation query failed");
        }
        queries.push(log);
    }

    let ok: Vec<&QueryLog> = queries.iter().filter(|q| q.error.is_none()).collect();
    let avg = |f: fn(&QueryLog) -> f64| if ok.is_empty() { 0.0 } else { ok.iter().map(|q| f(q)).sum::<f64>() / ok.len() as f64 };
    let report = EvalReport {
        generated_at: Utc::now().to_rfc3339(),
        index_version: pipeline.index().version().to_string(),
        avg_retrieval_secs: avg(|q| q.retrieval_secs),
        avg_generation_secs: avg(|q| q.generation_secs),
        failures: queries.len() - ok.len(),
        queries,
    };
    tracing::info!(
        questions = report.queries.len(),
        failures = report.failures,
        avg_retrieval_secs = report.avg_retrieval_secs,
        avg_generation_secs = report.avg_generation_secs,
        "evaluation finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questions_are_non_empty_trimmed_lines() {
        let qs = parse_questions("  What is the return policy?\n\n\tHow long is shipping?  \n   \n");
        assert_eq!(qs, vec!["What is the return policy?", "How long is shipping?"]);
    }
}
