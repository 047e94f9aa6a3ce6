//! Candidate generator boundary and response parsing.
//!
//! Generators return free-form model text; `parse_candidates_response`
//! digs the JSON array out of it, validates each entry, and ranks the
//! result confidence-descending. Callers always get at least one
//! candidate back.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

use crate::errors::CorrectionError;
use crate::models::Candidate;

/// Proposes replacement texts for a suspect region, given the ROI
/// image and surrounding page text.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(
        &self,
        roi_bytes: &[u8],
        ocr_text: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<Vec<Candidate>, CorrectionError>;
}

/// First JSON array anywhere in the response text.
static JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").unwrap());

/// Extract and normalize candidates from free-form generator output.
///
/// Entries missing a `text` field are dropped; confidence defaults to
/// 0.5 and reason to empty. If no structured candidates survive, the
/// raw response (truncated to 200 chars) is returned as a single
/// low-confidence candidate so the pipeline always has something to
/// rank.
pub fn parse_candidates_response(response_text: &str) -> Vec<Candidate> {
    if let Some(m) = JSON_ARRAY.find(response_text) {
        if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(m.as_str()) {
            let mut valid: Vec<Candidate> = entries
                .iter()
                .filter_map(|entry| {
                    let obj = entry.as_object()?;
                    let text = obj.get("text")?.as_str()?.to_string();
                    Some(Candidate {
                        text,
                        confidence: obj
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.5) as f32,
                        reason: obj
                            .get("reason")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    })
                })
                .collect();

            if !valid.is_empty() {
                valid.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                return valid;
            }
        }
    }

    warn!("Could not parse structured candidates from generator response");
    let truncated: String = response_text.trim().chars().take(200).collect();
    vec![Candidate {
        text: truncated,
        confidence: 0.5,
        reason: "Could not parse structured response".to_string(),
    }]
}

/// Test double that replays a fixed candidate list.
#[derive(Clone, Default)]
pub struct StubGenerator {
    candidates: Vec<Candidate>,
}

impl StubGenerator {
    pub fn new(mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self { candidates }
    }
}

#[async_trait]
impl CandidateGenerator for StubGenerator {
    async fn generate(
        &self,
        _roi_bytes: &[u8],
        ocr_text: &str,
        _context_before: &str,
        _context_after: &str,
    ) -> Result<Vec<Candidate>, CorrectionError> {
        if self.candidates.is_empty() {
            // Same degraded behavior as a real generator with nothing
            // to offer: echo the input as a low-confidence candidate.
            return Ok(vec![Candidate {
                text: ocr_text.to_string(),
                confidence: 0.5,
                reason: "No candidates configured".to_string(),
            }]);
        }
        Ok(self.candidates.clone())
    }
}
