//! Auto-adoption policy: decides whether the top-ranked correction
//! candidate is safe to apply without human review.

use tracing::debug;

use crate::models::Candidate;
use crate::patterns;

/// Evaluate whether a ranked candidate list should be applied
/// automatically.
///
/// `candidates` must already be sorted confidence-descending. Rules
/// are evaluated in strict order and the first decisive one returns;
/// the result is `(should_auto_adopt, selected_candidate_index)`.
///
/// A candidate that strips replacement glyphs from the original at
/// high confidence is trusted ahead of the proper-noun guard: the
/// glyphs prove the OCR read failed, so the shape of the replacement
/// is not treated as a name. It does not outrank the ambiguity check;
/// two candidates within 0.15 of each other still force review even
/// when the original is garbled.
pub fn evaluate_auto_adopt(
    ocr_text: &str,
    candidates: &[Candidate],
    ocr_confidence: f32,
) -> (bool, Option<usize>) {
    let Some(top) = candidates.first() else {
        return (false, None);
    };

    // Sensitive content is never auto-applied.
    if patterns::contains_sensitive_pattern(ocr_text)
        || patterns::contains_sensitive_pattern(&top.text)
    {
        debug!("auto-adopt rejected: sensitive pattern");
        return (false, None);
    }

    // Split candidates mean an ambiguous top choice.
    if candidates.len() >= 2 && top.confidence - candidates[1].confidence < 0.15 {
        debug!(
            "auto-adopt rejected: confidence gap {:.3} below 0.15",
            top.confidence - candidates[1].confidence
        );
        return (false, None);
    }

    // Garbled glyphs removed with high confidence.
    let garbled_in_original = patterns::contains_garbled_char(ocr_text);
    let garbled_in_candidate = patterns::contains_garbled_char(&top.text);
    if garbled_in_original && !garbled_in_candidate && top.confidence > 0.85 {
        return (true, Some(0));
    }

    // Proper nouns need human review.
    if patterns::looks_like_proper_noun(&top.text) {
        debug!("auto-adopt rejected: proper noun shape");
        return (false, None);
    }

    // Very high confidence match.
    if top.confidence > 0.90 {
        return (true, Some(0));
    }

    // OCR was already confident and the candidate is close to it.
    if ocr_confidence > 0.9
        && top.confidence > 0.85
        && patterns::text_similarity(ocr_text, &top.text) > 0.8
    {
        return (true, Some(0));
    }

    if top.confidence > 0.80 {
        return (true, Some(0));
    }

    (false, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, confidence: f32) -> Candidate {
        Candidate {
            text: text.to_string(),
            confidence,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn empty_candidate_list_is_never_adopted() {
        assert_eq!(evaluate_auto_adopt("text", &[], 0.9), (false, None));
    }

    #[test]
    fn sensitive_patterns_block_adoption_regardless_of_confidence() {
        let cands = vec![candidate("123456", 0.99)];
        assert_eq!(evaluate_auto_adopt("12�456", &cands, 0.9), (false, None));

        let cands = vec![candidate("clean", 0.99)];
        assert_eq!(
            evaluate_auto_adopt("visit https://example.com", &cands, 0.9),
            (false, None)
        );
    }

    #[test]
    fn proper_noun_candidates_require_review() {
        let cands = vec![candidate("Tanaka", 0.99)];
        assert_eq!(evaluate_auto_adopt("tanakaa", &cands, 0.9), (false, None));

        let cands = vec![candidate("タナカ", 0.99)];
        assert_eq!(evaluate_auto_adopt("タナカだ", &cands, 0.9), (false, None));
    }

    #[test]
    fn garbled_removal_outranks_the_proper_noun_guard() {
        // the replacement glyph proves the read failed, so the
        // katakana-shaped candidate is still adopted
        let cands = vec![candidate("タナカ", 0.95)];
        assert_eq!(evaluate_auto_adopt("タ�カ", &cands, 0.3), (true, Some(0)));
    }

    #[test]
    fn split_candidates_require_review() {
        let cands = vec![candidate("Y", 0.7), candidate("Z", 0.6)];
        assert_eq!(evaluate_auto_adopt("X", &cands, 0.5), (false, None));
    }

    #[test]
    fn split_candidates_require_review_even_for_garbled_originals() {
        // a garbled original does not excuse an ambiguous top choice
        let cands = vec![candidate("test", 0.90), candidate("text", 0.80)];
        assert_eq!(evaluate_auto_adopt("te�t", &cands, 0.5), (false, None));
    }

    #[test]
    fn garbled_removed_with_high_confidence_adopts() {
        let cands = vec![candidate("テスト", 0.95)];
        assert_eq!(evaluate_auto_adopt("○□テスト", &cands, 0.3), (true, Some(0)));
    }

    #[test]
    fn garbled_kept_in_candidate_does_not_shortcut() {
        let cands = vec![candidate("te�t", 0.95)];
        // still adopted, but via the plain high-confidence rule
        assert_eq!(evaluate_auto_adopt("te�t!", &cands, 0.4), (true, Some(0)));

        let cands = vec![candidate("te�t", 0.82)];
        assert_eq!(evaluate_auto_adopt("te�t!", &cands, 0.4), (true, Some(0)));
    }

    #[test]
    fn very_high_confidence_adopts() {
        let cands = vec![candidate("corrected words", 0.92)];
        assert_eq!(evaluate_auto_adopt("corupted words", &cands, 0.4), (true, Some(0)));
    }

    #[test]
    fn confident_ocr_plus_similar_candidate_adopts() {
        // confidence 0.86 fails the 0.90 rule but passes the similarity rule
        let cands = vec![candidate("similar text", 0.86)];
        assert_eq!(evaluate_auto_adopt("similar texl", &cands, 0.95), (true, Some(0)));
    }

    #[test]
    fn moderate_confidence_adopts_at_last_resort() {
        let cands = vec![candidate("probably right words", 0.82)];
        assert_eq!(evaluate_auto_adopt("probbly right words", &cands, 0.5), (true, Some(0)));
    }

    #[test]
    fn low_confidence_top_candidate_is_rejected() {
        let cands = vec![candidate("maybe", 0.75)];
        assert_eq!(evaluate_auto_adopt("mayb�", &cands, 0.5), (false, None));
    }
}
