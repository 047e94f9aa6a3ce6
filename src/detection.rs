//! Issue detection: turns raw OCR blocks into flagged problem regions,
//! and coalesces spatially adjacent ones.

use tracing::debug;
use uuid::Uuid;

use crate::models::{BBox, Issue, IssueStatus, IssueType, OcrResult};
use crate::patterns;

/// Analyze an OCR result and flag problematic regions on a page.
///
/// Each block is evaluated independently; the issue type is the first
/// check that fires (later checks never override it) while problem
/// notes accumulate from every check. A block surfaces as an issue
/// only when a type was set and at least one problem was recorded.
/// The output is capped at `max_issues`, earliest-detected retained.
pub fn detect_issues(ocr_result: &OcrResult, page_id: Uuid, max_issues: usize) -> Vec<Issue> {
    let mut issues = Vec::new();

    for block in &ocr_result.blocks {
        let mut detected_problems: Vec<String> = Vec::new();
        let mut issue_type: Option<IssueType> = None;

        let text = block.text.as_str();
        let confidence = block.confidence;
        let bbox = block.bbox;
        let char_count = text.chars().count();

        // Check 1: low OCR confidence
        if confidence < 0.8 {
            issue_type = Some(IssueType::LowConfidence);
            detected_problems.push(format!("Low OCR confidence: {:.2}", confidence));
        }

        // Check 2: garbled replacement glyphs
        let garbled_found = patterns::garbled_chars_in(text);
        if !garbled_found.is_empty() {
            issue_type.get_or_insert(IssueType::Garbled);
            let glyphs: Vec<String> = garbled_found.iter().map(|c| c.to_string()).collect();
            detected_problems.push(format!("Garbled characters: {}", glyphs.join(", ")));
        }

        // Check 3: suspicious text shapes
        if patterns::matches_suspicious_pattern(text) {
            issue_type.get_or_insert(IssueType::Garbled);
            detected_problems.push("Suspicious pattern detected".to_string());
        }

        // Check 4: large box with next to no content
        if bbox.width > 100 && bbox.height > 30 && text.trim().chars().count() < 3 {
            issue_type.get_or_insert(IssueType::Missing);
            detected_problems
                .push("Possible missing text: large area with minimal content".to_string());
        }

        // Check 5: unusually sparse characters for the area
        if bbox.width > 0 && bbox.height > 0 {
            let char_density = char_count as f64 / (bbox.area() as f64 / 1000.0);
            if char_density < 0.1 && char_count > 5 {
                issue_type.get_or_insert(IssueType::Missing);
                detected_problems.push(format!("Low character density: {:.3}", char_density));
            }
        }

        if let Some(issue_type) = issue_type {
            if !detected_problems.is_empty() {
                let auto_correctable =
                    evaluate_auto_correctability(text, confidence, &detected_problems);

                issues.push(Issue {
                    id: Uuid::new_v4(),
                    page_id,
                    bbox,
                    issue_type,
                    confidence: Some(confidence),
                    ocr_text: text.to_string(),
                    detected_problems,
                    status: IssueStatus::Detected,
                    auto_correctable,
                    candidates: None,
                });
            }
        }
    }

    if issues.len() > max_issues {
        debug!(
            "Dropping {} excess issues beyond the per-page cap of {}",
            issues.len() - max_issues,
            max_issues
        );
        issues.truncate(max_issues);
    }

    issues
}

/// Whether an issue can likely be corrected without review.
///
/// Sensitive content is rejected outright; garbled glyphs with decent
/// confidence are accepted; low confidence or very short text is too
/// risky.
pub fn evaluate_auto_correctability(text: &str, confidence: f32, problems: &[String]) -> bool {
    if patterns::contains_sensitive_pattern(text) {
        return false;
    }

    if problems.iter().any(|p| p.contains("Garbled")) && confidence > 0.5 {
        return true;
    }

    if confidence < 0.6 {
        return false;
    }

    if text.trim().chars().count() < 5 {
        return false;
    }

    true
}

/// Merge issues whose bboxes sit within `threshold` pixels of each
/// other, greedy single pass.
///
/// The nearby test subtracts the average extents from the center
/// distance on each axis, approximating an edge-to-edge gap. That
/// approximation is not the true rectangle distance and can over-merge
/// widely offset boxes of very different sizes; it is preserved as-is
/// for compatibility (see `merge_gap_is_not_true_rectangle_distance`).
pub fn merge_nearby_issues(issues: Vec<Issue>, threshold: i32) -> Vec<Issue> {
    if issues.len() <= 1 {
        return issues;
    }

    let mut merged: Vec<Issue> = Vec::new();
    let mut used = vec![false; issues.len()];

    for i in 0..issues.len() {
        if used[i] {
            continue;
        }

        let mut current = issues[i].clone();
        used[i] = true;

        for j in (i + 1)..issues.len() {
            if used[j] {
                continue;
            }

            if bboxes_nearby(&current.bbox, &issues[j].bbox, threshold) {
                current = merge_two_issues(current, &issues[j]);
                used[j] = true;
            }
        }

        merged.push(current);
    }

    merged
}

fn bboxes_nearby(a: &BBox, b: &BBox, threshold: i32) -> bool {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();

    let h_gap = (ax - bx).abs() - (a.width + b.width) as f64 / 2.0;
    let v_gap = (ay - by).abs() - (a.height + b.height) as f64 / 2.0;

    h_gap < threshold as f64 && v_gap < threshold as f64
}

fn merge_two_issues(mut current: Issue, other: &Issue) -> Issue {
    current.bbox = current.bbox.union(&other.bbox);

    current.ocr_text = format!("{} {}", current.ocr_text, other.ocr_text)
        .trim()
        .to_string();

    for problem in &other.detected_problems {
        if !current.detected_problems.contains(problem) {
            current.detected_problems.push(problem.clone());
        }
    }

    current.confidence = match (current.confidence, other.confidence) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    current
}
