//! OCR provider boundary and page-text context helpers.

use async_trait::async_trait;

use crate::errors::CorrectionError;
use crate::models::{BBox, OcrBlock, OcrResult, OcrWord};

/// Text detection over raster bytes. Implementations are selected by
/// explicit configuration and injected at construction; there is no
/// process-global provider.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn detect_text(&self, image_bytes: &[u8]) -> Result<OcrResult, CorrectionError>;
}

/// Deterministic test double: always reports the blocks it was built
/// with, regardless of input bytes.
#[derive(Clone, Default)]
pub struct StubOcrProvider {
    result: OcrResult,
}

impl StubOcrProvider {
    pub fn new(result: OcrResult) -> Self {
        Self { result }
    }

    /// A single-block fixture in the shape real providers emit.
    pub fn single_block(text: &str, bbox: BBox, confidence: f32) -> Self {
        let words: Vec<OcrWord> = text
            .split_whitespace()
            .map(|w| OcrWord {
                text: w.to_string(),
                bbox,
                confidence,
            })
            .collect();

        Self::new(OcrResult {
            full_text: text.to_string(),
            blocks: vec![OcrBlock {
                text: text.to_string(),
                bbox,
                confidence,
                words,
            }],
        })
    }
}

#[async_trait]
impl OcrProvider for StubOcrProvider {
    async fn detect_text(&self, _image_bytes: &[u8]) -> Result<OcrResult, CorrectionError> {
        Ok(self.result.clone())
    }
}

/// Collect up to `max_lines` block texts strictly above and below a
/// target bbox, nearest first-to-last in reading order. Used as
/// surrounding context when asking a generator for candidates.
pub fn context_around_bbox(
    ocr_result: &OcrResult,
    target: BBox,
    max_lines: usize,
) -> (String, String) {
    let mut sorted: Vec<&OcrBlock> = ocr_result.blocks.iter().collect();
    sorted.sort_by_key(|b| b.bbox.y);

    let target_y_end = target.y + target.height;

    let mut before: Vec<&str> = Vec::new();
    let mut after: Vec<&str> = Vec::new();

    for block in sorted {
        let block_y_end = block.bbox.y + block.bbox.height;
        if block_y_end < target.y {
            before.push(&block.text);
        } else if block.bbox.y > target_y_end {
            after.push(&block.text);
        }
    }

    let start = before.len().saturating_sub(max_lines);
    let context_before = before[start..].join("\n");
    let context_after = after[..after.len().min(max_lines)].join("\n");

    (context_before, context_after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, y: i32) -> OcrBlock {
        OcrBlock {
            text: text.to_string(),
            bbox: BBox::new(0, y, 200, 20),
            confidence: 0.9,
            words: Vec::new(),
        }
    }

    fn page(blocks: Vec<OcrBlock>) -> OcrResult {
        OcrResult {
            full_text: String::new(),
            blocks,
        }
    }

    #[tokio::test]
    async fn stub_provider_reports_its_fixture() {
        let stub = StubOcrProvider::single_block("Sample text", BBox::new(100, 100, 200, 50), 0.95);
        let result = stub.detect_text(b"ignored").await.unwrap();

        assert_eq!(result.full_text, "Sample text");
        assert_eq!(result.blocks.len(), 1);
        assert_eq!(result.blocks[0].words.len(), 2);
    }

    #[test]
    fn context_takes_nearest_lines_either_side() {
        let ocr = page(vec![
            block("line one", 0),
            block("line two", 30),
            block("line three", 60),
            block("target", 100),
            block("line four", 140),
            block("line five", 170),
        ]);

        let (before, after) = context_around_bbox(&ocr, BBox::new(0, 100, 200, 20), 2);
        assert_eq!(before, "line two\nline three");
        assert_eq!(after, "line four\nline five");
    }

    #[test]
    fn overlapping_blocks_are_excluded_from_context() {
        let ocr = page(vec![
            block("above", 0),
            block("overlaps target", 95),
            block("below", 200),
        ]);

        let (before, after) = context_around_bbox(&ocr, BBox::new(0, 100, 200, 20), 3);
        assert_eq!(before, "above");
        assert_eq!(after, "below");
    }

    #[test]
    fn context_is_empty_when_nothing_surrounds_the_target() {
        let ocr = page(vec![block("target", 50)]);
        let (before, after) = context_around_bbox(&ocr, BBox::new(0, 50, 200, 20), 3);
        assert!(before.is_empty());
        assert!(after.is_empty());
    }
}
