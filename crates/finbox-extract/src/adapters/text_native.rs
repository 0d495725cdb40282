//! Plain-text adapter — pass-through.

use async_trait::async_trait;
use serde_json::json;

use finbox_core::{DocumentFormat, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result};

use crate::quality::score_quality;

pub struct PlainTextAdapter;

#[async_trait]
impl FormatAdapter for PlainTextAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    async fn extract(
        &self,
        data: &[u8],
        _filename: &str,
        _mime_type: &str,
        _passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        let text = String::from_utf8_lossy(data).into_owned();
        let success = !text.trim().is_empty();
        let score = if success {
            score_quality(&text, data.len())
        } else {
            0
        };
        let line_count = text.lines().count();
        Ok(
            ExtractionOutcome::new(success, text, ExtractionMethod::BufferFallback, score)
                .with_metadata(json!({"passthrough": true, "line_count": line_count})),
        )
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "text_native"
    }
}
