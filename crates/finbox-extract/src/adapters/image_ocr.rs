//! Image extraction adapter.
//!
//! Delegates OCR to the external decoder. When the decoder is unavailable
//! the adapter returns a structured OCR-pending placeholder; it never
//! silently returns empty text.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use finbox_core::{DocumentFormat, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result};

use crate::quality::score_quality;
use crate::subprocess::SubprocessDecoder;

pub struct ImageOcrAdapter {
    decoder: SubprocessDecoder,
}

impl ImageOcrAdapter {
    pub fn new(decoder: SubprocessDecoder) -> Self {
        Self { decoder }
    }
}

#[async_trait]
impl FormatAdapter for ImageOcrAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Image
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        _passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        match self.decoder.decode_bytes(data, filename, None).await {
            Ok(out) if out.success && !out.text.trim().is_empty() => {
                let score = score_quality(&out.text, data.len());
                return Ok(
                    ExtractionOutcome::new(true, out.text, ExtractionMethod::Subprocess, score)
                        .with_metadata(json!({"decoder_method": out.method})),
                );
            }
            Ok(_) => debug!(filename, "decoder returned no OCR text"),
            Err(e) => debug!(filename, error = %e, "decoder unavailable for OCR"),
        }

        let text = format!(
            "[OCR pending: {} ({} bytes, {})]",
            filename,
            data.len(),
            mime_type
        );
        Ok(
            ExtractionOutcome::new(false, text, ExtractionMethod::OcrFallback, 0).with_metadata(
                json!({
                    "ocr_pending": true,
                }),
            ),
        )
    }

    async fn health_check(&self) -> Result<bool> {
        self.decoder.health_check().await
    }

    fn name(&self) -> &str {
        "image_ocr"
    }
}
