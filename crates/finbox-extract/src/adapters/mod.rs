//! Per-format extraction adapters and their dispatch registry.

pub mod csv_table;
pub mod image_ocr;
pub mod pdf;
pub mod spreadsheet;
pub mod text_native;
pub mod word_doc;

pub use csv_table::CsvAdapter;
pub use image_ocr::ImageOcrAdapter;
pub use pdf::PdfAdapter;
pub use spreadsheet::SpreadsheetAdapter;
pub use text_native::PlainTextAdapter;
pub use word_doc::WordDocumentAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use finbox_core::{
    DocumentFormat, Error, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result,
};

use crate::subprocess::SubprocessDecoder;

/// Registry mapping document formats to their adapter implementations.
pub struct FormatRegistry {
    adapters: HashMap<DocumentFormat, Arc<dyn FormatAdapter>>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry wired with every built-in adapter, sharing one decoder.
    pub fn with_decoder(decoder: SubprocessDecoder) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfAdapter::new(decoder.clone())));
        registry.register(Arc::new(ImageOcrAdapter::new(decoder)));
        registry.register(Arc::new(CsvAdapter));
        registry.register(Arc::new(SpreadsheetAdapter));
        registry.register(Arc::new(WordDocumentAdapter));
        registry.register(Arc::new(PlainTextAdapter));
        registry
    }

    /// Register an adapter. Replaces any existing adapter for the format.
    pub fn register(&mut self, adapter: Arc<dyn FormatAdapter>) {
        self.adapters.insert(adapter.format(), adapter);
    }

    /// Check if an adapter is registered for the given format.
    pub fn has_adapter(&self, format: DocumentFormat) -> bool {
        self.adapters.contains_key(&format)
    }

    /// List all formats that have registered adapters.
    pub fn available_formats(&self) -> Vec<DocumentFormat> {
        self.adapters.keys().copied().collect()
    }

    /// Extract using the adapter registered for the given format.
    pub async fn extract(
        &self,
        format: DocumentFormat,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        let adapter = self.adapters.get(&format).ok_or_else(|| {
            Error::Extraction(format!("No adapter registered for format: {}", format))
        })?;
        adapter.extract(data, filename, mime_type, passwords).await
    }

    /// Extract an attachment, degrading instead of failing.
    ///
    /// Detects the format from MIME type, extension, and magic bytes, then
    /// dispatches. Unknown formats and adapter errors both yield a
    /// descriptive placeholder outcome rather than an error.
    pub async fn extract_content(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        passwords: &[String],
    ) -> ExtractionOutcome {
        if data.is_empty() {
            return placeholder_outcome(filename, 0, mime_type, "empty attachment");
        }

        let format = DocumentFormat::detect(data, mime_type, filename);
        if format == DocumentFormat::Unknown || !self.has_adapter(format) {
            return placeholder_outcome(filename, data.len(), mime_type, "unsupported format");
        }

        match self
            .extract(format, data, filename, mime_type, passwords)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(filename, format = %format, error = %e, "adapter failed, degrading to placeholder");
                placeholder_outcome(filename, data.len(), mime_type, &e.to_string())
            }
        }
    }

    /// Run health checks on all registered adapters.
    pub async fn health_check_all(&self) -> HashMap<DocumentFormat, bool> {
        let mut results = HashMap::new();
        for (format, adapter) in &self.adapters {
            let healthy = adapter.health_check().await.unwrap_or(false);
            results.insert(*format, healthy);
        }
        results
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptive non-empty placeholder for content that could not be
/// extracted.
pub(crate) fn placeholder_outcome(
    filename: &str,
    byte_size: usize,
    mime_type: &str,
    reason: &str,
) -> ExtractionOutcome {
    let text = format!(
        "[unextracted attachment: {} ({} bytes, {})]",
        filename, byte_size, mime_type
    );
    ExtractionOutcome::new(false, text, ExtractionMethod::BufferFallback, 0).with_metadata(json!({
        "placeholder": true,
        "reason": reason,
    }))
}

/// Harvest runs of printable characters from a binary buffer. Used by the
/// spreadsheet fallback and as a last resort for word documents.
pub(crate) fn harvest_readable_runs(data: &[u8], min_run: usize) -> String {
    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();
    for &b in data {
        if (32..127).contains(&b) || b == b'\t' {
            current.push(b as char);
        } else {
            if current.trim().len() >= min_run && current.chars().any(|c| c.is_alphanumeric()) {
                runs.push(current.trim().to_string());
            }
            current.clear();
        }
    }
    if current.trim().len() >= min_run && current.chars().any(|c| c.is_alphanumeric()) {
        runs.push(current.trim().to_string());
    }
    runs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_empty_has_no_adapters() {
        let registry = FormatRegistry::new();
        assert!(registry.available_formats().is_empty());
        assert!(!registry.has_adapter(DocumentFormat::Pdf));
    }

    #[tokio::test]
    async fn test_registry_with_decoder_covers_formats() {
        let registry = FormatRegistry::with_decoder(SubprocessDecoder::new("decoder"));
        for format in [
            DocumentFormat::Pdf,
            DocumentFormat::Image,
            DocumentFormat::Csv,
            DocumentFormat::Spreadsheet,
            DocumentFormat::WordDocument,
            DocumentFormat::PlainText,
        ] {
            assert!(registry.has_adapter(format), "missing adapter: {}", format);
        }
    }

    #[tokio::test]
    async fn test_extract_content_empty_buffer_is_placeholder() {
        let registry = FormatRegistry::with_decoder(SubprocessDecoder::new("decoder"));
        let outcome = registry
            .extract_content(b"", "x.pdf", "application/pdf", &[])
            .await;
        assert!(!outcome.success);
        assert!(!outcome.text.is_empty());
        assert_eq!(outcome.quality_score, 0);
    }

    #[tokio::test]
    async fn test_extract_content_unknown_format_is_placeholder() {
        let registry = FormatRegistry::with_decoder(SubprocessDecoder::new("decoder"));
        let outcome = registry
            .extract_content(&[0u8; 64], "blob.xyz", "application/octet-stream", &[])
            .await;
        assert!(!outcome.success);
        assert!(outcome.text.contains("blob.xyz"));
        assert!(outcome.text.contains("64 bytes"));
    }

    #[test]
    fn test_harvest_readable_runs() {
        let mut data = vec![0u8, 1, 2];
        data.extend_from_slice(b"Account Balance");
        data.extend_from_slice(&[0xff, 0xfe]);
        data.extend_from_slice(b"INR 5000");
        data.push(0);
        let text = harvest_readable_runs(&data, 5);
        assert!(text.contains("Account Balance"));
        assert!(text.contains("INR 5000"));
    }

    #[test]
    fn test_harvest_skips_short_and_symbol_runs() {
        let data = b"\x00ab\x00!!!!!!!!\x00meaningful text\x00";
        let text = harvest_readable_runs(data, 5);
        assert_eq!(text, "meaningful text");
    }
}
