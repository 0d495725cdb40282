//! Word-processor document adapter.
//!
//! Best-effort text-node extraction: strip markup tags from the buffer's
//! lossy UTF-8 view, keeping only content between them. Falls back to a
//! readable-run harvest when the markup view yields nothing (compressed
//! containers).

use async_trait::async_trait;
use serde_json::json;

use finbox_core::{DocumentFormat, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result};

use crate::adapters::{harvest_readable_runs, placeholder_outcome};
use crate::quality::score_quality;

pub struct WordDocumentAdapter;

/// Extract text nodes from markup: everything outside `<...>` tags.
fn strip_markup(input: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                // Tag boundaries separate words in the source document.
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            c if !in_tag && !c.is_control() && c != '\u{fffd}' => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl FormatAdapter for WordDocumentAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::WordDocument
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        _passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        let lossy = String::from_utf8_lossy(data);
        let mut text = strip_markup(&lossy);
        let mut method = "markup_strip";

        if text.trim().len() < 20 {
            text = harvest_readable_runs(data, 5);
            method = "readable_runs";
        }

        if text.trim().is_empty() {
            return Ok(placeholder_outcome(
                filename,
                data.len(),
                mime_type,
                "no text nodes found",
            ));
        }

        let score = score_quality(&text, data.len());
        Ok(
            ExtractionOutcome::new(true, text, ExtractionMethod::BufferFallback, score)
                .with_metadata(json!({"scanner": method})),
        )
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "word_document"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_keeps_text_nodes() {
        let xml = "<w:p><w:r><w:t>Loan sanction letter</w:t></w:r></w:p><w:p><w:t>EMI: 12,500</w:t></w:p>";
        let text = strip_markup(xml);
        assert_eq!(text, "Loan sanction letter EMI: 12,500");
    }

    #[test]
    fn test_strip_markup_plain_text_passthrough() {
        assert_eq!(strip_markup("no tags here"), "no tags here");
    }

    #[tokio::test]
    async fn test_extract_xml_document() {
        let xml = b"<?xml version=\"1.0\"?><doc><p>Policy number ABC-123 covers Rs. 10,00,000</p></doc>";
        let outcome = WordDocumentAdapter
            .extract(
                xml,
                "policy.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                &[],
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.text.contains("Policy number ABC-123"));
        assert_eq!(outcome.metadata["scanner"], "markup_strip");
    }

    #[tokio::test]
    async fn test_binary_container_falls_back_to_runs() {
        // An unclosed '<' swallows the markup view, forcing the run harvest.
        let mut data = vec![0u8, b'<'];
        data.extend_from_slice(&[1u8; 32]);
        data.extend_from_slice(b"Insurance Premium Receipt");
        data.push(0);
        let outcome = WordDocumentAdapter
            .extract(&data, "receipt.docx", "application/msword", &[])
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.text.contains("Insurance Premium Receipt"));
        assert_eq!(outcome.metadata["scanner"], "readable_runs");
    }
}
