//! PDF extraction adapter.
//!
//! Tries the external decoder first, one password candidate per
//! invocation. When the decoder is unavailable, times out, or returns
//! low-quality output, falls back to an in-process scan of the content
//! stream: text-show operators between begin/end-text markers, with
//! hex-encoded runs decoded.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use finbox_core::defaults::{CHARS_PER_PAGE, MIN_USABLE_TEXT_LEN};
use finbox_core::{DocumentFormat, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result};

use crate::adapters::placeholder_outcome;
use crate::quality::score_quality;
use crate::subprocess::SubprocessDecoder;

pub struct PdfAdapter {
    decoder: SubprocessDecoder,
}

impl PdfAdapter {
    pub fn new(decoder: SubprocessDecoder) -> Self {
        Self { decoder }
    }
}

#[async_trait]
impl FormatAdapter for PdfAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        // Decoder first; any failure degrades to the buffer scan.
        match self
            .decoder
            .decode_with_candidates(data, filename, passwords)
            .await
        {
            Ok((out, attempt)) if out.success && out.text.trim().len() >= MIN_USABLE_TEXT_LEN => {
                let score = score_quality(&out.text, data.len());
                let pages = (out.text.chars().count() / CHARS_PER_PAGE).max(1);
                return Ok(
                    ExtractionOutcome::new(true, out.text, ExtractionMethod::Subprocess, score)
                        .with_metadata(json!({
                            "decoder_method": out.method,
                            "password_attempt": attempt,
                            "password_protected": attempt.is_some(),
                            "pages_estimated": pages,
                        })),
                );
            }
            Ok(_) => {
                debug!(filename, "decoder output unusable, scanning buffer");
            }
            Err(e) => {
                debug!(filename, error = %e, "decoder unavailable, scanning buffer");
            }
        }

        let text = scan_pdf_text(data);
        if text.trim().is_empty() {
            return Ok(placeholder_outcome(
                filename,
                data.len(),
                mime_type,
                "no extractable text in content stream",
            ));
        }

        let success = text.trim().len() >= MIN_USABLE_TEXT_LEN;
        let score = score_quality(&text, data.len());
        Ok(
            ExtractionOutcome::new(success, text, ExtractionMethod::BufferFallback, score)
                .with_metadata(json!({"scanner": "text_show_operators"})),
        )
    }

    async fn health_check(&self) -> Result<bool> {
        self.decoder.health_check().await
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// True when the two-byte token at `start` is delimited on both sides.
fn token_boundary(data: &[u8], start: usize, len: usize) -> bool {
    let before_ok = start == 0 || !data[start - 1].is_ascii_alphanumeric();
    let after = start + len;
    let after_ok = after >= data.len() || !data[after].is_ascii_alphanumeric();
    before_ok && after_ok
}

/// Decode a literal string starting at `i` (which indexes `(`), appending
/// printable content to `out`. Returns the index after the closing paren.
fn parse_literal(data: &[u8], i: usize, out: &mut String) -> usize {
    let mut depth = 1;
    let mut j = i + 1;
    while j < data.len() {
        match data[j] {
            b'\\' if j + 1 < data.len() => {
                let esc = data[j + 1];
                match esc {
                    b'n' => out.push('\n'),
                    b'r' | b't' => out.push(' '),
                    b'(' | b')' | b'\\' => out.push(esc as char),
                    b'0'..=b'7' => {
                        // Octal escape, up to three digits.
                        let mut value = 0u32;
                        let mut k = j + 1;
                        while k < data.len() && k < j + 4 && (b'0'..=b'7').contains(&data[k]) {
                            value = value * 8 + (data[k] - b'0') as u32;
                            k += 1;
                        }
                        if let Some(c) = char::from_u32(value).filter(|c| !c.is_control()) {
                            out.push(c);
                        }
                        j = k;
                        continue;
                    }
                    _ => {}
                }
                j += 2;
            }
            b'(' => {
                depth += 1;
                out.push('(');
                j += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return j + 1;
                }
                out.push(')');
                j += 1;
            }
            b => {
                if (32..127).contains(&b) {
                    out.push(b as char);
                }
                j += 1;
            }
        }
    }
    j
}

/// Decode a hex string starting at `i` (which indexes `<`), appending
/// printable decoded bytes to `out`. Returns the index after `>`.
fn parse_hex(data: &[u8], i: usize, out: &mut String) -> usize {
    let mut digits: Vec<u8> = Vec::new();
    let mut j = i + 1;
    while j < data.len() && data[j] != b'>' {
        if data[j].is_ascii_hexdigit() {
            digits.push(data[j]);
        }
        j += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    for pair in digits.chunks(2) {
        let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
        let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
        let byte = hi * 16 + lo;
        // UTF-16BE strings interleave NUL bytes; skip them.
        if (32..127).contains(&byte) {
            out.push(byte as char);
        }
    }
    j.min(data.len() - 1) + 1
}

/// Scan a PDF buffer for text-show content between BT/ET markers.
fn scan_pdf_text(data: &[u8]) -> String {
    let mut out = String::new();
    let mut in_text = false;
    let mut i = 0usize;
    let n = data.len();

    while i < n {
        if !in_text {
            if data[i] == b'B' && i + 1 < n && data[i + 1] == b'T' && token_boundary(data, i, 2) {
                in_text = true;
                i += 2;
            } else {
                i += 1;
            }
        } else {
            match data[i] {
                b'E' if i + 1 < n && data[i + 1] == b'T' && token_boundary(data, i, 2) => {
                    in_text = false;
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    i += 2;
                }
                b'(' => {
                    i = parse_literal(data, i, &mut out);
                    out.push(' ');
                }
                // A single '<' opens a hex string; '<<' opens a dictionary.
                b'<' if i + 1 < n && data[i + 1] != b'<' => {
                    i = parse_hex(data, i, &mut out);
                    out.push(' ');
                }
                b'<' => {
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }
    }

    // Collapse runs of spaces introduced between show operators.
    let collapsed: String = out
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_literal_strings() {
        let pdf = b"%PDF-1.4\nstream\nBT /F1 12 Tf (Account Statement) Tj 0 -14 Td (Balance: 5000) Tj ET\nendstream";
        let text = scan_pdf_text(pdf);
        assert!(text.contains("Account Statement"));
        assert!(text.contains("Balance: 5000"));
    }

    #[test]
    fn test_scan_hex_strings() {
        // "Hi" = 4869
        let pdf = b"BT <4869> Tj ET";
        let text = scan_pdf_text(pdf);
        assert_eq!(text, "Hi");
    }

    #[test]
    fn test_scan_skips_dictionaries() {
        let pdf = b"BT << /Type /Font >> (real text) Tj ET";
        let text = scan_pdf_text(pdf);
        assert!(text.contains("real text"));
        assert!(!text.contains("Type"));
    }

    #[test]
    fn test_scan_escapes() {
        let pdf = br"BT (paren \( inside \) and \\ slash) Tj ET";
        let text = scan_pdf_text(pdf);
        assert!(text.contains("paren ( inside ) and \\ slash"));
    }

    #[test]
    fn test_scan_ignores_text_outside_bt() {
        let pdf = b"(not shown) BT (shown) Tj ET (also not shown)";
        let text = scan_pdf_text(pdf);
        assert_eq!(text, "shown");
    }

    #[test]
    fn test_scan_utf16_hex_drops_nuls() {
        // UTF-16BE "AB" = 00410042
        let pdf = b"BT <00410042> Tj ET";
        assert_eq!(scan_pdf_text(pdf), "AB");
    }

    #[tokio::test]
    async fn test_extract_falls_back_without_decoder() {
        let adapter = PdfAdapter::new(SubprocessDecoder::new("finbox-decoder-does-not-exist"));
        let body = "BT (Electricity bill of Rs. 2,500 due 14/05/2024 for consumer 12345) Tj ET";
        let data = format!("%PDF-1.4\n{}", body);
        let outcome = adapter
            .extract(data.as_bytes(), "bill.pdf", "application/pdf", &[])
            .await
            .unwrap();
        assert_eq!(outcome.method, ExtractionMethod::BufferFallback);
        assert!(outcome.success);
        assert!(outcome.text.contains("Electricity bill"));
        assert!(outcome.quality_score >= 50);
    }

    #[tokio::test]
    async fn test_extract_garbage_yields_placeholder() {
        let adapter = PdfAdapter::new(SubprocessDecoder::new("finbox-decoder-does-not-exist"));
        let outcome = adapter
            .extract(&[0u8; 128], "junk.pdf", "application/pdf", &[])
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(!outcome.text.is_empty());
    }
}
