//! Bridge to the external decoding subprocess.
//!
//! The decoder is a standalone tool invoked with a file path and an
//! optional `--password` flag. It emits either a JSON object
//! (`{success, text, method, char_count, ...}`) on stdout or raw extracted
//! text. A non-zero exit code or unparseable output means "extraction
//! failed", never "crash the pipeline".

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use finbox_core::defaults::{DECODER_TIMEOUT_SECS, MAX_PASSWORD_ATTEMPTS, MIN_USABLE_TEXT_LEN};
use finbox_core::{Error, Result};

/// Output of one decoder invocation.
#[derive(Debug, Clone)]
pub struct DecoderOutput {
    pub success: bool,
    pub text: String,
    /// Decoder-reported method (e.g. "PyMuPDF", "Tesseract OCR").
    pub method: Option<String>,
    pub char_count: Option<u64>,
    /// True when stdout was not JSON and was taken as raw text.
    pub raw: bool,
}

/// JSON payload the decoder emits on stdout.
#[derive(Debug, Deserialize)]
struct DecoderPayload {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    text: String,
    method: Option<String>,
    char_count: Option<u64>,
}

/// Handle to the external decoding subprocess.
#[derive(Debug, Clone)]
pub struct SubprocessDecoder {
    command: String,
    timeout_secs: u64,
}

impl SubprocessDecoder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout_secs: DECODER_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FINBOX_DECODER_CMD` | `finbox-decoder` | Decoder executable |
    /// | `FINBOX_DECODER_TIMEOUT_SECS` | `30` | Per-invocation cap |
    pub fn from_env() -> Self {
        let command =
            std::env::var("FINBOX_DECODER_CMD").unwrap_or_else(|_| "finbox-decoder".to_string());
        let timeout_secs = std::env::var("FINBOX_DECODER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DECODER_TIMEOUT_SECS);
        Self {
            command,
            timeout_secs,
        }
    }

    /// Override the per-invocation timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Decode a file on disk, optionally with a password.
    #[instrument(skip(self, password), fields(subsystem = "extract", component = "decoder", op = "decode"))]
    pub async fn decode_file(&self, path: &Path, password: Option<&str>) -> Result<DecoderOutput> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(path);
        if let Some(pw) = password {
            if !pw.is_empty() {
                cmd.arg("--password").arg(pw);
            }
        }
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Decoder exceeded {}s for {}",
                    self.timeout_secs,
                    path.display()
                ))
            })?
            .map_err(|e| Error::Extraction(format!("Failed to launch decoder: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Extraction(format!(
                "Decoder failed (exit {}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_decoder_stdout(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    /// Decode raw bytes by staging them in a temp file. The original file
    /// extension is preserved because the decoder dispatches on it.
    pub async fn decode_bytes(
        &self,
        data: &[u8],
        filename: &str,
        password: Option<&str>,
    ) -> Result<DecoderOutput> {
        let tmpfile = stage_temp_file(data, filename)?;
        self.decode_file(tmpfile.path(), password).await
    }

    /// Try candidates in order against one attachment, accepting the first
    /// successful decode whose text clears the usable-length floor.
    ///
    /// The file is staged once. A no-password attempt runs first; the
    /// candidate list is capped at [`MAX_PASSWORD_ATTEMPTS`] to bound
    /// worst-case latency. Returns the best failed output when nothing
    /// clears the floor, or the last error if every invocation failed.
    #[instrument(skip(self, data, candidates), fields(subsystem = "extract", component = "decoder", op = "decode_with_candidates", candidate_count = candidates.len()))]
    pub async fn decode_with_candidates(
        &self,
        data: &[u8],
        filename: &str,
        candidates: &[String],
    ) -> Result<(DecoderOutput, Option<usize>)> {
        let tmpfile = stage_temp_file(data, filename)?;
        let path = tmpfile.path();

        let mut best: Option<(DecoderOutput, Option<usize>)> = None;
        let mut last_err: Option<Error> = None;

        // Attempt index None = no password.
        let attempts = std::iter::once(None).chain(
            candidates
                .iter()
                .take(MAX_PASSWORD_ATTEMPTS)
                .enumerate()
                .map(|(i, pw)| Some((i, pw.as_str()))),
        );

        for attempt in attempts {
            let (index, password) = match attempt {
                None => (None, None),
                Some((i, pw)) => (Some(i), Some(pw)),
            };
            match self.decode_file(path, password).await {
                Ok(out) => {
                    if out.success && out.text.trim().len() >= MIN_USABLE_TEXT_LEN {
                        debug!(filename, attempt = ?index, "decoder attempt accepted");
                        return Ok((out, index));
                    }
                    debug!(filename, attempt = ?index, chars = out.text.len(), "decoder output below usable floor");
                    if best.is_none() {
                        best = Some((out, index));
                    }
                }
                Err(e) => {
                    warn!(filename, attempt = ?index, error = %e, "decoder attempt failed");
                    last_err = Some(e);
                }
            }
        }

        if let Some(best) = best {
            return Ok(best);
        }
        Err(last_err
            .unwrap_or_else(|| Error::Extraction("decoder produced no output".to_string())))
    }

    /// Check that the decoder binary exists and responds.
    pub async fn health_check(&self) -> Result<bool> {
        match Command::new(&self.command).arg("--check").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }
}

impl Default for SubprocessDecoder {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Write attachment bytes to a temp file, preserving the extension.
fn stage_temp_file(data: &[u8], filename: &str) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    let suffix = filename
        .rsplit('.')
        .next()
        .filter(|ext| *ext != filename && !ext.is_empty())
        .map(|ext| format!(".{}", ext));
    if let Some(ref suffix) = suffix {
        builder.suffix(suffix);
    }
    let mut tmpfile = builder
        .tempfile()
        .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Parse decoder stdout: a JSON object when present, raw text otherwise.
fn parse_decoder_stdout(stdout: &str) -> DecoderOutput {
    // The decoder may print progress noise before the payload; scan for
    // the outermost JSON object.
    if let (Some(start), Some(end)) = (stdout.find('{'), stdout.rfind('}')) {
        if start < end {
            if let Ok(payload) = serde_json::from_str::<DecoderPayload>(&stdout[start..=end]) {
                return DecoderOutput {
                    success: payload.success,
                    text: payload.text,
                    method: payload.method,
                    char_count: payload.char_count,
                    raw: false,
                };
            }
        }
    }

    let text = stdout.trim().to_string();
    DecoderOutput {
        success: !text.is_empty(),
        char_count: Some(text.chars().count() as u64),
        text,
        method: None,
        raw: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_stdout() {
        let stdout = r#"Processing: statement.pdf
{"success": true, "text": "Account Statement", "method": "PyMuPDF", "char_count": 17}"#;
        let out = parse_decoder_stdout(stdout);
        assert!(out.success);
        assert!(!out.raw);
        assert_eq!(out.text, "Account Statement");
        assert_eq!(out.method.as_deref(), Some("PyMuPDF"));
        assert_eq!(out.char_count, Some(17));
    }

    #[test]
    fn test_parse_failed_json_stdout() {
        let stdout = r#"{"success": false, "text": "Incorrect password provided", "method": "Error"}"#;
        let out = parse_decoder_stdout(stdout);
        assert!(!out.success);
        assert_eq!(out.method.as_deref(), Some("Error"));
    }

    #[test]
    fn test_parse_raw_stdout() {
        let out = parse_decoder_stdout("Plain extracted text without JSON\nsecond line\n");
        assert!(out.success);
        assert!(out.raw);
        assert!(out.text.starts_with("Plain extracted text"));
    }

    #[test]
    fn test_parse_empty_stdout() {
        let out = parse_decoder_stdout("");
        assert!(!out.success);
        assert!(out.raw);
        assert!(out.text.is_empty());
    }

    #[test]
    fn test_parse_malformed_json_degrades_to_raw() {
        let stdout = "{not json at all}";
        let out = parse_decoder_stdout(stdout);
        assert!(out.raw);
        assert_eq!(out.text, "{not json at all}");
    }

    #[test]
    fn test_stage_temp_file_preserves_extension() {
        let tmp = stage_temp_file(b"data", "statement.pdf").unwrap();
        assert!(tmp.path().to_string_lossy().ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_decode_missing_binary_errors() {
        let decoder = SubprocessDecoder::new("finbox-decoder-does-not-exist");
        let result = decoder
            .decode_bytes(b"%PDF-1.4", "x.pdf", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_health_check_missing_binary() {
        let decoder = SubprocessDecoder::new("finbox-decoder-does-not-exist");
        assert!(!decoder.health_check().await.unwrap());
    }
}
