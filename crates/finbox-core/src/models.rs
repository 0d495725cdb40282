//! Domain model for the finbox document pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// INBOUND MAIL
// =============================================================================

/// A message fetched from the mail provider.
///
/// Read-only once fetched; the pipeline never writes back to the mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider-side message identifier.
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    /// Short preview of the body, used for classification.
    pub snippet: String,
    /// Full body text (plain-text part).
    pub body: String,
    pub received_at: DateTime<Utc>,
    /// Ordered attachment references; bytes are resolved lazily.
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// Reference to one attachment of an [`InboundMessage`].
///
/// Only resolved to bytes when the owning message survives classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    /// MIME type as declared by the provider (may be wrong).
    pub mime_type: String,
    /// Provider-side handle used to download the bytes.
    pub handle: String,
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// How an attachment's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    /// External decoding subprocess succeeded.
    #[default]
    Subprocess,
    /// In-process heuristic decode of the raw buffer.
    BufferFallback,
    /// OCR-pending placeholder for image content.
    OcrFallback,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subprocess => write!(f, "subprocess"),
            Self::BufferFallback => write!(f, "buffer-fallback"),
            Self::OcrFallback => write!(f, "ocr-fallback"),
        }
    }
}

impl std::str::FromStr for ExtractionMethod {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subprocess" => Ok(Self::Subprocess),
            "buffer-fallback" | "buffer_fallback" => Ok(Self::BufferFallback),
            "ocr-fallback" | "ocr_fallback" => Ok(Self::OcrFallback),
            _ => Err(format!("Invalid extraction method: {}", s)),
        }
    }
}

/// Result of extracting text from one attachment.
///
/// Produced fresh per attachment; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    /// Extracted text; possibly a descriptive placeholder, never panics
    /// downstream consumers with absence.
    pub text: String,
    pub method: ExtractionMethod,
    /// Heuristic completeness score, clamped to 0-100.
    pub quality_score: u8,
    pub char_count: usize,
    /// Format-specific extraction metadata.
    pub metadata: JsonValue,
}

impl ExtractionOutcome {
    /// Build an outcome from extracted text, clamping the score and
    /// deriving the character count.
    pub fn new(success: bool, text: String, method: ExtractionMethod, score: u8) -> Self {
        let char_count = text.chars().count();
        Self {
            success,
            text,
            method,
            quality_score: score.min(100),
            char_count,
            metadata: JsonValue::Object(Default::default()),
        }
    }

    /// Attach metadata, consuming self.
    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Extraction dispatch format for an attachment.
///
/// Maps the container format (how to extract content), not the semantic
/// document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    /// Raster image routed to OCR.
    Image,
    Csv,
    /// Excel-style workbook.
    Spreadsheet,
    /// Word-processor document (docx and friends).
    WordDocument,
    #[default]
    PlainText,
    /// Unrecognized container; extraction degrades to a placeholder.
    Unknown,
}

impl DocumentFormat {
    /// Determine the format from MIME type alone. Pure function.
    pub fn from_mime_type(mime: &str) -> Self {
        let mime_lower = mime.to_lowercase();

        if mime_lower == "application/pdf" {
            return Self::Pdf;
        }
        if mime_lower.starts_with("image/") {
            return Self::Image;
        }
        if mime_lower == "text/csv" || mime_lower == "application/csv" {
            return Self::Csv;
        }
        if mime_lower.contains("spreadsheetml") || mime_lower.contains("ms-excel") {
            return Self::Spreadsheet;
        }
        if mime_lower.contains("wordprocessingml") || mime_lower.contains("msword") {
            return Self::WordDocument;
        }
        if mime_lower.starts_with("text/") {
            return Self::PlainText;
        }
        Self::Unknown
    }

    /// Determine the format from MIME type with file-extension refinement.
    ///
    /// When the provider declares a generic type (`application/octet-stream`),
    /// the extension refines the dispatch. The extension is only trusted for
    /// cheap text-based strategies; it never promotes to nothing worse than
    /// a buffer scan, so a mislabelled file cannot trigger expensive work.
    pub fn from_mime_and_extension(mime: &str, extension: Option<&str>) -> Self {
        let base = Self::from_mime_type(mime);

        if base == Self::Unknown {
            if let Some(ext) = extension {
                return match ext.to_lowercase().as_str() {
                    "pdf" => Self::Pdf,
                    "jpg" | "jpeg" | "png" | "tiff" | "bmp" | "gif" => Self::Image,
                    "csv" | "tsv" => Self::Csv,
                    "xlsx" | "xls" => Self::Spreadsheet,
                    "docx" | "doc" => Self::WordDocument,
                    "txt" | "md" | "text" => Self::PlainText,
                    _ => Self::Unknown,
                };
            }
        }
        base
    }

    /// Determine the format for an attachment, refining the declared MIME
    /// type with magic-byte sniffing when the declaration is generic.
    pub fn detect(data: &[u8], mime: &str, filename: &str) -> Self {
        let extension = filename.rsplit('.').next().filter(|e| *e != filename);
        let declared = Self::from_mime_and_extension(mime, extension);
        if declared != Self::Unknown {
            return declared;
        }
        // Magic bytes as a last resort for generic declarations.
        if let Some(kind) = infer::get(data) {
            return Self::from_mime_and_extension(kind.mime_type(), extension);
        }
        Self::Unknown
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Image => write!(f, "image"),
            Self::Csv => write!(f, "csv"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
            Self::WordDocument => write!(f, "word_document"),
            Self::PlainText => write!(f, "plain_text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Identity attributes of the requesting user, read from the identity
/// store. All fields optional; password candidate generation degrades to
/// whatever is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Tax identifier (PAN).
    pub pan_number: Option<String>,
    pub account_number: Option<String>,
    pub customer_id: Option<String>,
}

// =============================================================================
// FINANCIAL RECORDS
// =============================================================================

/// Domain of an extracted financial fact. A record outside these three
/// values is never created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    Asset,
    Liability,
    Insurance,
}

impl std::fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asset => write!(f, "asset"),
            Self::Liability => write!(f, "liability"),
            Self::Insurance => write!(f, "insurance"),
        }
    }
}

impl std::str::FromStr for RecordCategory {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" | "assets" => Ok(Self::Asset),
            "liability" | "liabilities" => Ok(Self::Liability),
            "insurance" => Ok(Self::Insurance),
            _ => Err(format!("Invalid record category: {}", s)),
        }
    }
}

/// Lifecycle status of an extracted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Complete,
    Missing,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Pending => write!(f, "pending"),
            Self::Complete => write!(f, "complete"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "pending" => Ok(Self::Pending),
            "complete" | "completed" => Ok(Self::Complete),
            "missing" => Ok(Self::Missing),
            _ => Err(format!("Invalid record status: {}", s)),
        }
    }
}

/// A normalized asset/liability/insurance fact extracted from a message
/// or attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub category: RecordCategory,
    /// e.g. "mutual_fund", "home_loan", "term_insurance".
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Counterparty or merchant named in the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<NaiveDate>,
    /// Extraction confidence, 0-100. Fallback-path records stay ≤ 75.
    pub confidence: u8,
    /// Human-readable one-paragraph summary.
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Free-form bag: bank name, policy/folio numbers, coverage/EMI/
    /// interest-rate fields as applicable.
    #[serde(default)]
    pub metadata: JsonValue,
}

/// A persisted financial record as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub attachment_id: Uuid,
    #[serde(flatten)]
    pub record: FinancialRecord,
    pub created_at: DateTime<Utc>,
}

/// Filters for the record read pass-through.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub category: Option<RecordCategory>,
    pub record_type: Option<String>,
    pub min_confidence: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Per-category record counts for a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordStats {
    pub total: i64,
    pub assets: i64,
    pub liabilities: i64,
    pub insurance: i64,
}

// =============================================================================
// PERSISTED DOCUMENT SET
// =============================================================================

/// Raw-document half of a persisted set: what arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub filename: String,
    pub mime_type: String,
    pub byte_size: i64,
}

/// Processed-document half: what extraction produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub extraction_method: ExtractionMethod,
    pub quality_score: i16,
    pub char_count: i64,
    pub content: String,
    pub metadata: JsonValue,
}

/// The triple written for a single processed attachment. All three rows
/// carry `attachment_id` so they can be cross-referenced and jointly
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSet {
    pub user_id: Uuid,
    pub message_id: String,
    pub attachment_id: Uuid,
    pub raw: RawDocument,
    pub processed: ProcessedDocument,
    pub record: FinancialRecord,
}

/// Identifiers of the three rows written for a [`DocumentSet`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DocumentSetIds {
    pub raw_id: Uuid,
    pub processed_id: Uuid,
    pub record_id: Uuid,
}

// =============================================================================
// BATCH SUMMARY
// =============================================================================

/// Outcome of processing one message within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOutcome {
    pub message_id: String,
    pub subject: String,
    pub processed: bool,
    pub attachment_count: usize,
    #[serde(default)]
    pub record_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one batch run, returned to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub attachments: usize,
    pub records_created: usize,
    /// Set when the run was a throttled no-op; days until the window expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled_days: Option<i64>,
    #[serde(default)]
    pub messages: Vec<MessageOutcome>,
}

impl BatchSummary {
    /// A no-op summary for a throttled user.
    pub fn throttled(days_remaining: i64) -> Self {
        Self {
            throttled_days: Some(days_remaining),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_extraction_method_display_roundtrip() {
        for m in [
            ExtractionMethod::Subprocess,
            ExtractionMethod::BufferFallback,
            ExtractionMethod::OcrFallback,
        ] {
            assert_eq!(ExtractionMethod::from_str(&m.to_string()).unwrap(), m);
        }
    }

    #[test]
    fn test_extraction_method_serde_kebab() {
        let json = serde_json::to_string(&ExtractionMethod::BufferFallback).unwrap();
        assert_eq!(json, "\"buffer-fallback\"");
    }

    #[test]
    fn test_outcome_clamps_score() {
        let outcome = ExtractionOutcome::new(true, "x".into(), ExtractionMethod::Subprocess, 255);
        assert_eq!(outcome.quality_score, 100);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(
            DocumentFormat::from_mime_type("application/pdf"),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_mime_type("image/png"),
            DocumentFormat::Image
        );
        assert_eq!(
            DocumentFormat::from_mime_type("text/csv"),
            DocumentFormat::Csv
        );
        assert_eq!(
            DocumentFormat::from_mime_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            DocumentFormat::Spreadsheet
        );
        assert_eq!(
            DocumentFormat::from_mime_type(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            DocumentFormat::WordDocument
        );
        assert_eq!(
            DocumentFormat::from_mime_type("text/plain"),
            DocumentFormat::PlainText
        );
        assert_eq!(
            DocumentFormat::from_mime_type("application/zip"),
            DocumentFormat::Unknown
        );
    }

    #[test]
    fn test_format_extension_refinement() {
        assert_eq!(
            DocumentFormat::from_mime_and_extension("application/octet-stream", Some("pdf")),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_mime_and_extension("application/octet-stream", Some("xlsx")),
            DocumentFormat::Spreadsheet
        );
        // Declared MIME wins over extension.
        assert_eq!(
            DocumentFormat::from_mime_and_extension("application/pdf", Some("csv")),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn test_format_detect_magic_bytes() {
        let pdf = b"%PDF-1.4 rest of the file";
        assert_eq!(
            DocumentFormat::detect(pdf, "application/octet-stream", "statement.bin"),
            DocumentFormat::Pdf
        );
    }

    #[test]
    fn test_category_strict_parse() {
        assert_eq!(
            RecordCategory::from_str("asset").unwrap(),
            RecordCategory::Asset
        );
        assert!(RecordCategory::from_str("expense").is_err());
    }

    #[test]
    fn test_throttled_summary() {
        let summary = BatchSummary::throttled(42);
        assert_eq!(summary.throttled_days, Some(42));
        assert_eq!(summary.processed, 0);
        assert!(summary.messages.is_empty());
    }
}
