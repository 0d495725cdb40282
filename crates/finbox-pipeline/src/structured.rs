//! Structured extraction: message + attachment text → financial record.
//!
//! Primary path is one reasoning-service call per message requesting a
//! JSON object against a fixed schema; the first balanced JSON object in
//! the response is parsed. When the call fails, times out, or returns
//! nothing parseable, a deterministic keyword/regex classifier produces
//! the record instead, with a confidence that never exceeds the fallback
//! cap. Each attachment additionally gets a document-analysis call with
//! its own keyword fallback.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, instrument, warn};

use finbox_core::defaults::{
    FALLBACK_CONFIDENCE_CAP, FALLBACK_CONFIDENCE_FLOOR, PROMPT_ATTACHMENT_DIGEST_LEN,
    PROMPT_BODY_LEN,
};
use finbox_core::{
    FinancialRecord, GenerationBackend, InboundMessage, RecordCategory, RecordStatus,
};
use finbox_inference::CallGate;

/// Currency marker + amount, e.g. `₹1,23,456.78`, `Rs. 5000`, `INR 2,000`.
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:₹|\$|£|€|rs\.?\s*|inr\s*|usd\s*)([\d,]+(?:\.\d+)?)").expect("valid regex")
});

/// Numeric date forms: dd/mm/yyyy, dd-mm-yyyy, yyyy-mm-dd.
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{4})\b").expect("valid regex")
});

/// Sender display name, e.g. `HDFC Bank <alerts@hdfcbank.net>`.
static SENDER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^<@]+?)\s*<").expect("valid regex"));

/// Keyword buckets for the deterministic category fallback, checked in
/// order: insurance before liability before asset, so "premium due"
/// resolves to insurance rather than a generic due amount.
const INSURANCE_KEYWORDS: &[&str] = &[
    "insurance",
    "policy",
    "premium",
    "sum assured",
    "coverage",
    "lic of india",
    "mediclaim",
];
const LIABILITY_KEYWORDS: &[&str] = &[
    "loan",
    "emi",
    "credit card",
    "outstanding",
    "total due",
    "minimum due",
    "repayment",
    "overdraft",
    "borrowed",
];
const ASSET_KEYWORDS: &[&str] = &[
    "mutual fund",
    "folio",
    "nav",
    "sip",
    "fixed deposit",
    "deposit",
    "portfolio",
    "dividend",
    "interest credited",
    "savings account",
    "balance",
    "demat",
    "statement",
];

/// (keyword, record_type, sub_type) table for the type fallback.
const TYPE_TABLE: &[(&str, &str, &str)] = &[
    ("mutual fund", "investment", "mutual_fund"),
    ("sip", "investment", "mutual_fund"),
    ("fixed deposit", "deposit", "fixed_deposit"),
    ("recurring deposit", "deposit", "recurring_deposit"),
    ("savings account", "bank_account", "savings"),
    ("credit card", "credit_card", "statement"),
    ("home loan", "loan", "home_loan"),
    ("personal loan", "loan", "personal_loan"),
    ("car loan", "loan", "vehicle_loan"),
    ("loan", "loan", "general"),
    ("emi", "loan", "emi"),
    ("health insurance", "insurance_policy", "health"),
    ("term insurance", "insurance_policy", "term_life"),
    ("life insurance", "insurance_policy", "life"),
    ("motor insurance", "insurance_policy", "motor"),
    ("premium", "insurance_policy", "premium_notice"),
    ("demat", "investment", "securities"),
    ("dividend", "investment", "dividend"),
];

/// Document-level analysis of one attachment's extracted text.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis {
    pub document_type: String,
    pub key_figures: Vec<String>,
    pub confidence: u8,
    /// True when the keyword fallback produced this analysis.
    pub degraded: bool,
}

/// Lenient shape of the reasoning service's JSON answer.
#[derive(Debug, Deserialize)]
struct ParsedRecord {
    category: Option<String>,
    #[serde(alias = "type")]
    record_type: Option<String>,
    sub_type: Option<String>,
    status: Option<String>,
    amount: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "merchant")]
    counterparty: Option<String>,
    transaction_date: Option<String>,
    confidence: Option<f64>,
    summary: Option<String>,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    metadata: JsonValue,
}

#[derive(Debug, Deserialize)]
struct ParsedAnalysis {
    document_type: Option<String>,
    #[serde(default)]
    key_figures: Vec<String>,
    confidence: Option<f64>,
}

/// Scan a response for the first balanced JSON object.
fn find_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in response[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    None
}

fn truncated(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Deterministic fallback
// ---------------------------------------------------------------------------

/// Keyword-bucket category detection. Returns None when nothing matches;
/// the caller leaves the record uncreated in that case rather than
/// inventing a category.
pub(crate) fn detect_category(text: &str) -> Option<RecordCategory> {
    let lower = text.to_lowercase();
    if INSURANCE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(RecordCategory::Insurance);
    }
    if LIABILITY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(RecordCategory::Liability);
    }
    if ASSET_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(RecordCategory::Asset);
    }
    None
}

fn detect_type(text: &str) -> (String, Option<String>) {
    let lower = text.to_lowercase();
    for (keyword, record_type, sub_type) in TYPE_TABLE {
        if lower.contains(keyword) {
            return (record_type.to_string(), Some(sub_type.to_string()));
        }
    }
    ("document".to_string(), None)
}

fn detect_amount(text: &str) -> Option<f64> {
    let captures = AMOUNT_RE.captures(text)?;
    captures[1].replace(',', "").parse::<f64>().ok()
}

fn detect_date(text: &str) -> Option<NaiveDate> {
    DATE_RE
        .captures(text)
        .and_then(|c| parse_date(&c[1]))
}

fn detect_counterparty(sender: &str) -> Option<String> {
    if let Some(captures) = SENDER_NAME_RE.captures(sender) {
        return Some(captures[1].trim().to_string());
    }
    // Bare address: take the domain's first label.
    sender
        .split('@')
        .nth(1)
        .and_then(|domain| domain.split('.').next())
        .filter(|label| !label.is_empty())
        .map(|label| label.to_string())
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// AI-assisted structured extractor with a deterministic degraded path.
pub struct StructuredExtractor {
    backend: Arc<dyn GenerationBackend>,
    gate: Arc<CallGate>,
}

impl StructuredExtractor {
    pub fn new(backend: Arc<dyn GenerationBackend>, gate: Arc<CallGate>) -> Self {
        Self { backend, gate }
    }

    fn message_prompt(message: &InboundMessage, attachment_texts: &[String]) -> String {
        let mut prompt = format!(
            "Extract one structured financial fact from this email.\n\
             Subject: {}\nFrom: {}\nBody:\n{}\n",
            message.subject,
            message.sender,
            truncated(&message.body, PROMPT_BODY_LEN),
        );
        for (index, text) in attachment_texts.iter().enumerate() {
            prompt.push_str(&format!(
                "\nAttachment {} extracted text:\n{}\n",
                index + 1,
                truncated(text, PROMPT_ATTACHMENT_DIGEST_LEN)
            ));
        }
        prompt.push_str(
            "\nReply with exactly one JSON object:\n\
             {\"category\": \"asset|liability|insurance\", \"type\": \"...\", \
             \"sub_type\": \"...\", \"status\": \"active|inactive|pending|complete|missing\", \
             \"amount\": 0, \"currency\": \"INR\", \"counterparty\": \"...\", \
             \"transaction_date\": \"YYYY-MM-DD\", \"confidence\": 0-100, \
             \"summary\": \"...\", \"key_points\": [], \
             \"metadata\": {\"bank_name\": \"...\", \"policy_number\": \"...\"}}",
        );
        prompt
    }

    fn record_from_parsed(parsed: ParsedRecord) -> Option<FinancialRecord> {
        // Category outside the enum means the answer is unusable.
        let category = RecordCategory::from_str(parsed.category.as_deref()?).ok()?;
        let status = parsed
            .status
            .as_deref()
            .and_then(|s| RecordStatus::from_str(s).ok())
            .unwrap_or_default();
        let confidence = parsed.confidence.unwrap_or(80.0).clamp(0.0, 100.0) as u8;

        Some(FinancialRecord {
            category,
            record_type: parsed.record_type.unwrap_or_else(|| "document".to_string()),
            sub_type: parsed.sub_type,
            status,
            amount: parsed.amount,
            currency: parsed.currency,
            counterparty: parsed.counterparty,
            transaction_date: parsed.transaction_date.as_deref().and_then(parse_date),
            confidence,
            summary: parsed.summary.unwrap_or_default(),
            key_points: parsed.key_points,
            metadata: parsed.metadata,
        })
    }

    /// Deterministic record built from keywords and regexes alone.
    /// Always succeeds; confidence reflects the degraded path.
    pub fn fallback_record(
        message: &InboundMessage,
        attachment_texts: &[String],
    ) -> FinancialRecord {
        let combined = format!(
            "{} {} {}",
            message.subject,
            message.body,
            attachment_texts.join(" ")
        );

        let category = detect_category(&combined).unwrap_or(RecordCategory::Asset);
        let (record_type, sub_type) = detect_type(&combined);
        let amount = detect_amount(&combined);
        let transaction_date = detect_date(&combined);
        let counterparty = detect_counterparty(&message.sender);

        let mut confidence = FALLBACK_CONFIDENCE_FLOOR;
        if detect_category(&combined).is_some() {
            confidence += 15;
        }
        if amount.is_some() {
            confidence += 20;
        }
        if transaction_date.is_some() {
            confidence += 10;
        }
        let confidence = confidence.min(FALLBACK_CONFIDENCE_CAP);

        let mut key_points = Vec::new();
        if let Some(amount) = amount {
            key_points.push(format!("amount: {:.2}", amount));
        }
        if let Some(date) = transaction_date {
            key_points.push(format!("date: {}", date));
        }

        FinancialRecord {
            category,
            record_type: record_type.clone(),
            sub_type,
            status: RecordStatus::Active,
            amount,
            currency: amount.map(|_| "INR".to_string()),
            counterparty,
            transaction_date,
            confidence,
            summary: format!("{}: {}", record_type, message.subject),
            key_points,
            metadata: json!({"degraded": true}),
        }
    }

    /// Extract the message-level financial record. One reasoning call per
    /// message; any failure degrades to [`Self::fallback_record`].
    #[instrument(skip(self, message, attachment_texts), fields(subsystem = "pipeline", component = "structured", op = "extract_message", message_id = %message.id))]
    pub async fn extract_message(
        &self,
        message: &InboundMessage,
        attachment_texts: &[String],
    ) -> FinancialRecord {
        let prompt = Self::message_prompt(message, attachment_texts);
        let backend = self.backend.clone();
        let response = self
            .gate
            .run(async move { backend.generate(&prompt).await })
            .await;

        match response {
            Ok(text) => match find_json_object(&text)
                .and_then(|obj| serde_json::from_str::<ParsedRecord>(obj).ok())
                .and_then(Self::record_from_parsed)
            {
                Some(record) => record,
                None => {
                    warn!(message_id = %message.id, "unparseable reasoning output, using fallback");
                    Self::fallback_record(message, attachment_texts)
                }
            },
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "reasoning call failed, using fallback");
                Self::fallback_record(message, attachment_texts)
            }
        }
    }

    /// Keyword fallback for document analysis.
    fn fallback_analysis(text: &str) -> DocumentAnalysis {
        let lower = text.to_lowercase();
        let document_type = if lower.contains("statement") {
            "statement"
        } else if lower.contains("invoice") || lower.contains("bill") {
            "invoice"
        } else if lower.contains("receipt") {
            "receipt"
        } else if lower.contains("policy") || lower.contains("premium") {
            "policy"
        } else {
            "unknown"
        };

        let mut key_figures: Vec<String> = AMOUNT_RE
            .find_iter(text)
            .take(3)
            .map(|m| m.as_str().trim().to_string())
            .collect();
        key_figures.extend(
            DATE_RE
                .find_iter(text)
                .take(2)
                .map(|m| m.as_str().to_string()),
        );

        DocumentAnalysis {
            document_type: document_type.to_string(),
            key_figures,
            confidence: 40,
            degraded: true,
        }
    }

    /// Analyze one attachment's extracted text for a document-level type
    /// and key figures. Never fails.
    #[instrument(skip(self, text), fields(subsystem = "pipeline", component = "structured", op = "analyze_document"))]
    pub async fn analyze_document(&self, filename: &str, text: &str) -> DocumentAnalysis {
        let prompt = format!(
            "Classify this financial document and list its key figures.\n\
             Filename: {}\nContent:\n{}\n\n\
             Reply with exactly one JSON object:\n\
             {{\"document_type\": \"statement|invoice|receipt|policy|other\", \
             \"key_figures\": [\"...\"], \"confidence\": 0-100}}",
            filename,
            truncated(text, PROMPT_ATTACHMENT_DIGEST_LEN),
        );
        let backend = self.backend.clone();
        let response = self
            .gate
            .run(async move { backend.generate(&prompt).await })
            .await;

        match response {
            Ok(answer) => match find_json_object(&answer)
                .and_then(|obj| serde_json::from_str::<ParsedAnalysis>(obj).ok())
            {
                Some(parsed) => DocumentAnalysis {
                    document_type: parsed
                        .document_type
                        .unwrap_or_else(|| "other".to_string()),
                    key_figures: parsed.key_figures,
                    confidence: parsed.confidence.unwrap_or(70.0).clamp(0.0, 100.0) as u8,
                    degraded: false,
                },
                None => {
                    debug!(filename, "unparseable document analysis, using fallback");
                    Self::fallback_analysis(text)
                }
            },
            Err(e) => {
                debug!(filename, error = %e, "document analysis failed, using fallback");
                Self::fallback_analysis(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use finbox_inference::MockReasoningBackend;
    use std::time::Duration;

    fn message(subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".to_string(),
            subject: subject.to_string(),
            sender: "HDFC Bank <alerts@hdfcbank.net>".to_string(),
            recipient: "user@example.com".to_string(),
            snippet: String::new(),
            body: body.to_string(),
            received_at: Utc::now(),
            attachments: Vec::new(),
        }
    }

    fn extractor(backend: MockReasoningBackend) -> StructuredExtractor {
        StructuredExtractor::new(
            Arc::new(backend),
            finbox_inference::CallGate::new(2, Duration::from_millis(1), 100),
        )
    }

    #[test]
    fn test_find_json_object() {
        assert_eq!(
            find_json_object("noise {\"a\": 1} trailing"),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            find_json_object("{\"nested\": {\"b\": 2}}"),
            Some("{\"nested\": {\"b\": 2}}")
        );
        assert_eq!(find_json_object("a brace } in a string"), None);
        // Braces inside string values do not unbalance the scan.
        assert_eq!(
            find_json_object(r#"{"s": "val}ue"}"#),
            Some(r#"{"s": "val}ue"}"#)
        );
    }

    #[test]
    fn test_detect_category_buckets() {
        assert_eq!(
            detect_category("your policy premium is due"),
            Some(RecordCategory::Insurance)
        );
        assert_eq!(
            detect_category("loan emi overdue"),
            Some(RecordCategory::Liability)
        );
        assert_eq!(
            detect_category("mutual fund folio statement"),
            Some(RecordCategory::Asset)
        );
        assert_eq!(detect_category("lunch tomorrow"), None);
    }

    #[test]
    fn test_detect_amount_formats() {
        assert_eq!(detect_amount("total ₹1,23,456.78 payable"), Some(123456.78));
        assert_eq!(detect_amount("Rs. 5000 credited"), Some(5000.0));
        assert_eq!(detect_amount("INR 2,000"), Some(2000.0));
        assert_eq!(detect_amount("no money here"), None);
    }

    #[test]
    fn test_detect_counterparty() {
        assert_eq!(
            detect_counterparty("HDFC Bank <alerts@hdfcbank.net>"),
            Some("HDFC Bank".to_string())
        );
        assert_eq!(
            detect_counterparty("alerts@icicibank.com"),
            Some("icicibank".to_string())
        );
    }

    #[test]
    fn test_fallback_confidence_capped() {
        let msg = message(
            "Loan EMI due",
            "Your EMI of Rs. 12,500 is due on 14/05/2024",
        );
        let record = StructuredExtractor::fallback_record(&msg, &[]);
        assert_eq!(record.category, RecordCategory::Liability);
        assert!(record.confidence <= FALLBACK_CONFIDENCE_CAP);
        assert_eq!(record.amount, Some(12500.0));
        assert_eq!(
            record.transaction_date,
            NaiveDate::from_ymd_opt(2024, 5, 14)
        );
        assert_eq!(record.metadata["degraded"], true);
    }

    #[tokio::test]
    async fn test_service_json_parsed() {
        let backend = MockReasoningBackend::new().with_fixed_response(
            r#"Here you go: {"category": "insurance", "type": "insurance_policy",
                "sub_type": "term_life", "status": "active", "amount": 25000,
                "currency": "INR", "confidence": 92, "summary": "Term policy premium",
                "metadata": {"policy_number": "TL-001"}}"#,
        );
        let ext = extractor(backend);
        let record = ext
            .extract_message(&message("Premium receipt", "policy TL-001"), &[])
            .await;
        assert_eq!(record.category, RecordCategory::Insurance);
        assert_eq!(record.confidence, 92);
        assert_eq!(record.metadata["policy_number"], "TL-001");
    }

    #[tokio::test]
    async fn test_service_failure_uses_fallback() {
        let backend = MockReasoningBackend::new().with_failures();
        let ext = extractor(backend);
        let record = ext
            .extract_message(
                &message("Credit card statement", "Total due Rs. 8,400"),
                &[],
            )
            .await;
        assert!(record.confidence <= FALLBACK_CONFIDENCE_CAP);
        assert_eq!(record.category, RecordCategory::Liability);
    }

    #[tokio::test]
    async fn test_bad_category_treated_as_unparseable() {
        let backend = MockReasoningBackend::new()
            .with_fixed_response(r#"{"category": "expense", "confidence": 99}"#);
        let ext = extractor(backend);
        let record = ext
            .extract_message(&message("FD maturity", "deposit matured"), &[])
            .await;
        // Out-of-enum category forces the deterministic path.
        assert!(record.confidence <= FALLBACK_CONFIDENCE_CAP);
        assert_eq!(record.category, RecordCategory::Asset);
    }

    #[tokio::test]
    async fn test_analyze_document_fallback() {
        let backend = MockReasoningBackend::new().with_failures();
        let ext = extractor(backend);
        let analysis = ext
            .analyze_document("stmt.pdf", "Account statement: Rs. 4,000 on 01/02/2024")
            .await;
        assert!(analysis.degraded);
        assert_eq!(analysis.document_type, "statement");
        assert!(!analysis.key_figures.is_empty());
        assert_eq!(analysis.confidence, 40);
    }

    #[tokio::test]
    async fn test_analyze_document_parsed() {
        let backend = MockReasoningBackend::new().with_fixed_response(
            r#"{"document_type": "invoice", "key_figures": ["Rs. 900"], "confidence": 88}"#,
        );
        let ext = extractor(backend);
        let analysis = ext.analyze_document("inv.pdf", "invoice text").await;
        assert!(!analysis.degraded);
        assert_eq!(analysis.document_type, "invoice");
        assert_eq!(analysis.confidence, 88);
    }
}
