//! Per-user batch orchestration.
//!
//! State machine per run: throttle check → fetch → classify → sequential
//! per-message loop (password guess → attachment extraction → structured
//! extraction → validation → persistence) → throttle advance → summary.
//! One message's failure is recorded in its summary entry and never
//! aborts siblings.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use finbox_core::defaults::{INTER_MESSAGE_DELAY_MS, MESSAGE_FETCH_LIMIT, THROTTLE_WINDOW_DAYS};
use finbox_core::{
    AttachmentRef, BatchSummary, DocumentSet, DocumentStore, Error, ExtractionMethod,
    ExtractionOutcome, FinancialRecord, GenerationBackend, IdentityProfile, IdentityStore,
    InboundMessage, MailProvider, MessageOutcome, ProcessedDocument, RawDocument, RecordQuery,
    RecordStats, Result, StoredRecord, ThrottleStore,
};
use finbox_db::Database;
use finbox_extract::{generate_candidates, score_quality, FormatRegistry, QualityBand};
use finbox_inference::CallGate;

use crate::classifier::MessageClassifier;
use crate::structured::StructuredExtractor;
use crate::validation::validate_record;

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Messages fetched from the mail provider per run.
    pub fetch_limit: usize,
    /// Fixed pause between messages within a batch.
    pub inter_message_delay: Duration,
    /// Cooldown window advanced after every completed run.
    pub throttle_window_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_limit: MESSAGE_FETCH_LIMIT,
            inter_message_delay: Duration::from_millis(INTER_MESSAGE_DELAY_MS),
            throttle_window_days: THROTTLE_WINDOW_DAYS,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FINBOX_FETCH_LIMIT` | `25` | Messages fetched per run |
    /// | `FINBOX_INTER_MESSAGE_DELAY_MS` | `2000` | Pause between messages |
    /// | `FINBOX_THROTTLE_WINDOW_DAYS` | `90` | Cooldown window |
    pub fn from_env() -> Self {
        let fetch_limit = std::env::var("FINBOX_FETCH_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(MESSAGE_FETCH_LIMIT)
            .max(1);
        let inter_message_delay = std::env::var("FINBOX_INTER_MESSAGE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(INTER_MESSAGE_DELAY_MS));
        let throttle_window_days = std::env::var("FINBOX_THROTTLE_WINDOW_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(THROTTLE_WINDOW_DAYS);
        Self {
            fetch_limit,
            inter_message_delay,
            throttle_window_days,
        }
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    pub fn with_inter_message_delay(mut self, delay: Duration) -> Self {
        self.inter_message_delay = delay;
        self
    }

    pub fn with_throttle_window_days(mut self, days: i64) -> Self {
        self.throttle_window_days = days;
        self
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    mail: Option<Arc<dyn MailProvider>>,
    identity: Option<Arc<dyn IdentityStore>>,
    backend: Option<Arc<dyn GenerationBackend>>,
    registry: Option<Arc<FormatRegistry>>,
    store: Option<Arc<dyn DocumentStore>>,
    throttle: Option<Arc<dyn ThrottleStore>>,
    gate: Option<Arc<CallGate>>,
    config: Option<PipelineConfig>,
}

impl PipelineBuilder {
    pub fn mail(mut self, mail: Arc<dyn MailProvider>) -> Self {
        self.mail = Some(mail);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityStore>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn registry(mut self, registry: Arc<FormatRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn throttle(mut self, throttle: Arc<dyn ThrottleStore>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Wire the document and throttle stores from a connected [`Database`].
    pub fn database(mut self, db: &Database) -> Self {
        self.store = Some(Arc::new(db.documents.clone()));
        self.throttle = Some(Arc::new(db.throttle.clone()));
        self
    }

    /// Share an existing call gate (e.g. across pipelines for different
    /// users). Defaults to a gate with the system limits.
    pub fn gate(mut self, gate: Arc<CallGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let mail = self
            .mail
            .ok_or_else(|| Error::Config("pipeline requires a mail provider".to_string()))?;
        let identity = self
            .identity
            .ok_or_else(|| Error::Config("pipeline requires an identity store".to_string()))?;
        let backend = self
            .backend
            .ok_or_else(|| Error::Config("pipeline requires a reasoning backend".to_string()))?;
        let registry = self
            .registry
            .ok_or_else(|| Error::Config("pipeline requires a format registry".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| Error::Config("pipeline requires a document store".to_string()))?;
        let throttle = self
            .throttle
            .ok_or_else(|| Error::Config("pipeline requires a throttle store".to_string()))?;
        let gate = self.gate.unwrap_or_else(CallGate::with_defaults);
        let config = self.config.unwrap_or_default();

        Ok(Pipeline {
            classifier: MessageClassifier::new(backend.clone(), gate.clone()),
            extractor: StructuredExtractor::new(backend, gate.clone()),
            mail,
            identity,
            registry,
            store,
            throttle,
            gate,
            config,
        })
    }
}

/// The batch orchestrator: one exposed operation, "process a user's
/// recent messages", plus the thin record read pass-through.
pub struct Pipeline {
    mail: Arc<dyn MailProvider>,
    identity: Arc<dyn IdentityStore>,
    registry: Arc<FormatRegistry>,
    store: Arc<dyn DocumentStore>,
    throttle: Arc<dyn ThrottleStore>,
    gate: Arc<CallGate>,
    classifier: MessageClassifier,
    extractor: StructuredExtractor,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

/// Force a record's metadata to an object and merge `extra` into it.
fn merge_metadata(record: &mut FinancialRecord, extra: JsonValue) {
    if !record.metadata.is_object() {
        record.metadata = json!({});
    }
    if let (Some(map), Some(extra)) = (record.metadata.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Current depth of the shared reasoning-call gate.
    pub fn gate_depth(&self) -> usize {
        self.gate.depth()
    }

    /// Process a user's recent messages into persisted financial records.
    ///
    /// Returns early with a throttled summary while the user's cooldown
    /// window is open. Otherwise fetches, classifies, processes each
    /// selected message sequentially, advances the throttle, and returns
    /// the aggregate summary.
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "orchestrator", op = "process_user", user_id = %user_id))]
    pub async fn process_user(&self, user_id: Uuid) -> Result<BatchSummary> {
        if user_id.is_nil() {
            return Err(Error::InvalidInput("missing user identifier".to_string()));
        }

        let now = Utc::now();
        if let Some(expiry) = self.throttle.expiry(user_id).await? {
            if expiry > now {
                // Partial days count as a full remaining day.
                let days_remaining = ((expiry - now).num_seconds() + 86_399) / 86_400;
                info!(days_remaining, "user throttled, skipping batch");
                return Ok(BatchSummary::throttled(days_remaining));
            }
        }

        let messages = self.mail.list_messages(self.config.fetch_limit).await?;
        info!(fetched = messages.len(), "fetched inbound messages");

        let selected = self.classifier.classify(&messages).await;
        info!(selected = selected.len(), "messages classified as financial");

        let profile = self.identity.profile(user_id).await?.unwrap_or_default();

        let mut summary = BatchSummary::default();
        let mut first = true;
        for message in messages.iter().filter(|m| selected.contains(&m.id)) {
            if !first {
                tokio::time::sleep(self.config.inter_message_delay).await;
            }
            first = false;

            match self.process_message(user_id, &profile, message).await {
                Ok(outcome) => {
                    summary.processed += 1;
                    summary.attachments += outcome.attachment_count;
                    summary.records_created += outcome.record_ids.len();
                    summary.messages.push(outcome);
                }
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "message processing failed");
                    summary.failed += 1;
                    summary.messages.push(MessageOutcome {
                        message_id: message.id.clone(),
                        subject: message.subject.clone(),
                        processed: false,
                        attachment_count: message.attachments.len(),
                        record_ids: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        // The window advances even when individual messages failed; only
        // the throttle store itself failing is logged and tolerated.
        match self
            .throttle
            .advance(user_id, self.config.throttle_window_days)
            .await
        {
            Ok(expiry) => info!(%expiry, "throttle advanced"),
            Err(e) => error!(error = %e, "failed to advance throttle"),
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            records = summary.records_created,
            "batch complete"
        );
        Ok(summary)
    }

    async fn process_message(
        &self,
        user_id: Uuid,
        profile: &IdentityProfile,
        message: &InboundMessage,
    ) -> Result<MessageOutcome> {
        let mut extracted: Vec<(&AttachmentRef, usize, ExtractionOutcome)> = Vec::new();
        for attachment in &message.attachments {
            let candidates = generate_candidates(&attachment.filename, profile);
            if !candidates.success {
                debug!(
                    filename = %attachment.filename,
                    missing = ?candidates.missing_fields,
                    "password generation incomplete, trying common candidates"
                );
            }

            let bytes = self
                .mail
                .fetch_attachment(&message.id, &attachment.handle)
                .await?;
            let outcome = self
                .registry
                .extract_content(
                    &bytes,
                    &attachment.filename,
                    &attachment.mime_type,
                    &candidates.passwords,
                )
                .await;
            debug!(
                filename = %attachment.filename,
                method = %outcome.method,
                quality_score = outcome.quality_score,
                "attachment extracted"
            );
            extracted.push((attachment, bytes.len(), outcome));
        }

        let texts: Vec<String> = extracted
            .iter()
            .map(|(_, _, outcome)| outcome.text.clone())
            .collect();
        let base_record = self.extractor.extract_message(message, &texts).await;

        let mut record_ids = Vec::new();
        for (attachment, byte_size, outcome) in &extracted {
            let analysis = self
                .extractor
                .analyze_document(&attachment.filename, &outcome.text)
                .await;

            let mut record = base_record.clone();
            merge_metadata(
                &mut record,
                json!({
                    "document_type": analysis.document_type,
                    "key_figures": analysis.key_figures,
                    "document_confidence": analysis.confidence,
                    "document_analysis_degraded": analysis.degraded,
                    "quality_band": QualityBand::from_score(outcome.quality_score).to_string(),
                }),
            );
            let report = validate_record(&record);
            merge_metadata(
                &mut record,
                json!({
                    "validation_issues": report.issues,
                    "data_quality": report.data_quality,
                }),
            );

            let set = DocumentSet {
                user_id,
                message_id: message.id.clone(),
                attachment_id: Uuid::new_v4(),
                raw: RawDocument {
                    filename: attachment.filename.clone(),
                    mime_type: attachment.mime_type.clone(),
                    byte_size: *byte_size as i64,
                },
                processed: ProcessedDocument {
                    extraction_method: outcome.method,
                    quality_score: outcome.quality_score as i16,
                    char_count: outcome.char_count as i64,
                    content: outcome.text.clone(),
                    metadata: outcome.metadata.clone(),
                },
                record,
            };
            let ids = self.store.insert_document_set(&set).await?;
            record_ids.push(ids.record_id);
        }

        // A financial message with no attachments still yields one record
        // for the body itself.
        if extracted.is_empty() {
            let mut record = base_record;
            let report = validate_record(&record);
            merge_metadata(
                &mut record,
                json!({
                    "source": "message_body",
                    "validation_issues": report.issues,
                    "data_quality": report.data_quality,
                }),
            );
            let set = DocumentSet {
                user_id,
                message_id: message.id.clone(),
                attachment_id: Uuid::new_v4(),
                raw: RawDocument {
                    filename: "message-body.txt".to_string(),
                    mime_type: "text/plain".to_string(),
                    byte_size: message.body.len() as i64,
                },
                processed: ProcessedDocument {
                    extraction_method: ExtractionMethod::BufferFallback,
                    quality_score: score_quality(&message.body, message.body.len()) as i16,
                    char_count: message.body.chars().count() as i64,
                    content: message.body.clone(),
                    metadata: json!({"source": "message_body"}),
                },
                record,
            };
            let ids = self.store.insert_document_set(&set).await?;
            record_ids.push(ids.record_id);
        }

        Ok(MessageOutcome {
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            processed: true,
            attachment_count: message.attachments.len(),
            record_ids,
            error: None,
        })
    }

    /// Thin pass-through: a user's persisted records with filters.
    pub async fn records(&self, user_id: Uuid, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        self.store.list_records(user_id, query).await
    }

    /// Thin pass-through: per-category record counts.
    pub async fn record_stats(&self, user_id: Uuid) -> Result<RecordStats> {
        self.store.record_stats(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.fetch_limit, MESSAGE_FETCH_LIMIT);
        assert_eq!(config.throttle_window_days, THROTTLE_WINDOW_DAYS);
    }

    #[test]
    fn test_config_builders() {
        let config = PipelineConfig::default()
            .with_fetch_limit(0)
            .with_inter_message_delay(Duration::from_millis(5))
            .with_throttle_window_days(30);
        // Fetch limit floors at one.
        assert_eq!(config.fetch_limit, 1);
        assert_eq!(config.inter_message_delay, Duration::from_millis(5));
        assert_eq!(config.throttle_window_days, 30);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = Pipeline::builder().build().unwrap_err();
        assert!(err.to_string().contains("mail provider"));
    }

    #[test]
    fn test_merge_metadata_replaces_non_object() {
        let mut record = FinancialRecord {
            category: finbox_core::RecordCategory::Asset,
            record_type: "x".to_string(),
            sub_type: None,
            status: finbox_core::RecordStatus::Active,
            amount: None,
            currency: None,
            counterparty: None,
            transaction_date: None,
            confidence: 50,
            summary: String::new(),
            key_points: Vec::new(),
            metadata: JsonValue::Null,
        };
        merge_metadata(&mut record, json!({"k": "v"}));
        assert_eq!(record.metadata["k"], "v");
    }
}
