//! Core traits for the finbox pipeline's external collaborators.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. The pipeline
//! consumes the mail provider and identity store as contracts only;
//! credential setup for them lives with the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// MAIL PROVIDER
// =============================================================================

/// Read-only access to a user's mailbox.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Fetch up to `max_results` most recent messages, newest first.
    async fn list_messages(&self, max_results: usize) -> Result<Vec<InboundMessage>>;

    /// Resolve one attachment reference to its bytes.
    async fn fetch_attachment(&self, message_id: &str, handle: &str) -> Result<Vec<u8>>;
}

// =============================================================================
// IDENTITY STORE
// =============================================================================

/// Read-only lookup of a user's identity attributes. Used only by the
/// password candidate generator and the structured extractor.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> Result<Option<IdentityProfile>>;
}

// =============================================================================
// REASONING SERVICE
// =============================================================================

/// Backend for text generation against the external reasoning service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// FORMAT EXTRACTION
// =============================================================================

/// Adapter for extracting text from one document format.
///
/// Adapters are registered in a `FormatRegistry` and dispatched on the
/// attachment's detected [`DocumentFormat`]. An adapter degrades to the
/// best available text for its format; it errors only when the byte
/// buffer itself cannot be processed at all.
#[async_trait]
pub trait FormatAdapter: Send + Sync {
    /// The document format this adapter handles.
    fn format(&self) -> DocumentFormat;

    /// Extract text from raw attachment bytes. Password candidates are
    /// tried in order by adapters that support protected content; others
    /// ignore them.
    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        passwords: &[String],
    ) -> Result<ExtractionOutcome>;

    /// Check if the adapter's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this adapter.
    fn name(&self) -> &str;
}

// =============================================================================
// RELATIONAL STORE
// =============================================================================

/// Write-side persistence for processed attachments plus the thin read
/// pass-through over stored records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist the raw/processed/record triple for one attachment in a
    /// single transaction.
    async fn insert_document_set(&self, set: &DocumentSet) -> Result<DocumentSetIds>;

    /// Delete all three rows sharing the given attachment identity.
    async fn delete_document_set(&self, user_id: Uuid, attachment_id: Uuid) -> Result<()>;

    /// List a user's financial records with filters.
    async fn list_records(&self, user_id: Uuid, query: &RecordQuery) -> Result<Vec<StoredRecord>>;

    /// Per-category record counts for a user.
    async fn record_stats(&self, user_id: Uuid) -> Result<RecordStats>;
}

/// Per-user processing cooldown state.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Current cooldown expiry for a user, if any.
    async fn expiry(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>>;

    /// Advance the cooldown by `window_days` from now. The stored expiry
    /// never moves backward.
    async fn advance(&self, user_id: Uuid, window_days: i64) -> Result<DateTime<Utc>>;
}
