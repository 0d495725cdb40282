//! Structured logging schema and field name constants for finbox.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, batch completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (candidates, rows, attachments) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "extract", "inference", "pipeline", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "classifier", "gate", "decoder", "pdf", "throttle"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "process_user", "classify", "extract", "generate"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// User whose mailbox is being processed.
pub const USER_ID: &str = "user_id";

/// Mail-provider message identifier.
pub const MESSAGE_ID: &str = "message_id";

/// Attachment filename being extracted.
pub const FILENAME: &str = "filename";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";
pub const RESPONSE_LEN: &str = "response_len";

/// Password candidates generated or attempted.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Extraction quality score (0-100).
pub const QUALITY_SCORE: &str = "quality_score";

/// Queued calls waiting on the gate.
pub const QUEUE_DEPTH: &str = "queue_depth";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for a reasoning call.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Extraction method that produced the result.
pub const METHOD: &str = "method";
