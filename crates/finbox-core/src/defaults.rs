//! Centralized default constants for the finbox pipeline.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// EXTRACTION
// =============================================================================

/// Minimum usable extracted-text length in characters. Subprocess output
/// shorter than this is treated as a failed attempt (likely a wrong
/// password or a scanned page) and the next candidate or fallback runs.
pub const MIN_USABLE_TEXT_LEN: usize = 50;

/// Hard cap on a single decoder subprocess invocation. On expiry the child
/// is killed and extraction falls back to the in-process path.
pub const DECODER_TIMEOUT_SECS: u64 = 30;

/// Maximum password candidates tried against one attachment. Bank-specific
/// candidates sort first, so the cap keeps the highest-probability guesses
/// while bounding worst-case latency to cap × timeout.
pub const MAX_PASSWORD_ATTEMPTS: usize = 12;

/// Data rows rendered when previewing CSV content as a table.
pub const CSV_PREVIEW_ROWS: usize = 20;

/// Characters per page used to estimate page count from extracted text.
pub const CHARS_PER_PAGE: usize = 3000;

// =============================================================================
// QUALITY SCORING
// =============================================================================

/// Base score assigned to any non-empty extraction.
pub const QUALITY_BASE: u8 = 50;

/// Bonus when extracted text exceeds [`QUALITY_LEN_THRESHOLD`].
pub const QUALITY_LEN_BONUS: u8 = 20;
pub const QUALITY_LEN_THRESHOLD: usize = 100;

/// Additional bonus when extracted text exceeds [`QUALITY_LONG_THRESHOLD`].
pub const QUALITY_LONG_BONUS: u8 = 15;
pub const QUALITY_LONG_THRESHOLD: usize = 500;

/// Bonus when text length / source byte length exceeds [`QUALITY_DENSITY_RATIO`].
pub const QUALITY_DENSITY_BONUS: u8 = 15;
pub const QUALITY_DENSITY_RATIO: f64 = 0.5;

/// Bonus for a currency/amount marker and for a date-like marker.
pub const QUALITY_MARKER_BONUS: u8 = 10;

/// Band thresholds: high > 80, medium > 60, low otherwise.
pub const QUALITY_HIGH: u8 = 80;
pub const QUALITY_MEDIUM: u8 = 60;

// =============================================================================
// REASONING SERVICE
// =============================================================================

/// Per-call deadline for the reasoning service. The caller falls back to
/// the deterministic path when this expires.
pub const REASONING_TIMEOUT_SECS: u64 = 60;

/// Maximum characters of one attachment's extracted text included in a
/// structured-extraction prompt.
pub const PROMPT_ATTACHMENT_DIGEST_LEN: usize = 1500;

/// Maximum characters of the message body included in a prompt.
pub const PROMPT_BODY_LEN: usize = 2000;

// =============================================================================
// CALL GATE
// =============================================================================

/// Maximum simultaneous in-flight reasoning calls.
pub const GATE_CONCURRENCY: usize = 2;

/// Sliding window length for the call-rate cap, in milliseconds.
pub const GATE_INTERVAL_MS: u64 = 1000;

/// Maximum calls started per window.
pub const GATE_INTERVAL_CAP: usize = 3;

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Messages fetched from the mail provider per batch run.
pub const MESSAGE_FETCH_LIMIT: usize = 25;

/// Fixed pause between messages within a batch, smoothing load on the
/// decoder subprocess and the reasoning service.
pub const INTER_MESSAGE_DELAY_MS: u64 = 2000;

/// Cooldown window advanced on every completed batch run. A new run for
/// the same user is a no-op until the window expires.
pub const THROTTLE_WINDOW_DAYS: i64 = 90;

// =============================================================================
// STRUCTURED EXTRACTION
// =============================================================================

/// Confidence ceiling for records produced by the deterministic fallback
/// path. Records above this value always came from the reasoning service.
pub const FALLBACK_CONFIDENCE_CAP: u8 = 75;

/// Confidence assigned when the fallback could not even find an amount.
pub const FALLBACK_CONFIDENCE_FLOOR: u8 = 30;
