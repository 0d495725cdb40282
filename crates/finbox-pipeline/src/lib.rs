//! # finbox-pipeline
//!
//! The intake-and-extraction pipeline: message classification, structured
//! financial-record extraction with deterministic fallbacks, record
//! validation, and the per-user batch orchestrator.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use finbox_db::Database;
//! use finbox_extract::{FormatRegistry, SubprocessDecoder};
//! use finbox_inference::{CallGate, OllamaBackend};
//! use finbox_pipeline::{Pipeline, PipelineConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let pipeline = Pipeline::builder()
//!     .mail(mail_provider)
//!     .identity(identity_store)
//!     .backend(Arc::new(OllamaBackend::from_env()))
//!     .registry(Arc::new(FormatRegistry::with_decoder(SubprocessDecoder::from_env())))
//!     .database(&db)
//!     .build()?;
//!
//! let summary = pipeline.process_user(user_id).await?;
//! println!("{} records from {} messages", summary.records_created, summary.processed);
//! ```

pub mod classifier;
pub mod orchestrator;
pub mod structured;
pub mod validation;

// Re-export core types
pub use finbox_core::*;

pub use classifier::MessageClassifier;
pub use orchestrator::{Pipeline, PipelineBuilder, PipelineConfig};
pub use structured::{DocumentAnalysis, StructuredExtractor};
pub use validation::{validate_record, ValidationReport};
