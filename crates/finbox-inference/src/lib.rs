//! # finbox-inference
//!
//! Reasoning-service access for the finbox pipeline.
//!
//! This crate provides:
//! - The Ollama generation backend (default reasoning service)
//! - The shared call gate that bounds concurrency and call rate for every
//!   reasoning-service invocation
//! - A deterministic mock backend for tests (feature `mock`)

pub mod gate;
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use finbox_core::*;

pub use gate::CallGate;
pub use ollama::OllamaBackend;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockReasoningBackend;
