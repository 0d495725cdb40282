//! # finbox-core
//!
//! Core types, traits, and abstractions for the finbox document pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other finbox crates depend on: the domain model for inbound
//! messages and extracted financial records, the error type, shared default
//! constants, and the interfaces to external collaborators (mail provider,
//! identity store, reasoning backend, relational store).

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
