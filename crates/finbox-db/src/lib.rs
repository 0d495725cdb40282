//! # finbox-db
//!
//! PostgreSQL persistence layer for the finbox pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - The document-set store (raw document + processed document +
//!   financial record written transactionally per attachment)
//! - The per-user analysis throttle store
//!
//! Schema migrations are managed externally; the tables this crate writes
//! are documented in the repository's DESIGN.md.
//!
//! ## Example
//!
//! ```rust,ignore
//! use finbox_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/finbox").await?;
//!     let expiry = db.throttle.expiry(user_id).await?;
//!     println!("throttled until: {:?}", expiry);
//!     Ok(())
//! }
//! ```

pub mod documents;
pub mod pool;
pub mod throttle;

pub use documents::PgDocumentStore;
pub use pool::{Database, PoolConfig};
pub use throttle::PgThrottleStore;
