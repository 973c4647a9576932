//! Identification Workflow
//!
//! - **audit** - append-only audit trail
//! - **session** - per-run working state
//! - **pipeline** - stage sequencing and result assembly

pub mod audit;
pub mod pipeline;
pub mod session;

pub use audit::{AuditEntry, AuditLog, AuditStep};
pub use pipeline::IdentificationPipeline;
pub use session::{Session, SessionState};
