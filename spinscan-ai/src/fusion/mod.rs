//! Evidence Fusion
//!
//! Combines per-photo extractions into one `FusedField` per logical field.
//!
//! - **evidence_fuser** - grouping, confidence aggregation, winner selection
//! - **precedence** - fixed photo-kind authority table for tie-breaking

pub mod evidence_fuser;
pub mod precedence;

pub use evidence_fuser::{EvidenceFuser, MAX_FUSED_CONFIDENCE};
pub use precedence::{authority_rank, precedence};
