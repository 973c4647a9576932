//! Outcome Validation
//!
//! - **outcome_classifier** - four-way outcome decision and missing fields
//! - **photo_guidance** - which photo to take for each missing field

pub mod outcome_classifier;
pub mod photo_guidance;

pub use outcome_classifier::{Classification, OutcomeClassifier};
pub use photo_guidance::{guidance_for, guidance_for_all};
