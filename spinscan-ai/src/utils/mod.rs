//! Utility modules for spinscan-ai

pub mod text;
