//! Service layer

pub mod identification_service;

pub use identification_service::IdentificationService;
