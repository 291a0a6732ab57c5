pub mod analysis_service;
pub mod normalizer;
