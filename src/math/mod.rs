//! Mathematical utilities and physical constants for the espfit library.

/// Unit conversion factors and numerical thresholds.
pub mod constants;

/// The smooth switching profile shared by all weighting criteria.
pub mod switching;
