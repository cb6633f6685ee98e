//! Collaborator boundaries for external signal models
//!
//! Each external model is consumed through a trait with an explicit
//! `Option` contract: `None` always means "signal absent", never "signal is
//! zero". The built-in implementations are deterministic stand-ins; a real
//! MIR backend or hosted classifier plugs in at the same seams.

pub mod bias;
pub mod fingerprint;
pub mod transcribe;

pub use bias::{BiasClassifier, KeywordBiasClassifier};
pub use fingerprint::{FingerprintExtractor, SpectralFingerprinter, FINGERPRINT_DIM};
pub use transcribe::{Transcriber, UnavailableTranscriber};
