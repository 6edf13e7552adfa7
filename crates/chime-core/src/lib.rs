//! chime-core — Recognition policy for the doorbell pipeline.
//!
//! Defines the biometric adapter contract, the encoding distance math,
//! and the per-frame classification policy. Detection and embedding
//! inference live behind the [`Biometrics`] trait; this crate never
//! touches a camera or a model file.

pub mod biometrics;
pub mod policy;
pub mod types;

pub use biometrics::{Biometrics, BiometricsError};
pub use policy::{MatchPolicy, DEFAULT_MATCH_TOLERANCE};
pub use types::{EntranceRecord, FaceEncoding, FaceRegion, KnownIdentity, RecognitionResult};
