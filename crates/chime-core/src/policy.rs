//! Per-frame classification: one captured frame against the current
//! known-identity snapshot.

use crate::biometrics::Biometrics;
use crate::types::{match_distances, FaceEncoding, KnownIdentity, RecognitionResult};

/// Default cosine-distance cutoff for a positive match.
pub const DEFAULT_MATCH_TOLERANCE: f32 = 0.6;

/// Turns raw detection + encoding output into a single
/// [`RecognitionResult`].
///
/// Single-subject by design: when several faces are in frame, only the
/// first produced encoding is considered and at most one name is ever
/// returned per cycle.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    /// Cosine distance at or below which a known encoding counts as a
    /// match.
    pub tolerance: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_MATCH_TOLERANCE,
        }
    }
}

impl MatchPolicy {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    /// Classify one frame against the snapshot.
    ///
    /// - zero detected regions → `NoOne`
    /// - detection/encoding failure, or no encoding produced → `Unknown`
    /// - empty snapshot → `Unknown` (argmin over nothing is undefined)
    /// - otherwise: minimum-distance known encoding, accepted only if
    ///   within tolerance → `Identified(name)`, else `Unknown`
    pub fn classify<B: Biometrics>(
        &self,
        engine: &mut B,
        frame: &[u8],
        width: u32,
        height: u32,
        snapshot: &[KnownIdentity],
    ) -> RecognitionResult {
        let regions = match engine.locate(frame, width, height) {
            Ok(regions) => regions,
            Err(err) => {
                tracing::warn!(error = %err, "face detection failed; treating as unknown");
                return RecognitionResult::Unknown;
            }
        };

        if regions.is_empty() {
            return RecognitionResult::NoOne;
        }

        let encodings = match engine.encode(frame, width, height, &regions) {
            Ok(encodings) => encodings,
            Err(err) => {
                tracing::warn!(error = %err, "face encoding failed; treating as unknown");
                return RecognitionResult::Unknown;
            }
        };

        // Single-subject limitation: first encoding only.
        let Some(probe) = encodings.first() else {
            return RecognitionResult::Unknown;
        };

        if snapshot.is_empty() {
            return RecognitionResult::Unknown;
        }

        self.match_probe(probe, snapshot)
    }

    /// Minimum-distance selection with a per-entry tolerance test.
    fn match_probe(&self, probe: &FaceEncoding, snapshot: &[KnownIdentity]) -> RecognitionResult {
        let known: Vec<FaceEncoding> =
            snapshot.iter().map(|id| id.encoding.clone()).collect();
        let distances = match_distances(&known, probe);
        let matches: Vec<bool> = distances.iter().map(|&d| d <= self.tolerance).collect();

        let mut best_idx = 0usize;
        for (i, d) in distances.iter().enumerate() {
            if *d < distances[best_idx] {
                best_idx = i;
            }
        }

        tracing::debug!(
            best = %snapshot[best_idx].name,
            distance = distances[best_idx],
            tolerance = self.tolerance,
            "best match candidate"
        );

        if matches[best_idx] {
            RecognitionResult::Identified(snapshot[best_idx].name.clone())
        } else {
            RecognitionResult::Unknown
        }
    }
}
