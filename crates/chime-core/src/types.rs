use chrono::{DateTime, Utc};

/// Bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Fixed-length face embedding produced by the biometrics provider.
///
/// Values are L2-normalized at extraction time, so cosine distance is
/// the natural comparison metric.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding {
    pub values: Vec<f32>,
}

impl FaceEncoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Cosine distance to another encoding: `1 - cosine similarity`.
    ///
    /// Lower = more similar. Range [0, 2]. A zero-norm encoding is
    /// maximally distant (distance 1.0) rather than NaN.
    pub fn distance(&self, other: &FaceEncoding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            1.0 - dot / denom
        } else {
            1.0
        }
    }

    /// Serialize to little-endian f32 bytes (the BLOB layout the
    /// identity store uses).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * 4);
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Deserialize from little-endian f32 bytes. Returns `None` if the
    /// blob length is not a multiple of 4.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self { values })
    }
}

/// Distance from the probe to every known encoding, in snapshot order.
pub fn match_distances(known: &[FaceEncoding], probe: &FaceEncoding) -> Vec<f32> {
    known.iter().map(|k| k.distance(probe)).collect()
}

/// A registered person: name, reference encoding, and an optional
/// personal audio clip played on their first entrance of the day.
#[derive(Debug, Clone)]
pub struct KnownIdentity {
    pub name: String,
    pub encoding: FaceEncoding,
    pub audio_clip: Option<Vec<u8>>,
}

/// One notified entrance, as persisted in the entrance ledger.
#[derive(Debug, Clone)]
pub struct EntranceRecord {
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of classifying one captured frame. Produced fresh every poll
/// cycle; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionResult {
    /// No face region detected in the frame.
    NoOne,
    /// A face was present but could not be matched to a known identity.
    Unknown,
    /// The best-matching known identity, within tolerance.
    Identified(String),
}
