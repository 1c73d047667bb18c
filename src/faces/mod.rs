pub mod detector;
pub mod matcher;
pub mod scorer;
pub mod similarity;

pub use detector::{BoundingBox, DetectionEngine, FaceDetection, OnnxEngine};
pub use matcher::{match_faces, match_faces_optimal, match_faces_with, MatchStrategy, MatchedPair, DEFAULT_DISTANCE_THRESHOLD};
pub use scorer::{score, FaceOutcome, ProtectionScore, ScoreBasis, Verdict, DEFAULT_SIMILARITY_THRESHOLD};
pub use similarity::cosine_similarity;
