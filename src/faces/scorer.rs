//! Classification of original faces as protected or recognized.

use serde::{Deserialize, Serialize};

use super::detector::FaceDetection;
use super::matcher::MatchedPair;
use super::similarity::cosine_similarity;

/// Default cosine similarity above which a paired face counts as recognized.
///
/// Tuned for L2-normalized face embeddings (Facenet / ArcFace range). It does
/// not carry over to other embedding models without re-tuning.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// The anonymized face still matches its original identity
    Recognized,
    Protected,
}

/// Which scoring rule produced a [`ProtectionScore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    /// Nothing detected in the protected image; fully protected
    NoProtectedFaces,
    /// Nothing detected in the original image; scored as unprotected
    NoOriginalFaces,
    /// Faces were paired and compared
    Compared,
}

/// Outcome for one face of the original image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceOutcome {
    pub original_index: usize,
    /// Paired face in the protected image, `None` if the face vanished
    pub protected_index: Option<usize>,
    pub similarity: Option<f32>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionScore {
    /// Protected original faces / all original faces, in [0, 1]
    pub rate: f64,
    pub basis: ScoreBasis,
    pub original_faces: usize,
    pub protected_faces: usize,
    /// One entry per original face when `basis` is `Compared`, empty otherwise
    pub outcomes: Vec<FaceOutcome>,
}

impl ProtectionScore {
    pub fn protected_count(&self) -> usize {
        self.count(Verdict::Protected)
    }

    pub fn recognized_count(&self) -> usize {
        self.count(Verdict::Recognized)
    }

    /// Original faces with no counterpart in the protected image
    pub fn vanished_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.protected_index.is_none())
            .count()
    }

    pub fn is_fully_protected(&self) -> bool {
        self.rate >= 1.0
    }

    fn count(&self, verdict: Verdict) -> usize {
        self.outcomes.iter().filter(|o| o.verdict == verdict).count()
    }
}

/// Score how well the protected image hides the faces of the original.
///
/// Rules apply in order:
/// 1. no faces in `protected` gives 1.0
/// 2. no faces in `original` gives 0.0
/// 3. a paired face is recognized when its similarity exceeds
///    `similarity_threshold`, protected otherwise
/// 4. an unpaired original face is protected
///
/// The rate is protected faces over original faces.
pub fn score(
    original: &[FaceDetection],
    protected: &[FaceDetection],
    matches: &[MatchedPair],
    similarity_threshold: f32,
) -> ProtectionScore {
    if protected.is_empty() {
        tracing::info!("No faces detected in protected image - fully protected");
        return ProtectionScore {
            rate: 1.0,
            basis: ScoreBasis::NoProtectedFaces,
            original_faces: original.len(),
            protected_faces: 0,
            outcomes: Vec::new(),
        };
    }

    if original.is_empty() {
        tracing::info!("No faces detected in original image - cannot assess");
        return ProtectionScore {
            rate: 0.0,
            basis: ScoreBasis::NoOriginalFaces,
            original_faces: 0,
            protected_faces: protected.len(),
            outcomes: Vec::new(),
        };
    }

    let mut outcomes: Vec<FaceOutcome> = (0..original.len())
        .map(|i| FaceOutcome {
            original_index: i,
            protected_index: None,
            similarity: None,
            verdict: Verdict::Protected,
        })
        .collect();

    for pair in matches {
        let (Some(orig_face), Some(prot_face)) = (original.get(pair.original), protected.get(pair.protected)) else {
            tracing::warn!(?pair, "Ignoring pair outside the detection lists");
            continue;
        };

        let outcome = &mut outcomes[pair.original];
        if outcome.protected_index.is_some() {
            tracing::warn!(?pair, "Ignoring second pair for the same original face");
            continue;
        }

        let similarity = cosine_similarity(&orig_face.embedding, &prot_face.embedding);
        outcome.protected_index = Some(pair.protected);
        outcome.similarity = Some(similarity);

        if similarity > similarity_threshold {
            outcome.verdict = Verdict::Recognized;
            tracing::debug!(face = pair.original + 1, similarity, "Face recognized - not protected");
        } else {
            tracing::debug!(face = pair.original + 1, similarity, "Face not recognized - protected");
        }
    }

    let total = original.len();
    let protected_count = outcomes.iter().filter(|o| o.verdict == Verdict::Protected).count();
    let vanished = outcomes.iter().filter(|o| o.protected_index.is_none()).count();
    if vanished > 0 {
        tracing::debug!(vanished, "Face(s) missing in protected image - protected");
    }

    let rate = protected_count as f64 / total as f64;
    tracing::info!(
        protected = protected_count,
        total,
        percent = rate * 100.0,
        "Faces protected"
    );

    ProtectionScore {
        rate,
        basis: ScoreBasis::Compared,
        original_faces: total,
        protected_faces: protected.len(),
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::detector::BoundingBox;
    use crate::faces::matcher::{match_faces, DEFAULT_DISTANCE_THRESHOLD};

    fn face(cx: i32, cy: i32, embedding: Vec<f32>) -> FaceDetection {
        FaceDetection::new(BoundingBox::new(cx - 5, cy - 5, 10, 10), embedding)
    }

    #[test]
    fn test_empty_protected_is_fully_protected() {
        let original = vec![face(10, 10, vec![1.0, 0.0]), face(50, 50, vec![0.0, 1.0])];

        let result = score(&original, &[], &[], DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(result.rate, 1.0);
        assert_eq!(result.basis, ScoreBasis::NoProtectedFaces);

        // Both lists empty: the protected rule takes precedence
        let result = score(&[], &[], &[], DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(result.rate, 1.0);
        assert_eq!(result.basis, ScoreBasis::NoProtectedFaces);
    }

    #[test]
    fn test_empty_original_is_unprotected() {
        let protected = vec![face(10, 10, vec![1.0, 0.0])];

        let result = score(&[], &protected, &[], DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.rate, 0.0);
        assert_eq!(result.basis, ScoreBasis::NoOriginalFaces);
    }

    #[test]
    fn test_partial_protection_scenario() {
        // Similarity of [0.9, sqrt(0.19)] to [1, 0] is 0.9
        let original = vec![face(10, 10, vec![1.0, 0.0]), face(200, 200, vec![0.0, 1.0])];
        let protected = vec![face(12, 11, vec![0.9, 0.19f32.sqrt()])];

        let matches = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);
        assert_eq!(matches, vec![MatchedPair::new(0, 0)]);

        let result = score(&original, &protected, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.rate, 0.5);
        assert_eq!(result.outcomes[0].verdict, Verdict::Recognized);
        assert!((result.outcomes[0].similarity.unwrap() - 0.9).abs() < 1e-4);
        assert_eq!(result.outcomes[1].verdict, Verdict::Protected);
        assert_eq!(result.outcomes[1].protected_index, None);
        assert_eq!(result.recognized_count(), 1);
        assert_eq!(result.vanished_count(), 1);
    }

    #[test]
    fn test_identical_images_are_unprotected() {
        let faces = vec![
            face(10, 10, vec![1.0, 0.2, 0.3]),
            face(100, 10, vec![0.1, 1.0, 0.4]),
            face(200, 10, vec![0.5, 0.5, 1.0]),
        ];

        let matches = match_faces(&faces, &faces, DEFAULT_DISTANCE_THRESHOLD);
        let result = score(&faces, &faces, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.rate, 0.0);
        assert_eq!(result.recognized_count(), 3);
        for outcome in &result.outcomes {
            assert!((outcome.similarity.unwrap() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_all_vanished_is_fully_protected() {
        let original = vec![face(10, 10, vec![1.0, 0.0]), face(100, 100, vec![0.0, 1.0])];
        let protected = vec![face(500, 500, vec![1.0, 0.0])];

        let matches = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);
        assert!(matches.is_empty());

        let result = score(&original, &protected, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.rate, 1.0);
        assert!(result.is_fully_protected());
        assert_eq!(result.vanished_count(), 2);
    }

    #[test]
    fn test_similarity_at_threshold_is_protected() {
        let original = vec![face(10, 10, vec![1.0, 0.0])];
        let protected = vec![face(10, 10, vec![1.0, 0.0])];
        let matches = vec![MatchedPair::new(0, 0)];

        // Recognition requires strictly exceeding the threshold
        let result = score(&original, &protected, &matches, 1.0);
        assert_eq!(result.rate, 1.0);

        let result = score(&original, &protected, &matches, 0.99);
        assert_eq!(result.rate, 0.0);
    }

    #[test]
    fn test_degenerate_embedding_is_protected() {
        let original = vec![face(10, 10, vec![0.0, 0.0])];
        let protected = vec![face(10, 10, vec![0.0, 0.0])];
        let matches = vec![MatchedPair::new(0, 0)];

        let result = score(&original, &protected, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.outcomes[0].similarity, Some(0.0));
        assert_eq!(result.rate, 1.0);
    }

    #[test]
    fn test_shared_protected_face_counts_for_each_original() {
        let original = vec![face(100, 100, vec![1.0, 0.0]), face(120, 100, vec![1.0, 0.1])];
        let protected = vec![face(110, 100, vec![1.0, 0.05])];

        let matches = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);
        let result = score(&original, &protected, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.recognized_count(), 2);
        assert_eq!(result.rate, 0.0);
    }

    #[test]
    fn test_invalid_pairs_are_ignored() {
        let original = vec![face(10, 10, vec![1.0, 0.0])];
        let protected = vec![face(10, 10, vec![1.0, 0.0])];
        let matches = vec![MatchedPair::new(3, 0), MatchedPair::new(0, 7)];

        let result = score(&original, &protected, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.rate, 1.0);
        assert_eq!(result.outcomes[0].protected_index, None);
    }

    #[test]
    fn test_duplicate_original_pair_uses_first() {
        let original = vec![face(10, 10, vec![1.0, 0.0])];
        let protected = vec![face(10, 10, vec![1.0, 0.0]), face(12, 10, vec![0.0, 1.0])];
        let matches = vec![MatchedPair::new(0, 1), MatchedPair::new(0, 0)];

        let result = score(&original, &protected, &matches, DEFAULT_SIMILARITY_THRESHOLD);

        assert_eq!(result.outcomes[0].protected_index, Some(1));
        assert_eq!(result.rate, 1.0);
    }
}
