//! Spatial pairing of face detections between two images of the same scene.
//!
//! A pair is only a hypothesis that two detections show the same physical
//! face; the scorer confirms or refutes it with embedding similarity.

use serde::{Deserialize, Serialize};

use super::detector::{BoundingBox, FaceDetection};

/// Default maximum center-to-center distance, in pixels
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 50.0;

/// Index of a face in the original list paired with one in the protected list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchedPair {
    pub original: usize,
    pub protected: usize,
}

impl MatchedPair {
    pub fn new(original: usize, protected: usize) -> Self {
        Self { original, protected }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Every original face independently takes its nearest protected face.
    /// Two original faces may end up paired with the same protected face.
    #[default]
    Greedy,
    /// Strict 1:1 assignment maximizing the number of pairs, then minimizing
    /// the total center distance.
    Optimal,
}

impl MatchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            MatchStrategy::Greedy => "greedy",
            MatchStrategy::Optimal => "optimal",
        }
    }
}

impl std::str::FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "greedy" => Ok(MatchStrategy::Greedy),
            "optimal" => Ok(MatchStrategy::Optimal),
            other => Err(format!("unknown match strategy: {}", other)),
        }
    }
}

/// Euclidean distance between bounding-box centers
pub fn center_distance(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

pub fn match_faces_with(
    strategy: MatchStrategy,
    original: &[FaceDetection],
    protected: &[FaceDetection],
    distance_threshold: f32,
) -> Vec<MatchedPair> {
    match strategy {
        MatchStrategy::Greedy => match_faces(original, protected, distance_threshold),
        MatchStrategy::Optimal => match_faces_optimal(original, protected, distance_threshold),
    }
}

/// Pair each original face with the nearest protected face whose center lies
/// strictly closer than `distance_threshold`.
///
/// Ties go to the lower protected index. The result is ordered by original
/// index and is not deduplicated on the protected side.
pub fn match_faces(
    original: &[FaceDetection],
    protected: &[FaceDetection],
    distance_threshold: f32,
) -> Vec<MatchedPair> {
    let mut matched_pairs = Vec::new();

    for (i, face) in original.iter().enumerate() {
        let mut best_match = None;
        let mut min_distance = f32::INFINITY;

        for (j, candidate) in protected.iter().enumerate() {
            let distance = center_distance(&face.bbox, &candidate.bbox);
            if distance < min_distance && distance < distance_threshold {
                min_distance = distance;
                best_match = Some(j);
            }
        }

        if let Some(j) = best_match {
            matched_pairs.push(MatchedPair::new(i, j));
        }
    }

    matched_pairs
}

/// Strict 1:1 pairing under the same distance threshold.
pub fn match_faces_optimal(
    original: &[FaceDetection],
    protected: &[FaceDetection],
    distance_threshold: f32,
) -> Vec<MatchedPair> {
    if original.is_empty() || protected.is_empty() || !(distance_threshold > 0.0) {
        return Vec::new();
    }

    let n = original.len().max(protected.len());
    let threshold = distance_threshold as f64;

    // Anything costlier than n qualifying pairs combined, so the assignment
    // maximizes the number of qualifying pairs before minimizing distance.
    let unmatched_cost = threshold * (n as f64 + 1.0);

    let mut distances = vec![vec![None; protected.len()]; original.len()];
    let mut cost = vec![vec![unmatched_cost; n]; n];
    for (i, face) in original.iter().enumerate() {
        for (j, candidate) in protected.iter().enumerate() {
            let distance = center_distance(&face.bbox, &candidate.bbox);
            if distance < distance_threshold {
                distances[i][j] = Some(distance);
                cost[i][j] = distance as f64;
            }
        }
    }

    hungarian(&cost)
        .into_iter()
        .enumerate()
        .filter(|&(i, j)| i < original.len() && j < protected.len() && distances[i][j].is_some())
        .map(|(i, j)| MatchedPair::new(i, j))
        .collect()
}

/// Minimum-cost assignment on a square cost matrix (Kuhn-Munkres with
/// potentials). Returns the column assigned to each row.
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    // 1-based internally; column 0 is a sentinel
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut row_of = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        row_of[0] = i;
        let mut j0 = 0;
        let mut min_v = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = row_of[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if reduced < min_v[j] {
                    min_v[j] = reduced;
                    way[j] = j0;
                }
                if min_v[j] < delta {
                    delta = min_v[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[row_of[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }

            j0 = j1;
            if row_of[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            row_of[j0] = row_of[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; n];
    for j in 1..=n {
        if row_of[j] != 0 {
            assignment[row_of[j] - 1] = j - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Face whose 10x10 box is centered on `(cx, cy)`
    fn face_at(cx: i32, cy: i32) -> FaceDetection {
        FaceDetection::new(BoundingBox::new(cx - 5, cy - 5, 10, 10), vec![1.0, 0.0])
    }

    #[test]
    fn test_empty_inputs() {
        let faces = vec![face_at(10, 10), face_at(100, 100)];

        assert!(match_faces(&faces, &[], DEFAULT_DISTANCE_THRESHOLD).is_empty());
        assert!(match_faces(&[], &faces, DEFAULT_DISTANCE_THRESHOLD).is_empty());
        assert!(match_faces(&[], &[], DEFAULT_DISTANCE_THRESHOLD).is_empty());
        assert!(match_faces_optimal(&faces, &[], DEFAULT_DISTANCE_THRESHOLD).is_empty());
        assert!(match_faces_optimal(&[], &faces, DEFAULT_DISTANCE_THRESHOLD).is_empty());
    }

    #[test]
    fn test_nearest_within_threshold() {
        let original = vec![face_at(10, 10), face_at(200, 200)];
        let protected = vec![face_at(12, 11)];

        let pairs = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);

        assert_eq!(pairs, vec![MatchedPair::new(0, 0)]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let original = vec![face_at(0, 0)];
        let protected = vec![face_at(50, 0)];

        assert!(match_faces(&original, &protected, 50.0).is_empty());
        assert_eq!(match_faces(&original, &protected, 50.5), vec![MatchedPair::new(0, 0)]);
    }

    #[test]
    fn test_picks_closest_candidate() {
        let original = vec![face_at(100, 100)];
        let protected = vec![face_at(130, 100), face_at(105, 100), face_at(90, 100)];

        let pairs = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);

        assert_eq!(pairs, vec![MatchedPair::new(0, 1)]);
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let original = vec![face_at(100, 100)];
        let protected = vec![face_at(110, 100), face_at(90, 100)];

        let pairs = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);

        assert_eq!(pairs, vec![MatchedPair::new(0, 0)]);
    }

    #[test]
    fn test_greedy_can_reuse_protected_face() {
        let original = vec![face_at(100, 100), face_at(120, 100)];
        let protected = vec![face_at(110, 100)];

        let pairs = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);

        assert_eq!(pairs, vec![MatchedPair::new(0, 0), MatchedPair::new(1, 0)]);
    }

    #[test]
    fn test_optimal_is_one_to_one() {
        let original = vec![face_at(100, 100), face_at(120, 100)];
        let protected = vec![face_at(110, 100)];

        let pairs = match_faces_optimal(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].protected, 0);
    }

    #[test]
    fn test_optimal_prefers_more_pairs() {
        // Greedy pairs both originals with protected 0; optimal routes the
        // second original to protected 1 so both faces stay paired.
        let original = vec![face_at(100, 100), face_at(130, 100)];
        let protected = vec![face_at(120, 100), face_at(160, 100)];

        let greedy = match_faces(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);
        assert_eq!(greedy, vec![MatchedPair::new(0, 0), MatchedPair::new(1, 0)]);

        let optimal = match_faces_optimal(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);
        assert_eq!(optimal, vec![MatchedPair::new(0, 0), MatchedPair::new(1, 1)]);
    }

    #[test]
    fn test_optimal_minimizes_total_distance() {
        let original = vec![face_at(0, 0), face_at(20, 0)];
        let protected = vec![face_at(21, 0), face_at(1, 0)];

        let pairs = match_faces_optimal(&original, &protected, DEFAULT_DISTANCE_THRESHOLD);

        assert_eq!(pairs, vec![MatchedPair::new(0, 1), MatchedPair::new(1, 0)]);
    }

    #[test]
    fn test_raising_threshold_only_adds_pairs() {
        let original = vec![face_at(0, 0), face_at(100, 0), face_at(300, 300)];
        let protected = vec![face_at(30, 0), face_at(170, 0), face_at(305, 290)];

        let mut previous = Vec::new();
        for threshold in [5.0, 12.0, 31.0, 50.0, 71.0, 200.0, 1000.0] {
            let pairs = match_faces(&original, &protected, threshold);
            for pair in &previous {
                assert!(pairs.contains(pair), "pair {:?} lost at threshold {}", pair, threshold);
            }
            previous = pairs;
        }
    }

    #[test]
    fn test_pairs_respect_threshold() {
        let original = vec![face_at(0, 0), face_at(60, 60)];
        let protected = vec![face_at(40, 0), face_at(100, 100)];

        for pair in match_faces(&original, &protected, 45.0) {
            let d = center_distance(&original[pair.original].bbox, &protected[pair.protected].bbox);
            assert!(d < 45.0);
        }
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("Greedy".parse::<MatchStrategy>(), Ok(MatchStrategy::Greedy));
        assert_eq!("optimal".parse::<MatchStrategy>(), Ok(MatchStrategy::Optimal));
        assert!("hungarian".parse::<MatchStrategy>().is_err());
    }
}
