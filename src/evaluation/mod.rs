//! Protection evaluation of anonymized variants against their original.
//!
//! Drives a [`DetectionEngine`] over each (original, variant) pair, scores the
//! detections and aggregates the technique scores of a folder into an overall
//! rate and a [`ProtectionTier`].

pub mod tier;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::faces::{
    match_faces_with, score, DetectionEngine, FaceDetection, MatchStrategy, ProtectionScore,
    DEFAULT_DISTANCE_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::scanner::VariantSet;

pub use tier::{aggregate, ProtectionTier};

/// Anonymization technique applied to produce a variant image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    Pixelation,
    /// Face blacked out
    Occlusion,
    Blur,
}

impl Technique {
    pub const ALL: [Technique; 3] = [Technique::Pixelation, Technique::Occlusion, Technique::Blur];

    pub fn name(&self) -> &'static str {
        match self {
            Technique::Pixelation => "pixelation",
            Technique::Occlusion => "occlusion",
            Technique::Blur => "blur",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Technique::Pixelation => "Pixelated",
            Technique::Occlusion => "Black",
            Technique::Blur => "Blur",
        }
    }
}

/// What to do when the detection engine fails on a pair of images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorPolicy {
    /// Count the pair as fully protected: a face the engine could not process
    /// is a face it could not recognize.
    #[default]
    FailOpen,
    /// Return the engine error to the caller
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSettings {
    pub distance_threshold: f32,
    pub similarity_threshold: f32,
    pub strategy: MatchStrategy,
    pub on_engine_error: EngineErrorPolicy,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            strategy: MatchStrategy::default(),
            on_engine_error: EngineErrorPolicy::default(),
        }
    }
}

/// Result of comparing one protected image against its original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Scored(ProtectionScore),
    /// The engine failed and the fail-open policy applied
    EngineFailed { error: String },
}

impl PairOutcome {
    pub fn rate(&self) -> f64 {
        match self {
            PairOutcome::Scored(score) => score.rate,
            PairOutcome::EngineFailed { .. } => 1.0,
        }
    }

    pub fn score(&self) -> Option<&ProtectionScore> {
        match self {
            PairOutcome::Scored(score) => Some(score),
            PairOutcome::EngineFailed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueResult {
    pub technique: Technique,
    pub image: PathBuf,
    pub outcome: PairOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderEvaluation {
    pub name: String,
    pub original: PathBuf,
    pub techniques: Vec<TechniqueResult>,
    pub overall_rate: f64,
    pub tier: ProtectionTier,
}

impl FolderEvaluation {
    pub fn technique(&self, technique: Technique) -> Option<&TechniqueResult> {
        self.techniques.iter().find(|t| t.technique == technique)
    }
}

/// Pair and score two detection lists
pub fn compare_detections(
    original: &[FaceDetection],
    protected: &[FaceDetection],
    settings: &EvaluationSettings,
) -> ProtectionScore {
    let matches = match_faces_with(settings.strategy, original, protected, settings.distance_threshold);
    score(original, protected, &matches, settings.similarity_threshold)
}

/// Run the engine on both images and score the protected one
pub fn evaluate_pair(
    engine: &dyn DetectionEngine,
    original: &Path,
    protected: &Path,
    settings: &EvaluationSettings,
) -> Result<PairOutcome, EngineError> {
    let detections = engine
        .detect(original)
        .and_then(|original_faces| Ok((original_faces, engine.detect(protected)?)));

    match detections {
        Ok((original_faces, protected_faces)) => {
            tracing::info!(
                original = original_faces.len(),
                protected = protected_faces.len(),
                "Faces detected"
            );
            Ok(PairOutcome::Scored(compare_detections(&original_faces, &protected_faces, settings)))
        }
        Err(e) => recover(e, settings),
    }
}

/// Evaluate every technique variant of a folder and aggregate the scores.
///
/// The original image is run through the engine once and shared by the
/// technique comparisons, which run in parallel.
pub fn evaluate_folder(
    engine: &dyn DetectionEngine,
    set: &VariantSet,
    settings: &EvaluationSettings,
) -> Result<FolderEvaluation, EngineError> {
    tracing::info!(folder = %set.name, "Testing folder");

    let original_faces = match engine.detect(&set.original) {
        Ok(faces) => {
            tracing::info!(folder = %set.name, faces = faces.len(), "Original faces detected");
            Ok(faces)
        }
        Err(e) if settings.on_engine_error == EngineErrorPolicy::Propagate => return Err(e),
        Err(e) => {
            tracing::warn!(folder = %set.name, error = %e, "Detection engine failed on original; counting all variants as protected");
            Err(e.to_string())
        }
    };

    let techniques = set
        .variants
        .par_iter()
        .map(|(&technique, image)| -> Result<TechniqueResult, EngineError> {
            let _span = tracing::info_span!("technique", name = technique.name()).entered();

            let outcome = match &original_faces {
                Ok(original) => match engine.detect(image) {
                    Ok(protected) => {
                        tracing::info!(faces = protected.len(), "Protected faces detected");
                        PairOutcome::Scored(compare_detections(original, &protected, settings))
                    }
                    Err(e) => recover(e, settings)?,
                },
                Err(error) => PairOutcome::EngineFailed { error: error.clone() },
            };

            Ok(TechniqueResult {
                technique,
                image: image.clone(),
                outcome,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    let rates: Vec<f64> = techniques.iter().map(|t| t.outcome.rate()).collect();
    let overall_rate = aggregate(&rates);
    let tier = ProtectionTier::from_rate(overall_rate);

    tracing::info!(
        folder = %set.name,
        percent = overall_rate * 100.0,
        tier = tier.label(),
        "Folder evaluated"
    );

    Ok(FolderEvaluation {
        name: set.name.clone(),
        original: set.original.clone(),
        techniques,
        overall_rate,
        tier,
    })
}

/// Evaluate folders in parallel; results keep the input order
pub fn evaluate_folders(
    engine: &dyn DetectionEngine,
    sets: &[VariantSet],
    settings: &EvaluationSettings,
) -> Result<Vec<FolderEvaluation>, EngineError> {
    sets.par_iter()
        .map(|set| evaluate_folder(engine, set, settings))
        .collect()
}

fn recover(error: EngineError, settings: &EvaluationSettings) -> Result<PairOutcome, EngineError> {
    match settings.on_engine_error {
        EngineErrorPolicy::FailOpen => {
            tracing::warn!(error = %error, "Detection engine failed; counting pair as protected");
            Ok(PairOutcome::EngineFailed {
                error: error.to_string(),
            })
        }
        EngineErrorPolicy::Propagate => Err(error),
    }
}
