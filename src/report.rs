//! Human-readable and JSON renderings of evaluation results.

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::evaluation::{FolderEvaluation, PairOutcome};
use crate::faces::{ScoreBasis, Verdict};

/// A folder that could not be evaluated, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFolder {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Local>,
    engine: &'a str,
    folders: &'a [FolderEvaluation],
    skipped: &'a [SkippedFolder],
}

pub fn render_json(engine: &str, folders: &[FolderEvaluation], skipped: &[SkippedFolder]) -> Result<String> {
    let report = JsonReport {
        generated_at: Local::now(),
        engine,
        folders,
        skipped,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn render_text(folders: &[FolderEvaluation], skipped: &[SkippedFolder]) -> String {
    let mut out = String::new();

    for skip in skipped {
        out.push_str(&format!("Skipped {}: {}\n", skip.name, skip.reason));
    }

    for folder in folders {
        render_folder(&mut out, folder);
    }

    out
}

fn render_folder(out: &mut String, folder: &FolderEvaluation) {
    let rule = "=".repeat(50);

    out.push_str(&format!("\n=== Testing {} folder ===\n", folder.name));
    for result in &folder.techniques {
        out.push_str(&format!("\n--- {} Protection Test ---\n", result.technique.display_name()));
        render_outcome(out, &result.outcome);
    }

    out.push_str(&format!("\n{rule}\n"));
    out.push_str(&format!("FINAL RESULT for {}:\n", folder.name.to_uppercase()));
    for result in &folder.techniques {
        out.push_str(&format!(
            "{}: {:.1}% protected\n",
            result.technique.display_name(),
            result.outcome.rate() * 100.0
        ));
    }
    out.push_str(&format!(
        "Overall: {:.1}% protected {} {}\n",
        folder.overall_rate * 100.0,
        folder.tier.symbol(),
        folder.tier.label().to_uppercase()
    ));
    out.push_str(&rule);
    out.push('\n');
}

fn render_outcome(out: &mut String, outcome: &PairOutcome) {
    let score = match outcome {
        PairOutcome::EngineFailed { error } => {
            out.push_str(&format!("Engine error ({error}) - counted as PROTECTED\n"));
            return;
        }
        PairOutcome::Scored(score) => score,
    };

    out.push_str(&format!("Original faces detected: {}\n", score.original_faces));
    out.push_str(&format!("Protected faces detected: {}\n", score.protected_faces));

    match score.basis {
        ScoreBasis::NoProtectedFaces => {
            out.push_str("No faces detected in protected image - FULLY PROTECTED\n");
            return;
        }
        ScoreBasis::NoOriginalFaces => {
            out.push_str("No faces detected in original image - cannot assess\n");
            return;
        }
        ScoreBasis::Compared => {}
    }

    for face in score.outcomes.iter().filter(|o| o.protected_index.is_some()) {
        let similarity = face.similarity.unwrap_or_default();
        let verdict = match face.verdict {
            Verdict::Recognized => "RECOGNIZED - NOT PROTECTED",
            Verdict::Protected => "NOT RECOGNIZED - PROTECTED",
        };
        out.push_str(&format!(
            "Face {} {} (similarity: {:.3})\n",
            face.original_index + 1,
            verdict,
            similarity
        ));
    }

    let vanished = score.vanished_count();
    if vanished > 0 {
        out.push_str(&format!("{vanished} face(s) missing in protected image - PROTECTED\n"));
    }

    out.push_str(&format!(
        "SUMMARY: {}/{} faces protected ({:.1}%)\n",
        score.protected_count(),
        score.original_faces,
        score.rate * 100.0
    ));
}
