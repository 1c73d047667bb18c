//! Measures how well face anonymization (pixelation, occlusion, blur) holds
//! up against automated face recognition.
//!
//! Faces found in an original image are paired by position with faces found
//! in an anonymized variant; a pair whose embeddings remain similar counts as
//! recognized, everything else as protected.

pub mod anonymize;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod faces;
pub mod logging;
pub mod pixels;
pub mod report;
pub mod scanner;
