use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Face rectangle in image pixel coordinates, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Center point `(x + w/2, y + h/2)`
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }
}

/// A detected face with bounding box and embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
    pub confidence: f32,
}

impl FaceDetection {
    pub fn new(bbox: BoundingBox, embedding: Vec<f32>) -> Self {
        Self {
            bbox,
            embedding,
            confidence: 1.0,
        }
    }
}

/// Source of face detections for an image.
///
/// Implementations must return an empty list, not an error, when the image
/// simply contains no faces. Errors are reserved for failures of the engine
/// itself (unreadable image, missing model, inference failure).
pub trait DetectionEngine: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    fn detect(&self, image_path: &Path) -> Result<Vec<FaceDetection>, EngineError>;
}

const DETECTION_MODEL_FILE: &str = "ultraface-320.onnx";
const DETECTION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";
const EMBEDDING_MODEL_FILE: &str = "arcface-resnet100.onnx";
const EMBEDDING_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/arcface/model/arcfaceresnet100-11-int8.onnx";

/// UltraFace detector followed by ArcFace embeddings (512-dim, L2 normalized)
pub struct OnnxEngine {
    detection: Mutex<Session>,
    embedding: Mutex<Session>,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl OnnxEngine {
    /// Load both models, downloading them into the models directory if needed
    pub fn load(config: &EngineConfig) -> Result<Self, EngineError> {
        let models_dir = config.models_dir();
        std::fs::create_dir_all(&models_dir)?;

        let open = |filename: &str, url: &str| -> Result<Session> {
            let path = ensure_model(&models_dir, filename, url)?;
            build_session(&path, config.intra_threads)
        };

        let detection = open(DETECTION_MODEL_FILE, DETECTION_MODEL_URL)
            .map_err(|e| EngineError::ModelUnavailable(format!("{DETECTION_MODEL_FILE}: {e:#}")))?;
        let embedding = open(EMBEDDING_MODEL_FILE, EMBEDDING_MODEL_URL)
            .map_err(|e| EngineError::ModelUnavailable(format!("{EMBEDDING_MODEL_FILE}: {e:#}")))?;

        tracing::info!(models_dir = ?models_dir, "Face models loaded");

        Ok(Self {
            detection: Mutex::new(detection),
            embedding: Mutex::new(embedding),
            confidence_threshold: config.detection_confidence,
            nms_threshold: config.nms_threshold,
        })
    }

    /// Detect faces in a decoded image and embed each of them
    pub fn detect_in_image(&self, img: &DynamicImage) -> Result<Vec<FaceDetection>> {
        let (orig_width, orig_height) = img.dimensions();

        let face_boxes = {
            let mut session = self
                .detection
                .lock()
                .map_err(|e| anyhow!("Failed to lock detection model: {}", e))?;
            run_ultraface_detection(&mut session, img, self.confidence_threshold, self.nms_threshold)?
        };

        if face_boxes.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = self
            .embedding
            .lock()
            .map_err(|e| anyhow!("Failed to lock embedding model: {}", e))?;

        let mut faces = Vec::with_capacity(face_boxes.len());
        for (bbox, confidence) in face_boxes {
            if bbox.width <= 0 || bbox.height <= 0 {
                continue;
            }

            let face_crop = crop_face(img, &bbox, orig_width, orig_height);
            let embedding = run_arcface_embedding(&mut session, &face_crop)?;

            faces.push(FaceDetection {
                bbox,
                embedding,
                confidence,
            });
        }

        Ok(faces)
    }
}

impl DetectionEngine for OnnxEngine {
    fn name(&self) -> &str {
        "ultraface+arcface"
    }

    fn detect(&self, image_path: &Path) -> Result<Vec<FaceDetection>, EngineError> {
        let img = image::open(image_path).map_err(|e| EngineError::ImageLoad {
            path: image_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let faces = self
            .detect_in_image(&img)
            .map_err(|e| EngineError::Inference(format!("{e:#}")))?;

        tracing::debug!(image = ?image_path, faces = faces.len(), "Detection finished");
        Ok(faces)
    }
}

/// Download a model file if it doesn't exist
fn ensure_model(models_dir: &Path, filename: &str, url: &str) -> Result<PathBuf> {
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, "Downloading model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        // Write to a temporary name first so an interrupted download is retried
        let partial_path = model_path.with_extension("part");
        let mut file = std::fs::File::create(&partial_path)?;
        std::io::copy(&mut response.into_reader(), &mut file)?;
        std::fs::rename(&partial_path, &model_path)?;
        tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
    }

    Ok(model_path)
}

fn build_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Run UltraFace detection model
fn run_ultraface_detection(
    session: &mut Session,
    img: &DynamicImage,
    confidence_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<(BoundingBox, f32)>> {
    const INPUT_WIDTH: u32 = 320;
    const INPUT_HEIGHT: u32 = 240;

    let (orig_width, orig_height) = img.dimensions();

    let resized = img.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    // NCHW, normalized to roughly [-1, 1]
    let plane = (INPUT_HEIGHT * INPUT_WIDTH) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * INPUT_WIDTH as usize + x as usize;
        for channel in 0..3 {
            input_data[channel * plane + idx] = (pixel[channel] as f32 - 127.0) / 128.0;
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize],
        input_data.into_boxed_slice(),
    ))?;

    let outputs = session.run(ort::inputs!["input" => input_tensor])?;

    let scores_value = outputs.get("scores").ok_or_else(|| anyhow!("No scores output"))?;
    let boxes_value = outputs.get("boxes").ok_or_else(|| anyhow!("No boxes output"))?;

    let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
    let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

    // scores: [1, anchors, 2] (background, face); boxes: [1, anchors, 4] normalized corners
    let num_anchors = scores_shape[1] as usize;
    let mut face_boxes = Vec::new();

    for i in 0..num_anchors {
        let confidence = scores_data[i * 2 + 1];
        if confidence <= confidence_threshold {
            continue;
        }

        let x1 = (boxes_data[i * 4] * orig_width as f32) as i32;
        let y1 = (boxes_data[i * 4 + 1] * orig_height as f32) as i32;
        let x2 = (boxes_data[i * 4 + 2] * orig_width as f32) as i32;
        let y2 = (boxes_data[i * 4 + 3] * orig_height as f32) as i32;

        let bbox = BoundingBox {
            x: x1.max(0),
            y: y1.max(0),
            width: (x2 - x1).max(1),
            height: (y2 - y1).max(1),
        };
        face_boxes.push((bbox, confidence));
    }

    Ok(nms(face_boxes, nms_threshold))
}

/// Non-maximum suppression to remove overlapping detections
fn nms(mut boxes: Vec<(BoundingBox, f32)>, threshold: f32) -> Vec<(BoundingBox, f32)> {
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<(BoundingBox, f32)> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|(kept, _)| compute_iou(kept, &candidate.0) <= threshold) {
            keep.push(candidate);
        }
    }

    keep
}

/// Compute Intersection over Union between two bounding boxes
fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f32;
    let area_a = (a.width * a.height) as f32;
    let area_b = (b.width * b.height) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Crop face region from image with 20% padding
fn crop_face(img: &DynamicImage, bbox: &BoundingBox, img_width: u32, img_height: u32) -> DynamicImage {
    let padding_x = (bbox.width as f32 * 0.2) as i32;
    let padding_y = (bbox.height as f32 * 0.2) as i32;

    let x = ((bbox.x - padding_x).max(0) as u32).min(img_width.saturating_sub(1));
    let y = ((bbox.y - padding_y).max(0) as u32).min(img_height.saturating_sub(1));
    let w = ((bbox.width + padding_x * 2) as u32).min(img_width - x);
    let h = ((bbox.height + padding_y * 2) as u32).min(img_height - y);

    img.crop_imm(x, y, w.max(1), h.max(1))
}

/// Run ArcFace embedding model
fn run_arcface_embedding(session: &mut Session, face_img: &DynamicImage) -> Result<Vec<f32>> {
    const INPUT_SIZE: u32 = 112;

    let resized = face_img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * INPUT_SIZE as usize + x as usize;
        for channel in 0..3 {
            input_data[channel * plane + idx] = (pixel[channel] as f32 - 127.5) / 127.5;
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))?;

    // ArcFace ONNX model uses "data" as input name
    let outputs = session.run(ort::inputs!["data" => input_tensor])?;

    let embedding_output = outputs
        .iter()
        .next()
        .ok_or_else(|| anyhow!("No embedding output"))?;

    let (_embedding_shape, embedding_data) = embedding_output.1.try_extract_tensor::<f32>()?;

    let embedding: Vec<f32> = embedding_data.to_vec();
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        Ok(embedding.iter().map(|x| x / norm).collect())
    } else {
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let bbox = BoundingBox::new(5, 5, 10, 10);
        assert_eq!(bbox.center(), (10.0, 10.0));

        let odd = BoundingBox::new(0, 0, 3, 5);
        assert_eq!(odd.center(), (1.5, 2.5));
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(0, 0, 10, 10);
        assert!((compute_iou(&a, &b) - 1.0).abs() < 0.001);

        let c = BoundingBox::new(20, 20, 10, 10);
        assert!((compute_iou(&a, &c) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_nms_keeps_highest_confidence() {
        let boxes = vec![
            (BoundingBox::new(0, 0, 10, 10), 0.8),
            (BoundingBox::new(1, 1, 10, 10), 0.95),
            (BoundingBox::new(100, 100, 10, 10), 0.75),
        ];

        let kept = nms(boxes, 0.3);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].0, BoundingBox::new(1, 1, 10, 10));
        assert_eq!(kept[1].0, BoundingBox::new(100, 100, 10, 10));
    }

    #[test]
    fn test_crop_face_stays_inside_image() {
        let img = DynamicImage::new_rgb8(50, 40);
        let bbox = BoundingBox::new(40, 30, 20, 20);

        let crop = crop_face(&img, &bbox, 50, 40);
        let (w, h) = crop.dimensions();

        assert!(w >= 1 && w <= 50);
        assert!(h >= 1 && h <= 40);
    }
}
