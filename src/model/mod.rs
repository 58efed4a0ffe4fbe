//! Data models for the canvas engine.

mod annotation;
mod label;

pub use annotation::{
    Annotation, AnnotationId, AnnotationSource, AttributeValue, Shape, ShapeKind,
    MIN_POLYGON_VERTICES,
};
pub use label::{Label, LabelId};

use serde::{Deserialize, Serialize};

/// Identifier for an image.
pub type ImageId = u64;

/// Pixel dimensions of the loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width_f64(&self) -> f64 {
        self.width as f64
    }

    pub fn height_f64(&self) -> f64 {
        self.height as f64
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
