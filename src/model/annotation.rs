//! Annotation data model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geometry::{self, Point, Rect};
use crate::model::{now_millis, ImageId, LabelId};

/// Unique identifier for an annotation. Assigned at creation, never reused.
pub type AnnotationId = u64;

/// Minimum number of vertices a committed polygon may have.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Shape data for an annotation (in image coordinates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    /// Axis-aligned rectangle with non-negative extents.
    Rectangle(Rect),
    /// Closed polygon; the last point connects back to the first.
    Polygon { points: Vec<Point> },
    /// Single point marker.
    Point(Point),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Rectangle(_) => ShapeKind::Rectangle,
            Shape::Polygon { .. } => ShapeKind::Polygon,
            Shape::Point(_) => ShapeKind::Point,
        }
    }

    pub fn bounds(&self) -> Rect {
        geometry::bounds_of(self)
    }

    /// Translate the whole shape by an image-space delta.
    pub fn translated(&self, dx: f64, dy: f64) -> Shape {
        match self {
            Shape::Rectangle(rect) => Shape::Rectangle(rect.translate(dx, dy)),
            Shape::Polygon { points } => Shape::Polygon {
                points: points.iter().map(|p| p.offset(dx, dy)).collect(),
            },
            Shape::Point(p) => Shape::Point(p.offset(dx, dy)),
        }
    }

    /// Clip the shape into an image of the given size.
    pub fn clipped(&self, img_w: f64, img_h: f64) -> Shape {
        match self {
            Shape::Rectangle(rect) => {
                Shape::Rectangle(geometry::clip_rect_to_image_bounds(*rect, img_w, img_h))
            }
            Shape::Polygon { points } => Shape::Polygon {
                points: geometry::clip_polygon_to_image_bounds(points, img_w, img_h),
            },
            Shape::Point(p) => Shape::Point(geometry::clip_point_to_image_bounds(*p, img_w, img_h)),
        }
    }
}

/// Discriminant of [`Shape`], used for per-type visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Polygon,
    Point,
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Where an annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    #[default]
    Manual,
    AutoAnnotation,
    Imported,
}

fn default_visible() -> bool {
    true
}

/// A single annotation on an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub label_id: LabelId,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: u64,
    /// Epoch milliseconds, bumped on every mutation.
    #[serde(default)]
    pub updated_at: u64,
    /// Model confidence in `[0, 1]` for auto-generated annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_auto_generated: bool,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub source: AnnotationSource,
    pub shape: Shape,
}

impl Annotation {
    /// Create a new manually drawn annotation stamped with the current time.
    pub fn new(id: AnnotationId, image_id: ImageId, label_id: LabelId, shape: Shape) -> Self {
        let now = now_millis();
        Self {
            id,
            image_id,
            label_id,
            created_at: now,
            updated_at: now,
            confidence: None,
            is_auto_generated: false,
            is_visible: true,
            attributes: BTreeMap::new(),
            source: AnnotationSource::Manual,
            shape,
        }
    }

    /// Mark as produced by auto-annotation with the given confidence.
    pub fn auto_generated(mut self, confidence: f64) -> Self {
        self.is_auto_generated = true;
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self.source = AnnotationSource::AutoAnnotation;
        self
    }

    pub fn bounds(&self) -> Rect {
        self.shape.bounds()
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Replace the shape and bump `updated_at`.
    pub fn with_shape(&self, shape: Shape) -> Annotation {
        let mut next = self.clone();
        next.shape = shape;
        next.touch();
        next
    }

    /// Bump `updated_at`. Never moves backwards even if the wall clock does.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }

    pub fn polygon_points(&self) -> Option<&[Point]> {
        match &self.shape {
            Shape::Polygon { points } => Some(points),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_defaults_to_true() {
        let json = r#"{
            "id": 7, "imageId": 1, "labelId": 2,
            "createdAt": 10, "updatedAt": 10,
            "shape": {"type": "rectangle", "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0}
        }"#;
        let ann: Annotation = serde_json::from_str(json).expect("valid annotation");
        assert!(ann.is_visible);
        assert_eq!(ann.source, AnnotationSource::Manual);
        assert_eq!(ann.shape, Shape::Rectangle(Rect::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn test_attribute_scalars_deserialize() {
        let json = r#"{"occluded": true, "score": 0.5, "note": "tree"}"#;
        let attrs: BTreeMap<String, AttributeValue> = serde_json::from_str(json).unwrap();
        assert_eq!(attrs["occluded"], AttributeValue::Bool(true));
        assert_eq!(attrs["score"], AttributeValue::Number(0.5));
        assert_eq!(attrs["note"], AttributeValue::Text("tree".to_string()));
    }

    #[test]
    fn test_with_shape_bumps_updated_at() {
        let mut ann = Annotation::new(1, 1, 1, Shape::Point(Point::new(1.0, 1.0)));
        ann.updated_at = 0;
        let moved = ann.with_shape(Shape::Point(Point::new(2.0, 2.0)));
        assert!(moved.updated_at > 0);
        assert_eq!(moved.created_at, ann.created_at);
    }

    #[test]
    fn test_translate_and_clip_polygon() {
        let shape = Shape::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 5.0)],
        };
        let moved = shape.translated(-5.0, 2.0).clipped(100.0, 100.0);
        assert_eq!(
            moved,
            Shape::Polygon {
                points: vec![Point::new(0.0, 2.0), Point::new(5.0, 2.0), Point::new(0.0, 7.0)]
            }
        );
    }

    #[test]
    fn test_auto_generated_clamps_confidence() {
        let ann = Annotation::new(1, 1, 1, Shape::Point(Point::ORIGIN)).auto_generated(1.7);
        assert_eq!(ann.confidence, Some(1.0));
        assert!(ann.is_auto_generated);
    }
}
