//! Drag and transform engine.
//!
//! A [`DragSession`] lives from pointer-down on an annotation to pointer-up.
//! It snapshots the geometry of every participating annotation at the start,
//! derives one image-space delta from the dragged annotation's displacement
//! on every move, and produces:
//! - render-space [`NodePatch`]es for live feedback, applied directly to the
//!   scene without touching the annotation store
//! - final shapes at the end, each clipped to the image independently

use std::collections::BTreeMap;

use crate::geometry::{Point, Rect, ViewTransform};
use crate::model::{Annotation, AnnotationId, ImageSize, Shape};

/// Classify a gesture: displacement strictly below `threshold` screen pixels
/// is a click.
pub fn is_click(down: Point, up: Point, threshold: f64) -> bool {
    down.distance_to(&up) < threshold
}

/// A direct mutation of a scene node, in render space.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePatch {
    /// Move the node's origin. Rectangles and points are positioned at their
    /// top-left; polygons sit at the origin with absolute points, so their
    /// position is a pure offset.
    Position(Point),
    /// Replace a polygon node's points and reset its offset.
    Points(Vec<Point>),
}

/// Render-space node attributes reported by a transform handle at the end of
/// a resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub x: f64,
    pub y: f64,
    /// Unscaled node width.
    pub width: f64,
    /// Unscaled node height.
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl NodeTransform {
    /// The node as it is rendered for `rect` at the given autofit scale.
    pub fn at_rest(rect: Rect, autofit: f64) -> Self {
        Self {
            x: rect.x * autofit,
            y: rect.y * autofit,
            width: rect.width * autofit,
            height: rect.height * autofit,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

/// Fold a resize into image-space rectangle geometry.
///
/// Scale factors are multiplied into the size and the node origin is divided
/// by the autofit scale. Mirrored (negative) scales are normalized. The result
/// is clipped when `clip_to` is known and is never smaller than 1x1.
pub fn resize_rectangle(
    transform: NodeTransform,
    autofit: f64,
    clip_to: Option<ImageSize>,
) -> Rect {
    let mut x = transform.x / autofit;
    let mut y = transform.y / autofit;
    let mut width = transform.width * transform.scale_x / autofit;
    let mut height = transform.height * transform.scale_y / autofit;

    if width < 0.0 {
        x += width;
        width = -width;
    }
    if height < 0.0 {
        y += height;
        height = -height;
    }

    let rect = Rect::new(x, y, width.max(1.0), height.max(1.0));
    match clip_to {
        Some(size) => {
            crate::geometry::clip_rect_to_image_bounds(rect, size.width_f64(), size.height_f64())
        }
        None => rect,
    }
}

/// One pointer-down-to-up drag of one or more annotations.
#[derive(Debug, Clone)]
pub struct DragSession {
    /// The annotation under the pointer.
    dragged: AnnotationId,
    /// Screen position of pointer-down.
    pointer_start: Point,
    /// Original geometry of every participant, the dragged one included.
    snapshots: BTreeMap<AnnotationId, Shape>,
    /// Current image-space delta.
    delta: Point,
}

impl DragSession {
    /// Start dragging `dragged`.
    ///
    /// When more than one annotation is selected and `dragged` is one of
    /// them, every selected annotation joins the drag as a group.
    /// `selected` holds the current geometry of all selected annotations.
    pub fn begin<'a>(
        dragged: &Annotation,
        selected: impl IntoIterator<Item = &'a Annotation>,
        pointer: Point,
    ) -> Self {
        let mut snapshots = BTreeMap::new();
        snapshots.insert(dragged.id, dragged.shape.clone());

        let selected: Vec<&Annotation> = selected.into_iter().collect();
        let is_group = selected.len() > 1 && selected.iter().any(|a| a.id == dragged.id);
        if is_group {
            for ann in selected {
                snapshots.insert(ann.id, ann.shape.clone());
            }
        }

        log::debug!(
            "Drag started on {} with {} participant(s)",
            dragged.id,
            snapshots.len()
        );

        Self {
            dragged: dragged.id,
            pointer_start: pointer,
            snapshots,
            delta: Point::ORIGIN,
        }
    }

    pub fn dragged(&self) -> AnnotationId {
        self.dragged
    }

    pub fn pointer_start(&self) -> Point {
        self.pointer_start
    }

    pub fn is_group(&self) -> bool {
        self.snapshots.len() > 1
    }

    pub fn participants(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.snapshots.keys().copied()
    }

    pub fn snapshot(&self, id: AnnotationId) -> Option<&Shape> {
        self.snapshots.get(&id)
    }

    /// Current image-space delta.
    pub fn delta(&self) -> Point {
        self.delta
    }

    /// Move the pointer to `pointer` (screen space) and return the live
    /// patches for every participant.
    ///
    /// The scene draws nodes in render space scaled by zoom, so the dragged
    /// node moves by `screen displacement / zoom`. The image-space delta is
    /// that node's displacement divided by the autofit scale.
    pub fn update(
        &mut self,
        pointer: Point,
        view: ViewTransform,
    ) -> Vec<(AnnotationId, NodePatch)> {
        let render_dx = (pointer.x - self.pointer_start.x) / view.zoom;
        let render_dy = (pointer.y - self.pointer_start.y) / view.zoom;

        let Some(dragged_snapshot) = self.snapshots.get(&self.dragged) else {
            return Vec::new();
        };

        let dragged_patch = match dragged_snapshot {
            Shape::Polygon { .. } => {
                let raw_offset = Point::new(render_dx, render_dy);
                self.delta = raw_offset.scale(1.0 / view.autofit);
                NodePatch::Position(raw_offset)
            }
            shape => {
                let origin = shape.bounds().top_left();
                let node_pos = Point::new(
                    origin.x * view.autofit + render_dx,
                    origin.y * view.autofit + render_dy,
                );
                self.delta = Point::new(
                    node_pos.x / view.autofit - origin.x,
                    node_pos.y / view.autofit - origin.y,
                );
                NodePatch::Position(node_pos)
            }
        };

        let mut patches = vec![(self.dragged, dragged_patch)];
        for (id, snapshot) in &self.snapshots {
            if *id == self.dragged {
                continue;
            }
            let moved = snapshot.translated(self.delta.x, self.delta.y);
            patches.push((*id, render_patch(&moved, view.autofit)));
        }
        patches
    }

    /// Patches that put every participant back at its snapshot geometry.
    pub fn revert_patches(&self, autofit: f64) -> Vec<(AnnotationId, NodePatch)> {
        self.snapshots
            .iter()
            .map(|(id, shape)| (*id, render_patch(shape, autofit)))
            .collect()
    }

    /// Final geometry of every participant: snapshot plus delta, then clipped
    /// per annotation. Near a boundary the effective offsets can differ
    /// between annotations.
    pub fn finish(&self, clip_to: Option<ImageSize>) -> Vec<(AnnotationId, Shape)> {
        log::debug!(
            "Drag finished with delta ({:.2}, {:.2}) over {} annotation(s)",
            self.delta.x,
            self.delta.y,
            self.snapshots.len()
        );
        self.snapshots
            .iter()
            .map(|(id, shape)| {
                let moved = shape.translated(self.delta.x, self.delta.y);
                let moved = match clip_to {
                    Some(size) => moved.clipped(size.width_f64(), size.height_f64()),
                    None => moved,
                };
                (*id, moved)
            })
            .collect()
    }
}

/// Patch that renders `shape` at rest.
pub fn render_patch(shape: &Shape, autofit: f64) -> NodePatch {
    match shape {
        Shape::Polygon { points } => {
            NodePatch::Points(points.iter().map(|p| p.scale(autofit)).collect())
        }
        other => NodePatch::Position(other.bounds().top_left().scale(autofit)),
    }
}
