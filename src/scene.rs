//! Boundary to the rendering backend.
//!
//! The engine drives any retained scene through the [`Scene`] trait. Static
//! annotations are described by [`draw_command`], a pure function of the
//! annotation, its label and the appearance settings; [`ShapeMemo`] keeps the
//! last inputs per annotation so unchanged nodes are never re-sent.
//!
//! All coordinates handed to a scene are in render space (image space times
//! the autofit scale). The scene applies zoom and pan itself via
//! [`Scene::apply_view`].

use std::collections::HashMap;

use crate::config::Appearance;
use crate::geometry::{Point, Rect, ViewTransform};
use crate::model::{Annotation, AnnotationId, Label, LabelId, Shape};

/// Radius of point annotations, in render pixels.
const POINT_RADIUS: f64 = 4.0;

/// Opaque reference to a node owned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// Scene layer a node is mounted in, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Unselected annotations.
    Static,
    /// Selected annotations with their handles.
    Interactive,
}

/// Geometry of a draw command, in render space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawShape {
    Rect(Rect),
    Polygon { points: Vec<Point>, closed: bool },
    Point { center: Point, radius: f64 },
}

/// Everything a scene needs to draw one node.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub shape: DrawShape,
    pub color: [u8; 3],
    pub stroke_width: f64,
    pub fill_opacity: f64,
    pub selected: bool,
    /// Vertex handles of a selected polygon.
    pub handles: Vec<Point>,
    /// Caption drawn next to the shape.
    pub caption: Option<String>,
}

/// Build the draw command for an annotation.
pub fn draw_command(
    annotation: &Annotation,
    label: Option<&Label>,
    appearance: &Appearance,
    autofit: f64,
    selected: bool,
) -> DrawCommand {
    let shape = match &annotation.shape {
        Shape::Rectangle(rect) => DrawShape::Rect(rect.scale(autofit)),
        Shape::Polygon { points } => DrawShape::Polygon {
            points: points.iter().map(|p| p.scale(autofit)).collect(),
            closed: true,
        },
        Shape::Point(p) => DrawShape::Point {
            center: p.scale(autofit),
            radius: POINT_RADIUS,
        },
    };

    let handles = match (&shape, selected) {
        (DrawShape::Polygon { points, .. }, true) => points.clone(),
        _ => Vec::new(),
    };

    let mut caption = None;
    if appearance.show_labels {
        if let Some(label) = label {
            caption = Some(label.name.clone());
        }
    }
    if appearance.show_confidence && annotation.is_auto_generated {
        if let Some(confidence) = annotation.confidence {
            let text = format!("{:.0}%", confidence * 100.0);
            caption = Some(match caption {
                Some(name) => format!("{} {}", name, text),
                None => text,
            });
        }
    }

    DrawCommand {
        shape,
        color: label.map(Label::rgb).unwrap_or([128, 128, 128]),
        stroke_width: if selected {
            appearance.selected_stroke_width
        } else {
            appearance.stroke_width
        },
        fill_opacity: appearance.fill_opacity,
        selected,
        handles,
        caption,
    }
}

/// Draw command for an in-progress draft or rubber band.
pub fn overlay_command(shape: DrawShape, color: [u8; 3], appearance: &Appearance) -> DrawCommand {
    DrawCommand {
        shape,
        color,
        stroke_width: appearance.stroke_width,
        fill_opacity: appearance.fill_opacity / 2.0,
        selected: false,
        handles: Vec::new(),
        caption: None,
    }
}

/// Exactly the inputs [`draw_command`] reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawKey {
    shape: Shape,
    label_id: LabelId,
    label_name: Option<String>,
    label_color: Option<String>,
    confidence: Option<f64>,
    is_auto_generated: bool,
    appearance: Appearance,
    autofit: f64,
    selected: bool,
}

impl DrawKey {
    pub fn new(
        annotation: &Annotation,
        label: Option<&Label>,
        appearance: &Appearance,
        autofit: f64,
        selected: bool,
    ) -> Self {
        Self {
            shape: annotation.shape.clone(),
            label_id: annotation.label_id,
            label_name: label.map(|l| l.name.clone()),
            label_color: label.map(|l| l.color.clone()),
            confidence: annotation.confidence,
            is_auto_generated: annotation.is_auto_generated,
            appearance: appearance.clone(),
            autofit,
            selected,
        }
    }
}

/// Shallow change detector over [`DrawKey`]s.
#[derive(Debug, Clone, Default)]
pub struct ShapeMemo {
    keys: HashMap<AnnotationId, DrawKey>,
}

impl ShapeMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` for `id`. Returns `true` if it differs from the last one,
    /// i.e. the node has to be redrawn.
    pub fn changed(&mut self, id: AnnotationId, key: DrawKey) -> bool {
        if self.keys.get(&id) == Some(&key) {
            return false;
        }
        self.keys.insert(id, key);
        true
    }

    /// Force the next [`changed`](Self::changed) for `id` to report a change.
    pub fn invalidate(&mut self, id: AnnotationId) {
        self.keys.remove(&id);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Rendering backend driven by the engine.
pub trait Scene {
    /// Create a node for annotation `id`.
    fn mount(&mut self, id: AnnotationId, layer: Layer, command: &DrawCommand) -> NodeHandle;

    /// Redraw a node from a fresh command. Resets any direct mutation.
    fn update(&mut self, handle: NodeHandle, command: &DrawCommand);

    fn unmount(&mut self, handle: NodeHandle);

    /// Move a node's origin. Used for live drag feedback.
    fn set_node_offset(&mut self, handle: NodeHandle, offset: Point);

    /// Replace a polygon node's points and reset its offset.
    fn set_node_points(&mut self, handle: NodeHandle, points: &[Point]);

    /// Replace a rectangle node's geometry and reset its scale.
    fn set_node_rect(&mut self, handle: NodeHandle, rect: Rect);

    /// Draft preview or rubber band, drawn above everything else.
    fn set_overlay(&mut self, overlay: Option<&DrawCommand>);

    /// Apply zoom and pan to the whole scene.
    fn apply_view(&mut self, transform: ViewTransform);

    fn show_tooltip(&mut self, id: AnnotationId, bounds: Rect);

    fn hide_tooltip(&mut self);

    /// Request a redraw.
    fn paint(&mut self);
}

/// O(1) lookup from annotation id to its scene node.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: HashMap<AnnotationId, (NodeHandle, Layer)>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: AnnotationId, handle: NodeHandle, layer: Layer) {
        self.nodes.insert(id, (handle, layer));
    }

    pub fn unregister(&mut self, id: AnnotationId) -> Option<NodeHandle> {
        self.nodes.remove(&id).map(|(handle, _)| handle)
    }

    pub fn get(&self, id: AnnotationId) -> Option<NodeHandle> {
        self.nodes.get(&id).map(|(handle, _)| *handle)
    }

    pub fn layer(&self, id: AnnotationId) -> Option<Layer> {
        self.nodes.get(&id).map(|(_, layer)| *layer)
    }

    pub fn ids(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every entry, returning the handles.
    pub fn drain(&mut self) -> Vec<NodeHandle> {
        self.nodes.drain().map(|(_, (handle, _))| handle).collect()
    }
}

// ============================================================================
// Recording scene
// ============================================================================

/// A node as last set up by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNode {
    pub id: AnnotationId,
    pub layer: Layer,
    pub command: DrawCommand,
    /// Direct offset applied on top of the command's geometry.
    pub offset: Point,
}

/// Headless [`Scene`] that records what it was told. Used by the replay
/// binary and by tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingScene {
    nodes: HashMap<NodeHandle, RecordedNode>,
    next_handle: u64,
    pub view: ViewTransform,
    pub overlay: Option<DrawCommand>,
    pub tooltip: Option<(AnnotationId, Rect)>,
    pub mounts: usize,
    pub updates: usize,
    pub unmounts: usize,
    pub paints: usize,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&RecordedNode> {
        self.nodes.get(&handle)
    }

    /// Find the node drawn for annotation `id`.
    pub fn node_for(&self, id: AnnotationId) -> Option<&RecordedNode> {
        self.nodes.values().find(|n| n.id == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Scene for RecordingScene {
    fn mount(&mut self, id: AnnotationId, layer: Layer, command: &DrawCommand) -> NodeHandle {
        self.next_handle += 1;
        let handle = NodeHandle(self.next_handle);
        self.nodes.insert(
            handle,
            RecordedNode {
                id,
                layer,
                command: command.clone(),
                offset: Point::ORIGIN,
            },
        );
        self.mounts += 1;
        handle
    }

    fn update(&mut self, handle: NodeHandle, command: &DrawCommand) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.command = command.clone();
            node.offset = Point::ORIGIN;
            self.updates += 1;
        }
    }

    fn unmount(&mut self, handle: NodeHandle) {
        if self.nodes.remove(&handle).is_some() {
            self.unmounts += 1;
        }
    }

    fn set_node_offset(&mut self, handle: NodeHandle, offset: Point) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        match &mut node.command.shape {
            // Rectangles and points are positioned by their origin
            DrawShape::Rect(rect) => {
                rect.x = offset.x;
                rect.y = offset.y;
            }
            DrawShape::Point { center, .. } => *center = offset,
            DrawShape::Polygon { .. } => node.offset = offset,
        }
    }

    fn set_node_points(&mut self, handle: NodeHandle, points: &[Point]) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        if let DrawShape::Polygon { points: current, .. } = &mut node.command.shape {
            *current = points.to_vec();
            node.offset = Point::ORIGIN;
        }
    }

    fn set_node_rect(&mut self, handle: NodeHandle, rect: Rect) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            if let DrawShape::Rect(current) = &mut node.command.shape {
                *current = rect;
            }
        }
    }

    fn set_overlay(&mut self, overlay: Option<&DrawCommand>) {
        self.overlay = overlay.cloned();
    }

    fn apply_view(&mut self, transform: ViewTransform) {
        self.view = transform;
    }

    fn show_tooltip(&mut self, id: AnnotationId, bounds: Rect) {
        self.tooltip = Some((id, bounds));
    }

    fn hide_tooltip(&mut self) {
        self.tooltip = None;
    }

    fn paint(&mut self) {
        self.paints += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> Label {
        Label::new(3, "car", "#ff0000")
    }

    fn rect_ann() -> Annotation {
        Annotation::new(1, 1, 3, Shape::Rectangle(Rect::new(10.0, 20.0, 30.0, 40.0)))
    }

    #[test]
    fn test_draw_command_scales_to_render_space() {
        let cmd = draw_command(&rect_ann(), Some(&label()), &Appearance::default(), 0.5, false);
        assert_eq!(cmd.shape, DrawShape::Rect(Rect::new(5.0, 10.0, 15.0, 20.0)));
        assert_eq!(cmd.color, [255, 0, 0]);
        assert_eq!(cmd.caption.as_deref(), Some("car"));
        assert!(cmd.handles.is_empty());
    }

    #[test]
    fn test_selected_polygon_gets_handles() {
        let ann = Annotation::new(
            2,
            1,
            3,
            Shape::Polygon {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)],
            },
        );
        let appearance = Appearance::default();
        let cmd = draw_command(&ann, Some(&label()), &appearance, 2.0, true);
        assert_eq!(cmd.handles.len(), 3);
        assert_eq!(cmd.handles[1], Point::new(20.0, 0.0));
        assert_eq!(cmd.stroke_width, appearance.selected_stroke_width);
    }

    #[test]
    fn test_confidence_caption() {
        let ann = rect_ann().auto_generated(0.87);
        let appearance = Appearance {
            show_confidence: true,
            ..Appearance::default()
        };
        let cmd = draw_command(&ann, Some(&label()), &appearance, 1.0, false);
        assert_eq!(cmd.caption.as_deref(), Some("car 87%"));
    }

    #[test]
    fn test_memo_detects_only_relevant_changes() {
        let mut memo = ShapeMemo::new();
        let appearance = Appearance::default();
        let ann = rect_ann();
        let key = || DrawKey::new(&ann, Some(&label()), &appearance, 1.0, false);
        assert!(memo.changed(1, key()));
        assert!(!memo.changed(1, key()));

        // Timestamps are not read by draw_command
        let mut touched = ann.clone();
        touched.updated_at += 1000;
        assert!(!memo.changed(1, DrawKey::new(&touched, Some(&label()), &appearance, 1.0, false)));

        assert!(memo.changed(1, DrawKey::new(&ann, Some(&label()), &appearance, 1.0, true)));
        memo.invalidate(1);
        assert!(memo.changed(1, DrawKey::new(&ann, Some(&label()), &appearance, 1.0, true)));
    }

    #[test]
    fn test_recording_scene_direct_mutation() {
        let mut scene = RecordingScene::new();
        let cmd = draw_command(&rect_ann(), Some(&label()), &Appearance::default(), 1.0, false);
        let handle = scene.mount(1, Layer::Static, &cmd);
        scene.set_node_offset(handle, Point::new(50.0, 60.0));
        assert_eq!(
            scene.node(handle).map(|n| n.command.shape.clone()),
            Some(DrawShape::Rect(Rect::new(50.0, 60.0, 30.0, 40.0)))
        );

        scene.update(handle, &cmd);
        assert_eq!(scene.node(handle).map(|n| n.command.clone()), Some(cmd));
        scene.unmount(handle);
        assert_eq!(scene.node_count(), 0);
        assert_eq!((scene.mounts, scene.updates, scene.unmounts), (1, 1, 1));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = NodeRegistry::new();
        registry.register(5, NodeHandle(9), Layer::Interactive);
        assert_eq!(registry.get(5), Some(NodeHandle(9)));
        assert_eq!(registry.layer(5), Some(Layer::Interactive));
        assert_eq!(registry.unregister(5), Some(NodeHandle(9)));
        assert!(registry.is_empty());
    }
}
