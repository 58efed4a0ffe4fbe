//! The interactive canvas engine.
//!
//! [`CanvasEngine`] ties the pieces together: it routes pointer, wheel and
//! keyboard input to the viewport, tool, selection and drag machinery, keeps
//! the scene in sync with the annotation store, and reports everything the
//! surrounding application needs to know through a queue of
//! [`EngineEvent`]s.
//!
//! The engine is host-driven and never blocks:
//! - input methods record state and return immediately
//! - [`frame`](CanvasEngine::frame) applies at most one coalesced pointer
//!   move and one wheel batch, then repaints
//! - [`tick`](CanvasEngine::tick) fires due debounce timers (viewport and
//!   selection commits, hover tooltips)

mod commit;
mod pointer;


use std::collections::{BTreeSet, HashMap};

use web_time::Instant;

use crate::config::EngineConfig;
use crate::drag::{DragSession, NodePatch};
use crate::error::Rejection;
use crate::geometry::{self, Point, Rect, ViewTransform};
use crate::hover::{HoverAction, HoverController};
use crate::model::{AnnotationId, ImageId, ImageSize, LabelId};
use crate::polygon_edit::VertexDrag;
use crate::scene::{
    draw_command, overlay_command, DrawKey, DrawShape, Layer, NodeHandle, NodeRegistry, Scene,
    ShapeMemo,
};
use crate::selection::SelectionManager;
use crate::store::{AnnotationStore, ImageProvider, LabelRegistry};
use crate::timing::FrameGate;
use crate::tool::{DraftPreview, Tool, ToolState};
use crate::viewport::{autofit_scale, Viewport, ViewportController};
use crate::visibility::{RenderSet, VisibilityFilter, VisibilityLayer};

/// Notifications for the surrounding application, drained with
/// [`CanvasEngine::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A drawing tool produced a new annotation (already in the store).
    AnnotationCreated(crate::model::Annotation),
    /// These annotations were moved, resized or point-edited.
    AnnotationsUpdated(Vec<AnnotationId>),
    /// The committed selection changed.
    SelectionChanged(Vec<AnnotationId>),
    /// A zoom/pan gesture settled.
    ViewportChanged(Viewport),
    /// User input was refused.
    Rejected(Rejection),
    ToolChanged(Tool),
}

/// Hands out annotation ids. Never reuses an id within its lifetime.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    /// `None` once `AnnotationId::MAX` has been handed out or seen.
    next: Option<AnnotationId>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: Some(1) }
    }

    /// Make sure future ids are above `existing`.
    pub fn seed_above(&mut self, existing: AnnotationId) {
        self.next = match (self.next, existing.checked_add(1)) {
            (Some(next), Some(above)) => Some(next.max(above)),
            _ => None,
        };
    }

    /// The next free id, or `None` when the id space is used up.
    pub fn next_id(&mut self) -> Option<AnnotationId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(id)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The pointer gesture in progress.
#[derive(Debug, Clone)]
enum Gesture {
    Idle,
    Pan,
    RubberBand,
    Drag { session: DragSession, shift: bool },
    Vertex(VertexDrag),
}

impl Gesture {
    /// Gestures that mutate scene nodes directly; syncing would undo them.
    fn mutates_nodes(&self) -> bool {
        matches!(self, Gesture::Drag { .. } | Gesture::Vertex(_))
    }
}

/// Interactive annotation canvas over a store `S`, a label registry `L` and
/// a scene `C`.
pub struct CanvasEngine<S, L, C> {
    store: S,
    labels: L,
    scene: C,
    config: EngineConfig,

    image_id: ImageId,
    image_size: Option<ImageSize>,
    canvas_width: f64,
    canvas_height: f64,
    autofit: f64,

    viewport: ViewportController,
    tool: ToolState,
    selection: SelectionManager,
    visibility: VisibilityLayer,
    hover: HoverController,
    registry: NodeRegistry,
    memo: ShapeMemo,
    ids: IdAllocator,
    active_label: Option<LabelId>,

    gesture: Gesture,
    /// Latest pointer position not yet applied by a frame.
    pending_move: FrameGate<Point>,
    /// Last pointer position seen, in screen space.
    pointer: Option<Point>,
    space_held: bool,

    render_set: RenderSet,
    events: Vec<EngineEvent>,
    needs_sync: bool,
    needs_paint: bool,
    torn_down: bool,
}

impl<S, L, C> CanvasEngine<S, L, C>
where
    S: AnnotationStore,
    L: LabelRegistry,
    C: Scene,
{
    pub fn new(store: S, labels: L, scene: C, config: EngineConfig) -> Self {
        let thresholds = &config.thresholds;
        let timing = &config.timing;
        let mut ids = IdAllocator::new();
        if let Some(max) = store.list().iter().map(|a| a.id).max() {
            ids.seed_above(max);
        }

        Self {
            viewport: ViewportController::new(thresholds, timing.viewport_commit()),
            tool: ToolState::new(thresholds),
            selection: SelectionManager::new(
                thresholds.rubber_band_min_size,
                timing.selection_commit(),
            ),
            visibility: VisibilityLayer::new(thresholds.cull_padding),
            hover: HoverController::new(
                timing.hover_show(),
                timing.hover_hide(),
                thresholds.hover_disable_threshold,
            ),
            store,
            labels,
            scene,
            image_id: 0,
            image_size: None,
            canvas_width: 0.0,
            canvas_height: 0.0,
            autofit: 1.0,
            registry: NodeRegistry::new(),
            memo: ShapeMemo::new(),
            ids,
            active_label: None,
            gesture: Gesture::Idle,
            pending_move: FrameGate::new(),
            pointer: None,
            space_held: false,
            render_set: RenderSet::default(),
            events: Vec::new(),
            needs_sync: true,
            needs_paint: false,
            torn_down: false,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable store access for external edits. Call
    /// [`notify_store_changed`](Self::notify_store_changed) afterwards.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn labels(&self) -> &L {
        &self.labels
    }

    /// Mutable label access. Call
    /// [`notify_store_changed`](Self::notify_store_changed) afterwards.
    pub fn labels_mut(&mut self) -> &mut L {
        &mut self.labels
    }

    pub fn scene(&self) -> &C {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut C {
        &mut self.scene
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record a node the host mounted itself.
    pub fn register_handle(&mut self, id: AnnotationId, handle: NodeHandle, layer: Layer) {
        self.registry.register(id, handle, layer);
        self.memo.invalidate(id);
    }

    pub fn unregister_handle(&mut self, id: AnnotationId) -> Option<NodeHandle> {
        self.memo.invalidate(id);
        self.registry.unregister(id)
    }

    // ------------------------------------------------------------------
    // Observable state
    // ------------------------------------------------------------------

    pub fn tool(&self) -> Tool {
        self.tool.tool()
    }

    pub fn selection(&self) -> &BTreeSet<AnnotationId> {
        self.selection.ids()
    }

    pub fn committed_viewport(&self) -> Viewport {
        self.viewport.committed()
    }

    pub fn live_viewport(&self) -> Viewport {
        self.viewport.live()
    }

    pub fn autofit(&self) -> f64 {
        self.autofit
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    /// Live image→screen transform.
    pub fn view_transform(&self) -> ViewTransform {
        self.viewport.live().transform(self.autofit)
    }

    /// What was drawn at the last sync.
    pub fn render_set(&self) -> &RenderSet {
        &self.render_set
    }

    pub fn active_label(&self) -> Option<LabelId> {
        self.active_label
    }

    pub fn visibility_filter(&self) -> VisibilityFilter {
        self.visibility.filter()
    }

    /// Take all pending events.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool.set_tool(tool) {
            self.refresh_overlay();
            self.events.push(EngineEvent::ToolChanged(tool));
        }
    }

    /// Label given to newly drawn annotations.
    pub fn set_active_label(&mut self, label: Option<LabelId>) {
        self.active_label = label;
        self.refresh_overlay();
    }

    pub fn set_visibility_filter(&mut self, filter: VisibilityFilter) {
        self.visibility.set_filter(filter);
        self.needs_sync = true;
    }

    /// The pointer entered (`true`) or left (`false`) the hover tooltip.
    /// The tooltip stays up while the pointer rests on it.
    pub fn tooltip_hovered(&mut self, hovered: bool, now: Instant) {
        if self.torn_down {
            return;
        }
        self.hover.tooltip_hovered(hovered, now);
    }

    /// Replace the selection programmatically, e.g. from a sidebar list.
    pub fn select(&mut self, ids: impl IntoIterator<Item = AnnotationId>, now: Instant) {
        if self.selection.replace(ids, now) {
            self.needs_sync = true;
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Container size in screen pixels. Recomputes the autofit scale.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.canvas_width = width;
        self.canvas_height = height;
        self.update_autofit();
        let visible = self.visible_image_rect();
        self.visibility.recompute(self.store.list(), visible);
        let view = self.view_transform();
        self.scene.apply_view(view);
        self.needs_sync = true;
    }

    /// Switch to a new image. The store must already hold its annotations.
    ///
    /// All ephemeral state is dropped, timers are cancelled, the selection is
    /// cleared and the view is reset.
    pub fn load_image(&mut self, image_id: ImageId, image: &impl ImageProvider) {
        let had_selection = !self.selection.is_empty();
        self.teardown();
        self.torn_down = false;

        self.image_id = image_id;
        self.image_size = image.dimensions();
        self.update_autofit();
        if let Some(max) = self.store.list().iter().map(|a| a.id).max() {
            self.ids.seed_above(max);
        }

        self.viewport.set(Viewport::identity());
        self.events.push(EngineEvent::ViewportChanged(Viewport::identity()));
        if had_selection {
            self.events.push(EngineEvent::SelectionChanged(Vec::new()));
        }

        let visible = self.visible_image_rect();
        self.visibility.thaw(self.store.list(), visible);
        let view = self.view_transform();
        self.scene.apply_view(view);
        self.needs_sync = true;

        match self.image_size {
            Some(size) => log::info!(
                "🖼️ Image {} loaded: {}x{}, autofit {:.3}",
                image_id,
                size.width,
                size.height,
                self.autofit
            ),
            None => log::info!("🖼️ Image {} loaded, dimensions unknown", image_id),
        }
    }

    /// Cancel everything in flight and unmount all nodes. Timers that would
    /// have fired are dropped; `frame` and `tick` are no-ops until the next
    /// [`load_image`](Self::load_image).
    pub fn teardown(&mut self) {
        self.gesture = Gesture::Idle;
        self.pending_move.cancel();
        self.viewport.cancel();
        self.selection.reset();
        self.tool.clear_drafts();
        if self.hover.reset().is_some() {
            self.scene.hide_tooltip();
        }
        for handle in self.registry.drain() {
            self.scene.unmount(handle);
        }
        self.memo.clear();
        self.render_set = RenderSet::default();
        self.scene.set_overlay(None);
        self.torn_down = true;
        log::debug!("Engine torn down");
    }

    /// The application changed annotations or labels behind the engine's
    /// back.
    pub fn notify_store_changed(&mut self, now: Instant) {
        if let Some(max) = self.store.list().iter().map(|a| a.id).max() {
            self.ids.seed_above(max);
        }
        let present: BTreeSet<AnnotationId> = self.store.list().iter().map(|a| a.id).collect();
        self.selection.retain(|id| present.contains(&id), now);
        let visible = self.visible_image_rect();
        self.visibility.recompute(self.store.list(), visible);
        self.needs_sync = true;
    }

    // ------------------------------------------------------------------
    // Zoom controls
    // ------------------------------------------------------------------

    pub fn zoom_in(&mut self, now: Instant) {
        let center = self.canvas_center();
        if self.viewport.zoom_in(center, now).is_some() {
            self.view_changed();
        }
    }

    pub fn zoom_out(&mut self, now: Instant) {
        let center = self.canvas_center();
        if self.viewport.zoom_out(center, now).is_some() {
            self.view_changed();
        }
    }

    /// Back to zoom 1 with no pan.
    pub fn reset_view(&mut self, now: Instant) {
        self.viewport.reset(now);
        self.view_changed();
    }

    // ------------------------------------------------------------------
    // Frame and timers
    // ------------------------------------------------------------------

    /// Per-frame callback.
    pub fn frame(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        if let Some(position) = self.pending_move.take() {
            self.apply_pointer_move(position, now);
        }
        if self.viewport.apply_wheel_batch(now).is_some() {
            self.view_changed();
        }
        self.flush_scene();
    }

    /// Timer callback. Fires due commits and hover transitions.
    pub fn tick(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }

        if let Some(viewport) = self.viewport.poll_commit(now) {
            self.events.push(EngineEvent::ViewportChanged(viewport));
            if !self.viewport.is_gesture_active() {
                let visible = self.visible_image_rect();
                self.visibility.thaw(self.store.list(), visible);
                self.needs_sync = true;
            }
        }

        if let Some(ids) = self.selection.poll_commit(now) {
            log::debug!("Selection committed: {:?}", ids);
            self.events.push(EngineEvent::SelectionChanged(ids));
        }

        for action in self.hover.tick(now) {
            self.apply_hover(action);
        }

        self.flush_scene();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn update_autofit(&mut self) {
        self.autofit = match self.image_size {
            Some(size) => autofit_scale(self.canvas_width, self.canvas_height, size),
            None => 1.0,
        };
    }

    fn canvas_center(&self) -> Point {
        Point::new(self.canvas_width / 2.0, self.canvas_height / 2.0)
    }

    fn visible_image_rect(&self) -> Rect {
        self.view_transform()
            .visible_image_rect(self.canvas_width, self.canvas_height)
    }

    /// Image size to clip into, if clipping applies.
    fn clip_to(&self) -> Option<ImageSize> {
        if self.config.behavior.clip_to_image {
            self.image_size
        } else {
            None
        }
    }

    fn has_active_label(&self) -> bool {
        self.active_label
            .is_some_and(|id| self.labels.get(id).is_some())
    }

    fn reject(&mut self, rejection: Rejection) {
        log::warn!("Rejected input: {}", rejection);
        self.events.push(EngineEvent::Rejected(rejection));
    }

    /// The live view moved: push it to the scene and freeze culling until
    /// the gesture settles.
    fn view_changed(&mut self) {
        let view = self.view_transform();
        self.scene.apply_view(view);
        self.visibility.freeze();
        self.needs_paint = true;
    }

    fn apply_hover(&mut self, action: HoverAction) {
        match action {
            HoverAction::Show { id, bounds } => {
                self.scene.show_tooltip(id, bounds.scale(self.autofit));
            }
            HoverAction::Hide => self.scene.hide_tooltip(),
        }
        self.needs_paint = true;
    }

    fn apply_patches(&mut self, patches: Vec<(AnnotationId, NodePatch)>) {
        for (id, patch) in patches {
            let Some(handle) = self.registry.get(id) else {
                continue;
            };
            match patch {
                NodePatch::Position(offset) => self.scene.set_node_offset(handle, offset),
                NodePatch::Points(points) => self.scene.set_node_points(handle, &points),
            }
        }
        self.needs_paint = true;
    }

    /// Topmost rendered annotation under a screen position.
    fn hit_test(&self, screen: Point) -> Option<AnnotationId> {
        let view = self.view_transform();
        let p = view.screen_to_image(screen);
        let radius = view.screen_len_to_image(self.config.thresholds.point_hit_radius);
        self.render_set.iter().rev().find(|id| {
            self.store
                .get(*id)
                .is_some_and(|ann| geometry::hit_test(&ann.shape, p, radius))
        })
    }

    /// Draw the draft preview or rubber band, or clear the overlay.
    fn refresh_overlay(&mut self) {
        let autofit = self.autofit;
        let color = self
            .active_label
            .and_then(|id| self.labels.get(id))
            .map(|label| label.rgb())
            .unwrap_or([128, 128, 128]);

        let shape = if let Some(band) = self.selection.rubber_band() {
            Some(DrawShape::Rect(band.rect().scale(autofit)))
        } else {
            let cursor = self
                .pointer
                .map(|p| self.view_transform().screen_to_image(p));
            cursor
                .and_then(|c| self.tool.preview(c))
                .map(|preview| match preview {
                    DraftPreview::Rectangle(rect) => DrawShape::Rect(rect.scale(autofit)),
                    DraftPreview::Polygon {
                        mut points,
                        cursor,
                        closing,
                    } => {
                        if !closing {
                            points.push(cursor);
                        }
                        DrawShape::Polygon {
                            points: points.iter().map(|p| p.scale(autofit)).collect(),
                            closed: closing,
                        }
                    }
                })
        };

        match shape {
            Some(shape) => {
                let command = overlay_command(shape, color, &self.config.appearance);
                self.scene.set_overlay(Some(&command));
            }
            None => self.scene.set_overlay(None),
        }
        self.needs_paint = true;
    }

    fn flush_scene(&mut self) {
        if self.needs_sync && !self.gesture.mutates_nodes() {
            self.sync_scene();
        }
        if self.needs_paint {
            self.scene.paint();
            self.needs_paint = false;
        }
    }

    /// Bring scene nodes in line with the store, the selection and the
    /// culled set. Unchanged nodes are skipped via the memo.
    fn sync_scene(&mut self) {
        let render_set =
            self.visibility
                .render_set(self.store.list(), &self.labels, self.selection.ids());

        let mut desired: HashMap<AnnotationId, Layer> = HashMap::with_capacity(render_set.len());
        desired.extend(render_set.static_ids.iter().map(|id| (*id, Layer::Static)));
        desired.extend(
            render_set
                .interactive_ids
                .iter()
                .map(|id| (*id, Layer::Interactive)),
        );

        let stale: Vec<AnnotationId> = self
            .registry
            .ids()
            .filter(|id| desired.get(id).copied() != self.registry.layer(*id))
            .collect();
        for id in stale {
            if let Some(handle) = self.registry.unregister(id) {
                self.scene.unmount(handle);
            }
            self.memo.invalidate(id);
        }

        let appearance = &self.config.appearance;
        for id in render_set.iter() {
            let Some(ann) = self.store.get(id) else {
                continue;
            };
            let Some(&layer) = desired.get(&id) else {
                continue;
            };
            let label = self.labels.get(ann.label_id);
            let selected = layer == Layer::Interactive;
            let changed = self
                .memo
                .changed(id, DrawKey::new(ann, label, appearance, self.autofit, selected));

            match self.registry.get(id) {
                None => {
                    let command = draw_command(ann, label, appearance, self.autofit, selected);
                    let handle = self.scene.mount(id, layer, &command);
                    self.registry.register(id, handle, layer);
                }
                Some(handle) if changed => {
                    let command = draw_command(ann, label, appearance, self.autofit, selected);
                    self.scene.update(handle, &command);
                }
                Some(_) => {}
            }
        }

        let filter = self.visibility.filter();
        let eligible: Vec<(AnnotationId, Rect)> = self
            .store
            .list()
            .iter()
            .filter(|a| filter.is_eligible(a, &self.labels))
            .map(|a| (a.id, a.bounds()))
            .collect();
        if let Some(action) = self.hover.rebuild(eligible) {
            self.apply_hover(action);
        }

        log::trace!(
            "Scene synced: {} static, {} interactive",
            render_set.static_ids.len(),
            render_set.interactive_ids.len()
        );
        self.render_set = render_set;
        self.needs_sync = false;
        self.needs_paint = true;
    }
}
