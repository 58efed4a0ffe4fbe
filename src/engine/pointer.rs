//! Pointer, wheel and keyboard routing.

use web_time::Instant;

use super::{CanvasEngine, Gesture};
use crate::drag::{self, resize_rectangle, DragSession, NodeTransform};
use crate::error::Rejection;
use crate::geometry::{Point, Rect};
use crate::input::{Key, PointerButton, PointerEvent};
use crate::model::{AnnotationId, Shape};
use crate::polygon_edit::{self, VertexDrag};
use crate::scene::Scene;
use crate::store::{AnnotationStore, LabelRegistry};
use crate::tool::{Tool, ToolOutcome};

impl<S, L, C> CanvasEngine<S, L, C>
where
    S: AnnotationStore,
    L: LabelRegistry,
    C: Scene,
{
    pub fn pointer_down(&mut self, event: PointerEvent, now: Instant) {
        if self.torn_down {
            return;
        }
        if let Some(position) = self.pending_move.take() {
            self.apply_pointer_move(position, now);
        }
        self.pointer = Some(event.position);
        if self.hover.reset().is_some() {
            self.scene.hide_tooltip();
        }
        if !matches!(self.gesture, Gesture::Idle) {
            return;
        }

        let pans = event.button == PointerButton::Middle
            || (event.button == PointerButton::Left && self.space_held);
        if pans {
            self.viewport.begin_pan(event.position);
            self.gesture = Gesture::Pan;
            return;
        }
        if event.button != PointerButton::Left {
            return;
        }

        let p = self.view_transform().screen_to_image(event.position);
        match self.tool.tool() {
            Tool::Select => self.select_pointer_down(event, p, now),
            Tool::Rectangle | Tool::Polygon => self.draw_click(p),
        }
    }

    /// Queue a pointer move. Returns `true` if the host should request a
    /// frame; moves between frames are coalesced to the latest one.
    pub fn pointer_move(&mut self, position: Point) -> bool {
        if self.torn_down {
            return false;
        }
        self.pending_move.offer(position)
    }

    pub fn pointer_up(&mut self, event: PointerEvent, now: Instant) {
        if self.torn_down {
            return;
        }
        if let Some(position) = self.pending_move.take() {
            self.apply_pointer_move(position, now);
        }
        self.pointer = Some(event.position);
        let view = self.view_transform();
        let threshold = self.config.thresholds.click_drag_threshold;

        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => {}
            Gesture::Pan => self.finish_pan(),
            Gesture::RubberBand => {
                self.selection
                    .update_rubber_band(view.screen_to_image(event.position));
                let filter = self.visibility.filter();
                let candidates: Vec<(AnnotationId, Rect)> = self
                    .store
                    .list()
                    .iter()
                    .filter(|a| filter.is_eligible(a, &self.labels))
                    .map(|a| (a.id, a.bounds()))
                    .collect();
                if self.selection.finish_rubber_band(candidates, now) {
                    self.needs_sync = true;
                }
                self.refresh_overlay();
            }
            Gesture::Drag { mut session, shift } => {
                if drag::is_click(session.pointer_start(), event.position, threshold) {
                    self.apply_patches(session.revert_patches(self.autofit));
                    for id in session.participants() {
                        self.memo.invalidate(id);
                    }
                    self.selection.click(session.dragged(), shift, now);
                } else {
                    let patches = session.update(event.position, view);
                    self.apply_patches(patches);
                    for id in session.participants() {
                        self.memo.invalidate(id);
                    }
                    let clip_to = self.clip_to();
                    self.commit_shapes(session.finish(clip_to));
                }
                self.needs_sync = true;
            }
            Gesture::Vertex(mut vertex) => {
                self.memo.invalidate(vertex.id());
                if drag::is_click(vertex.pointer_start(), event.position, threshold) {
                    let patch = vertex.revert_patch(self.autofit);
                    self.apply_patches(vec![(vertex.id(), patch)]);
                } else {
                    let patch = vertex.update(event.position, view);
                    self.apply_patches(vec![(vertex.id(), patch)]);
                    let clip_to = self.clip_to();
                    let points = vertex.finish(clip_to);
                    self.commit_shapes(vec![(vertex.id(), Shape::Polygon { points })]);
                }
                self.needs_sync = true;
            }
        }
    }

    /// Closes polygon drafts, or deletes the vertex under the pointer of a
    /// selected polygon.
    pub fn double_click(&mut self, position: Point, now: Instant) {
        if self.torn_down {
            return;
        }
        if let Some(pending) = self.pending_move.take() {
            self.apply_pointer_move(pending, now);
        }

        match self.tool.tool() {
            Tool::Polygon => {
                if self.tool.is_drafting() && !self.has_active_label() {
                    self.reject(Rejection::NoActiveLabel);
                    return;
                }
                let clip_to = self.clip_to();
                let outcome = self.tool.double_click(clip_to);
                self.handle_tool_outcome(outcome);
            }
            Tool::Select => {
                let view = self.view_transform();
                let p = view.screen_to_image(position);
                let radius = view.screen_len_to_image(self.config.thresholds.handle_hit_radius);
                let Some((id, index)) = self.vertex_under(p, radius) else {
                    return;
                };
                let Some(points) = self.store.get(id).and_then(|a| a.polygon_points()) else {
                    return;
                };
                match polygon_edit::delete_point(points, index) {
                    Ok(points) => {
                        log::debug!("Deleted point {} of polygon {}", index, id);
                        self.commit_shapes(vec![(id, Shape::Polygon { points })]);
                    }
                    Err(rejection) => self.reject(rejection),
                }
            }
            Tool::Rectangle => {}
        }
    }

    /// Queue a wheel delta at a screen position. Returns `true` if the host
    /// should request a frame.
    pub fn wheel(&mut self, delta: f64, position: Point) -> bool {
        if self.torn_down {
            return false;
        }
        self.viewport.wheel(delta, position)
    }

    pub fn key_down(&mut self, key: Key) {
        match key {
            Key::Escape => self.escape(),
            Key::Space => self.space_held = true,
            Key::Char(c) => {
                if let Some(tool) = self.config.key_bindings.tool_for(c) {
                    if matches!(self.gesture, Gesture::Idle) {
                        self.set_tool(tool);
                    }
                }
            }
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if key == Key::Space {
            self.space_held = false;
        }
    }

    /// A transform handle on rectangle `id` was released.
    pub fn transform_end(&mut self, id: AnnotationId, transform: NodeTransform) {
        if self.torn_down {
            return;
        }
        let Some(ann) = self.store.get(id) else {
            log::debug!("Dropping resize of deleted annotation {}", id);
            return;
        };
        if !matches!(ann.shape, Shape::Rectangle(_)) {
            log::debug!("Ignoring resize of non-rectangle annotation {}", id);
            return;
        }

        let rect = resize_rectangle(transform, self.autofit, self.clip_to());
        if let Some(handle) = self.registry.get(id) {
            self.scene.set_node_rect(handle, rect.scale(self.autofit));
        }
        log::debug!(
            "Resized {} to ({:.1}, {:.1}, {:.1}x{:.1})",
            id,
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        self.memo.invalidate(id);
        self.commit_shapes(vec![(id, Shape::Rectangle(rect))]);
    }

    /// Apply one coalesced pointer position.
    pub(super) fn apply_pointer_move(&mut self, position: Point, now: Instant) {
        self.pointer = Some(position);
        let view = self.view_transform();

        self.gesture = match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => {
                if self.tool.tool() == Tool::Select {
                    let target = self.hit_test(position);
                    self.hover.pointer_over(target, now);
                } else if self.tool.is_drafting() {
                    self.refresh_overlay();
                }
                Gesture::Idle
            }
            Gesture::Pan => {
                if self.viewport.update_pan(position, now).is_some() {
                    self.view_changed();
                }
                Gesture::Pan
            }
            Gesture::RubberBand => {
                self.selection
                    .update_rubber_band(view.screen_to_image(position));
                self.refresh_overlay();
                Gesture::RubberBand
            }
            Gesture::Drag { mut session, shift } => {
                let patches = session.update(position, view);
                self.apply_patches(patches);
                Gesture::Drag { session, shift }
            }
            Gesture::Vertex(mut vertex) => {
                let patch = vertex.update(position, view);
                self.apply_patches(vec![(vertex.id(), patch)]);
                Gesture::Vertex(vertex)
            }
        };
    }

    fn select_pointer_down(&mut self, event: PointerEvent, p: Point, now: Instant) {
        let view = self.view_transform();
        let thresholds = &self.config.thresholds;
        let handle_radius = view.screen_len_to_image(thresholds.handle_hit_radius);
        let outline_tolerance = view.screen_len_to_image(thresholds.outline_hit_tolerance);

        if let Some((id, index)) = self.vertex_under(p, handle_radius) {
            let vertex = self
                .store
                .get(id)
                .and_then(|a| a.polygon_points())
                .and_then(|points| VertexDrag::begin(id, points, index, event.position));
            if let Some(vertex) = vertex {
                self.gesture = Gesture::Vertex(vertex);
                return;
            }
        }

        if event.modifiers.add_point() {
            if let Some(id) = self.outline_under(p, outline_tolerance) {
                self.insert_vertex(id, p);
                return;
            }
        }

        if let Some(id) = self.hit_test(event.position) {
            if let Some(dragged) = self.store.get(id) {
                let selected = self
                    .selection
                    .ids()
                    .iter()
                    .filter_map(|selected| self.store.get(*selected));
                let session = DragSession::begin(dragged, selected, event.position);
                self.gesture = Gesture::Drag {
                    session,
                    shift: event.modifiers.shift,
                };
            }
            return;
        }

        if self.config.behavior.empty_drag_pans && !event.modifiers.shift {
            if self.selection.clear(now) {
                self.needs_sync = true;
            }
            self.viewport.begin_pan(event.position);
            self.gesture = Gesture::Pan;
            return;
        }

        if self
            .selection
            .begin_rubber_band(p, event.modifiers.shift, now)
        {
            self.needs_sync = true;
        }
        self.gesture = Gesture::RubberBand;
        self.refresh_overlay();
    }

    fn draw_click(&mut self, p: Point) {
        if !self.has_active_label() {
            self.reject(Rejection::NoActiveLabel);
            return;
        }
        let clip_to = self.clip_to();
        let outcome = self.tool.click(p, clip_to);
        self.handle_tool_outcome(outcome);
    }

    fn handle_tool_outcome(&mut self, outcome: ToolOutcome) {
        match outcome {
            ToolOutcome::Complete(shape) => self.create_annotation(shape),
            ToolOutcome::Rejected(rejection) => self.reject(rejection),
            ToolOutcome::DraftUpdated | ToolOutcome::Ignored => {}
        }
        self.refresh_overlay();
    }

    /// Cancel whatever is in progress: drafts, rubber band, drags.
    fn escape(&mut self) {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Drag { session, .. } => {
                self.apply_patches(session.revert_patches(self.autofit));
                for id in session.participants() {
                    self.memo.invalidate(id);
                }
                self.needs_sync = true;
                log::debug!("Drag cancelled");
            }
            Gesture::Vertex(vertex) => {
                let patch = vertex.revert_patch(self.autofit);
                self.apply_patches(vec![(vertex.id(), patch)]);
                self.memo.invalidate(vertex.id());
                self.needs_sync = true;
            }
            Gesture::RubberBand => {
                self.selection.cancel_rubber_band();
            }
            Gesture::Pan => self.finish_pan(),
            Gesture::Idle => {}
        }
        self.tool.escape();
        self.refresh_overlay();
    }

    fn finish_pan(&mut self) {
        self.viewport.end_pan();
        // The commit may already have fired while the pan was held
        if !self.viewport.is_gesture_active() {
            let visible = self.visible_image_rect();
            self.visibility.thaw(self.store.list(), visible);
            self.needs_sync = true;
        }
    }

    /// Vertex handle of a selected polygon under `p`, topmost first.
    fn vertex_under(&self, p: Point, radius: f64) -> Option<(AnnotationId, usize)> {
        self.render_set.interactive_ids.iter().rev().find_map(|id| {
            let points = self.store.get(*id)?.polygon_points()?;
            polygon_edit::hit_vertex(points, p, radius).map(|index| (*id, index))
        })
    }

    /// Selected polygon whose outline passes within `tolerance` of `p`.
    fn outline_under(&self, p: Point, tolerance: f64) -> Option<AnnotationId> {
        self.render_set
            .interactive_ids
            .iter()
            .rev()
            .copied()
            .find(|id| {
                self.store
                    .get(*id)
                    .and_then(|a| a.polygon_points())
                    .is_some_and(|points| polygon_edit::hit_outline(points, p, tolerance))
            })
    }

    fn insert_vertex(&mut self, id: AnnotationId, p: Point) {
        let p = match self.clip_to() {
            Some(size) => crate::geometry::clip_point_to_image_bounds(
                p,
                size.width_f64(),
                size.height_f64(),
            ),
            None => p,
        };
        let Some(points) = self.store.get(id).and_then(|a| a.polygon_points()) else {
            return;
        };
        let points = polygon_edit::insert_point(points, p);
        log::debug!("Inserted point into polygon {} ({} points)", id, points.len());
        self.commit_shapes(vec![(id, Shape::Polygon { points })]);
    }
}
