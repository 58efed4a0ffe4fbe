//! Zoom/pan viewport controller.
//!
//! The controller keeps two copies of the viewport:
//! - a **live** viewport, written synchronously on every wheel/pointer tick
//!   and pushed straight to the scene
//! - a **committed** viewport, only updated once input has been idle for the
//!   commit window; this is what the surrounding application observes
//!
//! The committed value is always the most recent live sample, never an
//! average of the samples in between.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use web_time::Instant;

use crate::config::Thresholds;
use crate::geometry::{Point, ViewTransform};
use crate::model::ImageSize;
use crate::timing::{Debouncer, FrameGate};

/// User-controlled zoom and pan. `pan` is in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    pub pan: Point,
}

impl Viewport {
    pub fn new(zoom: f64, pan: Point) -> Self {
        Self { zoom, pan }
    }

    /// Create an identity viewport (zoom=1, no pan).
    pub fn identity() -> Self {
        Self::new(1.0, Point::ORIGIN)
    }

    /// Combine with the autofit scale into a full image→screen transform.
    pub fn transform(&self, autofit: f64) -> ViewTransform {
        ViewTransform::new(self.zoom, self.pan, autofit)
    }

    /// Keep the render-space point under `pointer` fixed while changing zoom.
    pub fn zoom_toward(&self, pointer: Point, new_zoom: f64) -> Viewport {
        let anchor_x = (pointer.x - self.pan.x) / self.zoom;
        let anchor_y = (pointer.y - self.pan.y) / self.zoom;
        Viewport {
            zoom: new_zoom,
            pan: Point::new(pointer.x - anchor_x * new_zoom, pointer.y - anchor_y * new_zoom),
        }
    }

    /// Apply a pan delta to the viewport.
    pub fn pan_by(&self, dx: f64, dy: f64) -> Viewport {
        Viewport {
            zoom: self.zoom,
            pan: self.pan.offset(dx, dy),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}

/// Scale at which the whole image fits the container at zoom 1.
///
/// Returns 1.0 when either side is degenerate.
pub fn autofit_scale(container_width: f64, container_height: f64, image: ImageSize) -> f64 {
    if image.width == 0 || image.height == 0 || container_width <= 0.0 || container_height <= 0.0 {
        return 1.0;
    }
    (container_width / image.width_f64()).min(container_height / image.height_f64())
}

/// Wheel input accumulated between two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WheelBatch {
    delta: f64,
    pointer: Point,
}

/// An in-progress pan drag.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PanDrag {
    start_pointer: Point,
    start_pan: Point,
}

/// Owns zoom and pan, and splits continuous updates from committed state.
#[derive(Debug, Clone)]
pub struct ViewportController {
    /// Updated on every input tick; read by the paint step.
    live: Viewport,
    /// Updated only when a gesture settles.
    committed: Viewport,
    commit: Debouncer<Viewport>,
    wheel: FrameGate<WheelBatch>,
    pan_drag: Option<PanDrag>,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    wheel_delta_clamp: f64,
    wheel_batch_clamp: f64,
    wheel_base: f64,
    wheel_sensitivity: f64,
}

impl ViewportController {
    pub fn new(thresholds: &Thresholds, commit_delay: Duration) -> Self {
        Self {
            live: Viewport::identity(),
            committed: Viewport::identity(),
            commit: Debouncer::new(commit_delay),
            wheel: FrameGate::new(),
            pan_drag: None,
            min_zoom: thresholds.min_zoom,
            max_zoom: thresholds.max_zoom,
            zoom_step: thresholds.zoom_step,
            wheel_delta_clamp: thresholds.wheel_delta_clamp,
            wheel_batch_clamp: thresholds.wheel_batch_clamp,
            wheel_base: thresholds.wheel_base,
            wheel_sensitivity: thresholds.wheel_sensitivity,
        }
    }

    pub fn live(&self) -> Viewport {
        self.live
    }

    pub fn committed(&self) -> Viewport {
        self.committed
    }

    /// True while a zoom or pan gesture has not yet settled.
    pub fn is_gesture_active(&self) -> bool {
        self.pan_drag.is_some() || self.commit.is_pending() || self.wheel.is_pending()
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Queue a raw wheel delta. Returns `true` if a frame should be requested.
    pub fn wheel(&mut self, delta: f64, pointer: Point) -> bool {
        let clamped = delta.clamp(-self.wheel_delta_clamp, self.wheel_delta_clamp);
        self.wheel.merge(
            WheelBatch {
                delta: 0.0,
                pointer,
            },
            |batch| {
                batch.delta += clamped;
                batch.pointer = pointer;
            },
        )
    }

    /// Apply the wheel batch accumulated since the last frame.
    ///
    /// Returns the new live viewport, or `None` if nothing changed.
    pub fn apply_wheel_batch(&mut self, now: Instant) -> Option<Viewport> {
        let batch = self.wheel.take()?;
        let delta = batch
            .delta
            .clamp(-self.wheel_batch_clamp, self.wheel_batch_clamp);
        let factor = self.wheel_base.powf(-delta * self.wheel_sensitivity);
        self.zoom_to(self.live.zoom * factor, batch.pointer, now)
    }

    /// Zoom to `zoom` keeping the point under `pointer` fixed.
    ///
    /// The requested zoom is clamped; if the clamped value equals the current
    /// zoom the call is a no-op and returns `None`.
    pub fn zoom_to(&mut self, zoom: f64, pointer: Point, now: Instant) -> Option<Viewport> {
        let new_zoom = self.clamp_zoom(zoom);
        if new_zoom == self.live.zoom {
            log::trace!("Zoom unchanged at {:.3}x", new_zoom);
            return None;
        }
        self.live = self.live.zoom_toward(pointer, new_zoom);
        self.commit.push(self.live, now);
        log::trace!(
            "Zoom-to-cursor: {:.3}x at ({:.1}, {:.1}), pan: ({:.1}, {:.1})",
            self.live.zoom,
            pointer.x,
            pointer.y,
            self.live.pan.x,
            self.live.pan.y
        );
        Some(self.live)
    }

    /// Zoom in one step around `center` (usually the canvas center).
    pub fn zoom_in(&mut self, center: Point, now: Instant) -> Option<Viewport> {
        self.zoom_to(self.live.zoom * self.zoom_step, center, now)
    }

    /// Zoom out one step around `center`.
    pub fn zoom_out(&mut self, center: Point, now: Instant) -> Option<Viewport> {
        self.zoom_to(self.live.zoom / self.zoom_step, center, now)
    }

    /// Start a pan drag at the given screen position.
    pub fn begin_pan(&mut self, pointer: Point) {
        self.pan_drag = Some(PanDrag {
            start_pointer: pointer,
            start_pan: self.live.pan,
        });
        log::debug!("Pan drag started at ({:.1}, {:.1})", pointer.x, pointer.y);
    }

    /// Move the pan drag. Pan is set from the displacement since drag start.
    pub fn update_pan(&mut self, pointer: Point, now: Instant) -> Option<Viewport> {
        let drag = self.pan_drag?;
        let pan = Point::new(
            drag.start_pan.x + pointer.x - drag.start_pointer.x,
            drag.start_pan.y + pointer.y - drag.start_pointer.y,
        );
        if pan == self.live.pan {
            return None;
        }
        self.live.pan = pan;
        self.commit.push(self.live, now);
        Some(self.live)
    }

    pub fn end_pan(&mut self) {
        if self.pan_drag.take().is_some() {
            log::debug!(
                "Pan drag ended at pan ({:.1}, {:.1})",
                self.live.pan.x,
                self.live.pan.y
            );
        }
    }

    /// Reset to zoom 1 and no pan.
    pub fn reset(&mut self, now: Instant) -> Viewport {
        self.pan_drag = None;
        self.wheel.cancel();
        self.live = Viewport::identity();
        self.commit.push(self.live, now);
        log::debug!("View reset");
        self.live
    }

    /// Commit the live viewport if input has been idle long enough.
    pub fn poll_commit(&mut self, now: Instant) -> Option<Viewport> {
        if self.pan_drag.is_some() {
            return None;
        }
        let viewport = self.commit.poll(now)?;
        self.committed = viewport;
        log::debug!(
            "Viewport committed: {:.3}x, pan ({:.1}, {:.1})",
            viewport.zoom,
            viewport.pan.x,
            viewport.pan.y
        );
        Some(viewport)
    }

    /// Replace both layers, e.g. when the application restores a saved view.
    pub fn set(&mut self, viewport: Viewport) {
        let viewport = Viewport::new(self.clamp_zoom(viewport.zoom), viewport.pan);
        self.commit.cancel();
        self.live = viewport;
        self.committed = viewport;
    }

    /// Drop all pending work. Used on teardown and image change.
    pub fn cancel(&mut self) {
        self.commit.cancel();
        self.wheel.cancel();
        self.pan_drag = None;
    }
}
