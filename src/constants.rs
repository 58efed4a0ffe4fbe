//! Default thresholds and durations for the canvas engine.
//!
//! These are the values [`crate::config::EngineConfig`] starts from.

/// Zoom limits and wheel response.
pub mod zoom {
    /// Minimum zoom level
    pub const MIN: f64 = 0.1;
    /// Maximum zoom level
    pub const MAX: f64 = 5.0;
    /// Multiplicative step for zoom in/out buttons
    pub const STEP: f64 = 1.2;
    /// Each raw wheel delta is clamped to this magnitude before accumulating
    pub const WHEEL_DELTA_CLAMP: f64 = 8.0;
    /// The accumulated per-frame wheel batch is clamped to this magnitude
    pub const WHEEL_BATCH_CLAMP: f64 = 24.0;
    /// Base of the geometric wheel response `base^(-delta * sensitivity)`
    pub const WHEEL_BASE: f64 = 2.0;
    /// Exponent scale of the wheel response
    pub const WHEEL_SENSITIVITY: f64 = 0.01;
}

/// Drawing and editing thresholds.
pub mod drawing {
    /// Rectangles whose width or height is at or below this (image px) are rejected
    pub const MIN_RECTANGLE_SIZE: f64 = 5.0;
    /// Clicking within this distance (image px) of the first point closes a polygon
    pub const POLYGON_SNAP_DISTANCE: f64 = 10.0;
    /// Rubber bands must exceed this size (image px) in one dimension to select
    pub const RUBBER_BAND_MIN_SIZE: f64 = 5.0;
    /// Pointer displacement (screen px) below which a gesture is a click
    pub const CLICK_DRAG_THRESHOLD: f64 = 3.0;
    /// Hit radius of polygon vertex handles (screen px)
    pub const HANDLE_HIT_RADIUS: f64 = 6.0;
    /// Distance from a polygon edge (screen px) that counts as hitting the outline
    pub const OUTLINE_HIT_TOLERANCE: f64 = 5.0;
    /// Hit radius of point annotations (screen px)
    pub const POINT_HIT_RADIUS: f64 = 5.0;
}

/// Rendering performance knobs.
pub mod render {
    /// Padding (image px) added to annotation bounds before viewport culling
    pub const CULL_PADDING: f64 = 50.0;
    /// Hover detection is disabled above this many eligible annotations
    pub const HOVER_DISABLE_THRESHOLD: usize = 300;
}

/// Debounce windows in milliseconds.
pub mod timing {
    /// Idle time before a zoom/pan gesture is committed
    pub const VIEWPORT_COMMIT_MS: u64 = 150;
    /// Idle time before a selection change is committed
    pub const SELECTION_COMMIT_MS: u64 = 50;
    /// Delay before a hover tooltip is shown
    pub const HOVER_SHOW_MS: u64 = 150;
    /// Delay before a hover tooltip is hidden
    pub const HOVER_HIDE_MS: u64 = 100;
}
