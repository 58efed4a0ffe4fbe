//! Tool state machine and drafting state.
//!
//! Rectangles use a two-click model: the first click fixes one corner, the
//! second click the opposite one. Polygons collect one point per click and
//! close when the user clicks near the first point or double-clicks.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::error::Rejection;
use crate::geometry::{self, Point, Rect};
use crate::model::{ImageSize, Shape, MIN_POLYGON_VERTICES};

/// Trailing points closer than this to their predecessor are dropped when a
/// polygon is closed by double-click (both clicks of the double-click land
/// on the same spot).
const DUPLICATE_POINT_DISTANCE: f64 = 0.5;

/// Annotation tools available on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Select, move and edit existing annotations
    #[default]
    Select,
    /// Draw rectangles
    Rectangle,
    /// Draw polygons
    Polygon,
}

impl Tool {
    /// Get the display name for this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Rectangle => "Rectangle",
            Tool::Polygon => "Polygon",
        }
    }

    /// Check if this tool is a drawing tool (not Select).
    pub fn is_drawing_tool(&self) -> bool {
        !matches!(self, Tool::Select)
    }
}

/// Result of feeding a click to the active tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Nothing happened (select tool, or nothing to close).
    Ignored,
    /// The draft changed.
    DraftUpdated,
    /// A shape is complete; the draft has been cleared.
    Complete(Shape),
    /// The input broke a rule; the draft is unchanged.
    Rejected(Rejection),
}

/// What to draw for the in-progress draft.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftPreview {
    /// Normalized rectangle between the start corner and the cursor.
    Rectangle(Rect),
    /// Placed points plus the rubber line to the cursor.
    Polygon {
        points: Vec<Point>,
        cursor: Point,
        /// Cursor is close enough to the first point to close the polygon.
        closing: bool,
    },
}

/// Active tool plus its ephemeral drafting state.
#[derive(Debug, Clone)]
pub struct ToolState {
    tool: Tool,
    /// First corner of a rectangle being drawn.
    rectangle_start: Option<Point>,
    /// Points of a polygon being drawn.
    polygon_points: Vec<Point>,
    min_rectangle_size: f64,
    polygon_snap_distance: f64,
}

impl ToolState {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            tool: Tool::Select,
            rectangle_start: None,
            polygon_points: Vec::new(),
            min_rectangle_size: thresholds.min_rectangle_size,
            polygon_snap_distance: thresholds.polygon_snap_distance,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools. Any draft is discarded.
    pub fn set_tool(&mut self, tool: Tool) -> bool {
        if self.tool == tool {
            return false;
        }
        self.clear_drafts();
        self.tool = tool;
        log::debug!("Tool changed to {}", tool.name());
        true
    }

    pub fn is_drafting(&self) -> bool {
        self.rectangle_start.is_some() || !self.polygon_points.is_empty()
    }

    pub fn rectangle_start(&self) -> Option<Point> {
        self.rectangle_start
    }

    pub fn polygon_points(&self) -> &[Point] {
        &self.polygon_points
    }

    /// Handle a click at an image-space position.
    ///
    /// `clip_to` is the image size to clip completed shapes into, or `None`
    /// when dimensions are unknown.
    pub fn click(&mut self, p: Point, clip_to: Option<ImageSize>) -> ToolOutcome {
        match self.tool {
            Tool::Select => ToolOutcome::Ignored,
            Tool::Rectangle => self.rectangle_click(p, clip_to),
            Tool::Polygon => self.polygon_click(p, clip_to),
        }
    }

    fn rectangle_click(&mut self, p: Point, clip_to: Option<ImageSize>) -> ToolOutcome {
        let Some(start) = self.rectangle_start else {
            self.rectangle_start = Some(p);
            log::debug!("Rectangle start corner at ({:.1}, {:.1})", p.x, p.y);
            return ToolOutcome::DraftUpdated;
        };

        let width = p.x - start.x;
        let height = p.y - start.y;
        if width.abs() <= self.min_rectangle_size || height.abs() <= self.min_rectangle_size {
            return ToolOutcome::Rejected(Rejection::RectangleTooSmall {
                width: width.abs(),
                height: height.abs(),
                min: self.min_rectangle_size,
            });
        }

        self.rectangle_start = None;
        let mut rect = Rect::from_corners(start, p);
        if let Some(size) = clip_to {
            rect = geometry::clip_rect_to_image_bounds(rect, size.width_f64(), size.height_f64());
        }
        ToolOutcome::Complete(Shape::Rectangle(rect))
    }

    fn polygon_click(&mut self, p: Point, clip_to: Option<ImageSize>) -> ToolOutcome {
        if self.is_near_first_point(p) && self.polygon_points.len() >= MIN_POLYGON_VERTICES {
            return self.close_polygon(clip_to);
        }
        self.polygon_points.push(p);
        log::trace!(
            "Polygon point {} at ({:.1}, {:.1})",
            self.polygon_points.len(),
            p.x,
            p.y
        );
        ToolOutcome::DraftUpdated
    }

    /// Handle a double-click. Closes a polygon draft with at least 3 points.
    pub fn double_click(&mut self, clip_to: Option<ImageSize>) -> ToolOutcome {
        if self.tool != Tool::Polygon || self.polygon_points.is_empty() {
            return ToolOutcome::Ignored;
        }
        while self.polygon_points.len() >= 2 {
            let n = self.polygon_points.len();
            if self.polygon_points[n - 1].distance_to(&self.polygon_points[n - 2])
                < DUPLICATE_POINT_DISTANCE
            {
                self.polygon_points.pop();
            } else {
                break;
            }
        }
        self.close_polygon(clip_to)
    }

    fn close_polygon(&mut self, clip_to: Option<ImageSize>) -> ToolOutcome {
        if self.polygon_points.len() < MIN_POLYGON_VERTICES {
            return ToolOutcome::Rejected(Rejection::PolygonTooFewPoints {
                count: self.polygon_points.len(),
            });
        }
        let mut points = std::mem::take(&mut self.polygon_points);
        if let Some(size) = clip_to {
            points = geometry::clip_polygon_to_image_bounds(
                &points,
                size.width_f64(),
                size.height_f64(),
            );
        }
        log::debug!("Polygon closed with {} points", points.len());
        ToolOutcome::Complete(Shape::Polygon { points })
    }

    fn is_near_first_point(&self, p: Point) -> bool {
        self.polygon_points
            .first()
            .is_some_and(|first| first.distance_to(&p) <= self.polygon_snap_distance)
    }

    /// Cancel the current draft without changing tools.
    pub fn escape(&mut self) -> bool {
        let had_draft = self.is_drafting();
        self.clear_drafts();
        if had_draft {
            log::debug!("Draft cancelled");
        }
        had_draft
    }

    /// Drop all drafting state, e.g. on image change.
    pub fn clear_drafts(&mut self) {
        self.rectangle_start = None;
        self.polygon_points.clear();
    }

    /// Preview geometry for the current draft with the cursor at `cursor`.
    pub fn preview(&self, cursor: Point) -> Option<DraftPreview> {
        match self.tool {
            Tool::Select => None,
            Tool::Rectangle => self
                .rectangle_start
                .map(|start| DraftPreview::Rectangle(Rect::from_corners(start, cursor))),
            Tool::Polygon => {
                if self.polygon_points.is_empty() {
                    return None;
                }
                Some(DraftPreview::Polygon {
                    points: self.polygon_points.clone(),
                    cursor,
                    closing: self.polygon_points.len() >= MIN_POLYGON_VERTICES
                        && self.is_near_first_point(cursor),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tool: Tool) -> ToolState {
        let mut s = ToolState::new(&Thresholds::default());
        s.set_tool(tool);
        s
    }

    const IMAGE: Option<ImageSize> = Some(ImageSize {
        width: 800,
        height: 600,
    });

    #[test]
    fn test_rectangle_two_clicks() {
        let mut s = state(Tool::Rectangle);
        assert_eq!(s.click(Point::new(10.0, 10.0), IMAGE), ToolOutcome::DraftUpdated);
        assert_eq!(
            s.click(Point::new(60.0, 40.0), IMAGE),
            ToolOutcome::Complete(Shape::Rectangle(Rect::new(10.0, 10.0, 50.0, 30.0)))
        );
        assert!(!s.is_drafting());
    }

    #[test]
    fn test_rectangle_normalizes_negative_extent() {
        let mut s = state(Tool::Rectangle);
        s.click(Point::new(60.0, 40.0), IMAGE);
        assert_eq!(
            s.click(Point::new(10.0, 10.0), IMAGE),
            ToolOutcome::Complete(Shape::Rectangle(Rect::new(10.0, 10.0, 50.0, 30.0)))
        );
    }

    #[test]
    fn test_rectangle_minimum_size_keeps_draft() {
        for (dx, dy) in [(5.0, 50.0), (50.0, 5.0), (-3.0, 40.0), (0.0, 0.0), (-5.0, -5.0)] {
            let mut s = state(Tool::Rectangle);
            s.click(Point::new(100.0, 100.0), IMAGE);
            let outcome = s.click(Point::new(100.0 + dx, 100.0 + dy), IMAGE);
            assert!(
                matches!(outcome, ToolOutcome::Rejected(Rejection::RectangleTooSmall { .. })),
                "({}, {}) should be rejected",
                dx,
                dy
            );
            assert_eq!(s.rectangle_start(), Some(Point::new(100.0, 100.0)));
        }
    }

    #[test]
    fn test_rectangle_clipped_when_size_known() {
        let mut s = state(Tool::Rectangle);
        s.click(Point::new(780.0, -20.0), IMAGE);
        assert_eq!(
            s.click(Point::new(900.0, 50.0), IMAGE),
            ToolOutcome::Complete(Shape::Rectangle(Rect::new(780.0, 0.0, 20.0, 50.0)))
        );

        // Unknown dimensions: unclamped
        s.click(Point::new(780.0, -20.0), None);
        assert_eq!(
            s.click(Point::new(900.0, 50.0), None),
            ToolOutcome::Complete(Shape::Rectangle(Rect::new(780.0, -20.0, 120.0, 70.0)))
        );
    }

    #[test]
    fn test_polygon_snap_closes() {
        let mut s = state(Tool::Polygon);
        s.click(Point::new(0.0, 0.0), IMAGE);
        s.click(Point::new(100.0, 0.0), IMAGE);
        s.click(Point::new(100.0, 100.0), IMAGE);
        let outcome = s.click(Point::new(4.0, 6.0), IMAGE);
        assert_eq!(
            outcome,
            ToolOutcome::Complete(Shape::Polygon {
                points: vec![
                    Point::new(0.0, 0.0),
                    Point::new(100.0, 0.0),
                    Point::new(100.0, 100.0)
                ]
            })
        );
        assert!(s.polygon_points().is_empty());
    }

    #[test]
    fn test_polygon_snap_needs_three_points() {
        let mut s = state(Tool::Polygon);
        s.click(Point::new(0.0, 0.0), IMAGE);
        s.click(Point::new(100.0, 0.0), IMAGE);
        // Near the first point but only two points placed: appended
        assert_eq!(s.click(Point::new(2.0, 2.0), IMAGE), ToolOutcome::DraftUpdated);
        assert_eq!(s.polygon_points().len(), 3);
    }

    #[test]
    fn test_polygon_double_click_close_and_floor() {
        let mut s = state(Tool::Polygon);
        s.click(Point::new(10.0, 10.0), IMAGE);
        s.click(Point::new(50.0, 10.0), IMAGE);
        // Double-click on the second point: two clicks at the same spot
        s.click(Point::new(50.0, 10.0), IMAGE);
        assert_eq!(
            s.double_click(IMAGE),
            ToolOutcome::Rejected(Rejection::PolygonTooFewPoints { count: 2 })
        );
        assert_eq!(s.polygon_points().len(), 2);

        s.click(Point::new(50.0, 50.0), IMAGE);
        s.click(Point::new(50.0, 50.0), IMAGE);
        match s.double_click(IMAGE) {
            ToolOutcome::Complete(Shape::Polygon { points }) => assert_eq!(points.len(), 3),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_polygon_clipped_on_close() {
        let mut s = state(Tool::Polygon);
        s.click(Point::new(-10.0, 10.0), IMAGE);
        s.click(Point::new(900.0, 10.0), IMAGE);
        s.click(Point::new(400.0, 700.0), IMAGE);
        match s.double_click(IMAGE) {
            ToolOutcome::Complete(Shape::Polygon { points }) => assert_eq!(
                points,
                vec![Point::new(0.0, 10.0), Point::new(800.0, 10.0), Point::new(400.0, 600.0)]
            ),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_escape_and_tool_switch_discard_drafts() {
        let mut s = state(Tool::Polygon);
        s.click(Point::new(1.0, 1.0), IMAGE);
        assert!(s.escape());
        assert_eq!(s.tool(), Tool::Polygon);
        assert!(!s.escape());

        s.click(Point::new(1.0, 1.0), IMAGE);
        s.set_tool(Tool::Rectangle);
        assert!(!s.is_drafting());
    }

    #[test]
    fn test_select_tool_ignores_clicks() {
        let mut s = state(Tool::Select);
        assert_eq!(s.click(Point::new(1.0, 1.0), IMAGE), ToolOutcome::Ignored);
        assert_eq!(s.double_click(IMAGE), ToolOutcome::Ignored);
    }

    #[test]
    fn test_preview() {
        let mut s = state(Tool::Polygon);
        for p in [Point::new(0.0, 0.0), Point::new(50.0, 0.0), Point::new(50.0, 50.0)] {
            s.click(p, IMAGE);
        }
        match s.preview(Point::new(3.0, 3.0)) {
            Some(DraftPreview::Polygon { closing, .. }) => assert!(closing),
            other => panic!("unexpected preview {:?}", other),
        }

        let mut r = state(Tool::Rectangle);
        assert_eq!(r.preview(Point::new(1.0, 1.0)), None);
        r.click(Point::new(10.0, 10.0), IMAGE);
        assert_eq!(
            r.preview(Point::new(0.0, 30.0)),
            Some(DraftPreview::Rectangle(Rect::new(0.0, 10.0, 10.0, 20.0)))
        );
    }
}
