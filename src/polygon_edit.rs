//! Point-level editing of committed polygons.
//!
//! Polygons have no resize handles. Instead each vertex has a handle that can
//! be dragged or double-clicked away, and new vertices are inserted by
//! clicking the outline with the add-point modifier held.

use crate::drag::NodePatch;
use crate::error::Rejection;
use crate::geometry::{self, Point, ViewTransform};
use crate::model::{AnnotationId, ImageSize, MIN_POLYGON_VERTICES};

/// Index of the vertex whose handle is under `p`, if any.
///
/// `radius` is in the same space as the points. When handles overlap, the
/// nearest one wins.
pub fn hit_vertex(points: &[Point], p: Point, radius: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .map(|(i, v)| (i, v.distance_to(&p)))
        .filter(|(_, d)| *d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Whether `p` lies within `tolerance` of any edge of the closed polygon.
pub fn hit_outline(points: &[Point], p: Point, tolerance: f64) -> bool {
    geometry::nearest_edge(points, p).is_some_and(|(_, d)| d <= tolerance)
}

/// Insert `p` into the polygon right after the start of the edge nearest to
/// it.
pub fn insert_point(points: &[Point], p: Point) -> Vec<Point> {
    let mut next = points.to_vec();
    match geometry::nearest_edge(points, p) {
        Some((edge, _)) => next.insert(edge + 1, p),
        None => next.push(p),
    }
    next
}

/// Remove the vertex at `index`.
///
/// Refused when the polygon is already a triangle.
pub fn delete_point(points: &[Point], index: usize) -> Result<Vec<Point>, Rejection> {
    if points.len() <= MIN_POLYGON_VERTICES {
        return Err(Rejection::PolygonPointFloor);
    }
    let mut next = points.to_vec();
    if index < next.len() {
        next.remove(index);
    }
    Ok(next)
}

/// Drag of a single polygon vertex handle.
#[derive(Debug, Clone)]
pub struct VertexDrag {
    id: AnnotationId,
    index: usize,
    /// The polygon's points when the drag started.
    snapshot: Vec<Point>,
    /// Screen position of pointer-down.
    pointer_start: Point,
    /// Current image-space position of the dragged vertex.
    current: Point,
}

impl VertexDrag {
    pub fn begin(id: AnnotationId, points: &[Point], index: usize, pointer: Point) -> Option<Self> {
        let current = *points.get(index)?;
        log::debug!("Vertex drag started on {} point {}", id, index);
        Some(Self {
            id,
            index,
            snapshot: points.to_vec(),
            pointer_start: pointer,
            current,
        })
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pointer_start(&self) -> Point {
        self.pointer_start
    }

    /// Follow the pointer and return the polygon's live render-space points.
    pub fn update(&mut self, pointer: Point, view: ViewTransform) -> NodePatch {
        let render_dx = (pointer.x - self.pointer_start.x) / view.zoom;
        let render_dy = (pointer.y - self.pointer_start.y) / view.zoom;
        let origin = self.snapshot[self.index];
        let handle = Point::new(
            origin.x * view.autofit + render_dx,
            origin.y * view.autofit + render_dy,
        );
        self.current = handle.scale(1.0 / view.autofit);
        NodePatch::Points(
            self.points_with(self.current)
                .iter()
                .map(|p| p.scale(view.autofit))
                .collect(),
        )
    }

    /// Patch that restores the polygon as it was at the start of the drag.
    pub fn revert_patch(&self, autofit: f64) -> NodePatch {
        NodePatch::Points(self.snapshot.iter().map(|p| p.scale(autofit)).collect())
    }

    /// Final points: only the dragged vertex moves, and only it is clipped.
    pub fn finish(&self, clip_to: Option<ImageSize>) -> Vec<Point> {
        let moved = match clip_to {
            Some(size) => geometry::clip_point_to_image_bounds(
                self.current,
                size.width_f64(),
                size.height_f64(),
            ),
            None => self.current,
        };
        self.points_with(moved)
    }

    fn points_with(&self, vertex: Point) -> Vec<Point> {
        let mut points = self.snapshot.clone();
        points[self.index] = vertex;
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]
    }

    fn triangle() -> Vec<Point> {
        vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 10.0)]
    }

    #[test]
    fn test_insert_after_nearest_edge_start() {
        let pts = insert_point(&square(), Point::new(101.0, 50.0));
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[2], Point::new(101.0, 50.0));

        // Closing edge (last -> first)
        let pts = insert_point(&square(), Point::new(-1.0, 40.0));
        assert_eq!(pts[4], Point::new(-1.0, 40.0));
    }

    #[test]
    fn test_delete_respects_floor() {
        assert_eq!(delete_point(&triangle(), 0), Err(Rejection::PolygonPointFloor));

        let pts = delete_point(&square(), 1).unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[1], Point::new(100.0, 100.0));
    }

    #[test]
    fn test_hit_vertex_prefers_nearest() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(50.0, 50.0)];
        assert_eq!(hit_vertex(&pts, Point::new(3.0, 0.0), 6.0), Some(1));
        assert_eq!(hit_vertex(&pts, Point::new(30.0, 30.0), 6.0), None);
    }

    #[test]
    fn test_hit_outline() {
        assert!(hit_outline(&square(), Point::new(50.0, 3.0), 5.0));
        assert!(!hit_outline(&square(), Point::new(50.0, 50.0), 5.0));
    }

    #[test]
    fn test_vertex_drag_moves_single_point() {
        let mut drag = VertexDrag::begin(7, &square(), 2, Point::new(0.0, 0.0)).unwrap();
        let view = ViewTransform::new(2.0, Point::new(10.0, 10.0), 0.5);
        // 10 screen px at zoom 2 = 5 render px = 10 image px
        let patch = drag.update(Point::new(10.0, -10.0), view);
        match patch {
            NodePatch::Points(points) => assert_eq!(points[2], Point::new(55.0, 45.0)),
            other => panic!("unexpected patch {:?}", other),
        }

        let pts = drag.finish(None);
        assert_eq!(pts[2], Point::new(110.0, 90.0));
        assert_eq!(pts[0], Point::new(0.0, 0.0));
        assert_eq!(pts[1], Point::new(100.0, 0.0));
    }

    #[test]
    fn test_vertex_drag_clips_only_moved_point() {
        let pts = vec![Point::new(-5.0, 0.0), Point::new(50.0, 0.0), Point::new(25.0, 40.0)];
        let mut drag = VertexDrag::begin(1, &pts, 2, Point::ORIGIN).unwrap();
        drag.update(Point::new(0.0, 100.0), ViewTransform::identity());
        let done = drag.finish(Some(ImageSize::new(100, 100)));
        assert_eq!(done[2], Point::new(25.0, 100.0));
        assert_eq!(done[0], Point::new(-5.0, 0.0));
    }

    #[test]
    fn test_vertex_drag_rejects_bad_index() {
        assert!(VertexDrag::begin(1, &triangle(), 3, Point::ORIGIN).is_none());
    }
}
