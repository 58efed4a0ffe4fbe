//! Pure geometry for the canvas engine.
//!
//! Everything in here is stateless: coordinate transforms between image and
//! screen space, bounding boxes, clipping to image bounds, distance queries
//! and hit tests.
//!
//! Three coordinate spaces are in play:
//! - **image space**: pixels of the loaded raster, where annotations live
//! - **render space**: image space multiplied by the autofit scale; this is
//!   what scene nodes are positioned in
//! - **screen space**: render space multiplied by zoom and offset by pan

use serde::{Deserialize, Serialize};

use crate::model::Shape;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn scale(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// An axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a normalized rectangle spanning two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        Self {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width: (p1.x - p2.x).abs(),
            height: (p1.y - p2.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Grow the rectangle by `amount` on every side.
    pub fn padded(&self, amount: f64) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

/// The combined image→screen mapping: `screen = image * scale + pan` where
/// `scale = autofit * zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub zoom: f64,
    pub pan: Point,
    pub autofit: f64,
}

impl ViewTransform {
    pub fn new(zoom: f64, pan: Point, autofit: f64) -> Self {
        Self { zoom, pan, autofit }
    }

    pub fn identity() -> Self {
        Self::new(1.0, Point::ORIGIN, 1.0)
    }

    /// Total multiplier from image pixels to screen pixels.
    pub fn scale(&self) -> f64 {
        self.autofit * self.zoom
    }

    pub fn image_to_screen(&self, p: Point) -> Point {
        image_to_screen(p, self.zoom, self.pan, self.autofit)
    }

    pub fn screen_to_image(&self, p: Point) -> Point {
        screen_to_image(p, self.zoom, self.pan, self.autofit)
    }

    /// Convert a length measured in screen pixels into image pixels.
    pub fn screen_len_to_image(&self, len: f64) -> f64 {
        len / self.scale()
    }

    /// The image-space rectangle visible through a canvas of the given size.
    pub fn visible_image_rect(&self, canvas_width: f64, canvas_height: f64) -> Rect {
        let top_left = self.screen_to_image(Point::ORIGIN);
        let bottom_right = self.screen_to_image(Point::new(canvas_width, canvas_height));
        Rect::from_corners(top_left, bottom_right)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// `screen = p * autofit * zoom + pan`
pub fn image_to_screen(p: Point, zoom: f64, pan: Point, autofit: f64) -> Point {
    let scale = autofit * zoom;
    Point::new(p.x * scale + pan.x, p.y * scale + pan.y)
}

/// Inverse of [`image_to_screen`].
pub fn screen_to_image(p: Point, zoom: f64, pan: Point, autofit: f64) -> Point {
    let scale = autofit * zoom;
    Point::new((p.x - pan.x) / scale, (p.y - pan.y) / scale)
}

/// Axis-aligned bounds over a set of points. Empty input yields a zero-sized
/// box at the origin.
pub fn bounds_of_points(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::default();
    };

    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x;
    let mut max_y = first.y;

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Bounding box of a shape in image space.
pub fn bounds_of(shape: &Shape) -> Rect {
    match shape {
        Shape::Rectangle(rect) => *rect,
        Shape::Polygon { points } => bounds_of_points(points),
        Shape::Point(p) => Rect::new(p.x, p.y, 0.0, 0.0),
    }
}

/// Clip a rectangle to `[0, img_w] x [0, img_h]`.
///
/// Each edge is clipped independently. The low side is clamped to zero and
/// the size shrinks by the amount cut off; then the size shrinks again if the
/// far edge overhangs. The result is never smaller than 1x1.
pub fn clip_rect_to_image_bounds(rect: Rect, img_w: f64, img_h: f64) -> Rect {
    let (x, width) = clip_span(rect.x, rect.width, img_w);
    let (y, height) = clip_span(rect.y, rect.height, img_h);
    Rect::new(x, y, width, height)
}

fn clip_span(start: f64, len: f64, limit: f64) -> (f64, f64) {
    let clipped_start = start.max(0.0);
    let mut clipped_len = len - (clipped_start - start);
    if clipped_start + clipped_len > limit {
        clipped_len = limit - clipped_start;
    }
    (clipped_start, clipped_len.max(1.0))
}

/// Clamp a point into the image, each axis independently.
pub fn clip_point_to_image_bounds(p: Point, img_w: f64, img_h: f64) -> Point {
    Point::new(p.x.clamp(0.0, img_w), p.y.clamp(0.0, img_h))
}

/// Clamp every polygon vertex into the image. This can fold edges onto the
/// boundary and introduce self-intersections there.
pub fn clip_polygon_to_image_bounds(points: &[Point], img_w: f64, img_h: f64) -> Vec<Point> {
    points
        .iter()
        .map(|p| clip_point_to_image_bounds(*p, img_w, img_h))
        .collect()
}

/// Distance from `p` to the segment `a`-`b`.
pub fn point_to_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance_to(&a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    let projection = Point::new(a.x + t * abx, a.y + t * aby);
    p.distance_to(&projection)
}

/// Axis-aligned overlap test. Touching edges count as overlapping.
pub fn intersects(a: &Rect, b: &Rect) -> bool {
    a.x <= b.right() && a.right() >= b.x && a.y <= b.bottom() && a.bottom() >= b.y
}

/// Index of the polygon edge `(i, i+1 mod n)` nearest to `p`, with its distance.
pub fn nearest_edge(points: &[Point], p: Point) -> Option<(usize, f64)> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    (0..n)
        .map(|i| (i, point_to_segment_distance(p, points[i], points[(i + 1) % n])))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Point-in-polygon test using ray casting.
pub fn polygon_contains(points: &[Point], p: &Point) -> bool {
    if points.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let vi = &points[i];
        let vj = &points[j];
        if ((vi.y > p.y) != (vj.y > p.y))
            && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether `p` hits `shape`. Rectangles use inclusive containment, polygons
/// ray casting, and points a radius around the marker.
pub fn hit_test(shape: &Shape, p: Point, point_radius: f64) -> bool {
    match shape {
        Shape::Rectangle(rect) => rect.contains(&p),
        Shape::Polygon { points } => polygon_contains(points, &p),
        Shape::Point(marker) => marker.distance_to(&p) <= point_radius,
    }
}
