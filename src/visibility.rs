//! Render eligibility, viewport culling and the static/interactive split.
//!
//! An annotation is *eligible* when its shape type is shown, its own
//! `is_visible` flag is set and its label still exists. Of those, only the
//! ones whose padded bounds intersect the visible image rectangle are drawn,
//! plus every selected annotation regardless of where it is.
//!
//! Culling is the expensive part, so the culled set is frozen while a zoom or
//! pan gesture is in flight and recomputed once the gesture settles.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::geometry::{self, Rect};
use crate::model::{Annotation, AnnotationId, ShapeKind};
use crate::store::LabelRegistry;

/// Per-type visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityFilter {
    pub show_rectangles: bool,
    pub show_polygons: bool,
    pub show_points: bool,
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self {
            show_rectangles: true,
            show_polygons: true,
            show_points: true,
        }
    }
}

impl VisibilityFilter {
    pub fn shows(&self, kind: ShapeKind) -> bool {
        match kind {
            ShapeKind::Rectangle => self.show_rectangles,
            ShapeKind::Polygon => self.show_polygons,
            ShapeKind::Point => self.show_points,
        }
    }

    pub fn set(&mut self, kind: ShapeKind, visible: bool) {
        match kind {
            ShapeKind::Rectangle => self.show_rectangles = visible,
            ShapeKind::Polygon => self.show_polygons = visible,
            ShapeKind::Point => self.show_points = visible,
        }
    }

    /// Type shown, annotation visible, label present.
    pub fn is_eligible(&self, annotation: &Annotation, labels: &impl LabelRegistry) -> bool {
        self.shows(annotation.kind())
            && annotation.is_visible
            && labels.get(annotation.label_id).is_some()
    }
}

/// Ids of the annotations to draw, in paint order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSet {
    /// Unselected annotations. Drawn once, changes rarely.
    pub static_ids: Vec<AnnotationId>,
    /// Selected annotations, drawn above the static layer with handles.
    pub interactive_ids: Vec<AnnotationId>,
}

impl RenderSet {
    pub fn len(&self) -> usize {
        self.static_ids.len() + self.interactive_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.static_ids.is_empty() && self.interactive_ids.is_empty()
    }

    /// All ids, bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = AnnotationId> + '_ {
        self.static_ids
            .iter()
            .chain(self.interactive_ids.iter())
            .copied()
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.static_ids.contains(&id) || self.interactive_ids.contains(&id)
    }
}

/// Ids of annotations whose padded bounds intersect `visible`.
pub fn cull<'a>(
    annotations: impl IntoIterator<Item = &'a Annotation>,
    visible: Rect,
    padding: f64,
) -> HashSet<AnnotationId> {
    annotations
        .into_iter()
        .filter(|a| geometry::intersects(&a.bounds().padded(padding), &visible))
        .map(|a| a.id)
        .collect()
}

/// Eligibility filter plus the cached culled set.
#[derive(Debug, Clone)]
pub struct VisibilityLayer {
    filter: VisibilityFilter,
    padding: f64,
    /// Ids inside the visible rectangle at the last recompute.
    culled: HashSet<AnnotationId>,
    /// A gesture is in flight; `recompute` is skipped.
    frozen: bool,
}

impl VisibilityLayer {
    pub fn new(padding: f64) -> Self {
        Self {
            filter: VisibilityFilter::default(),
            padding,
            culled: HashSet::new(),
            frozen: false,
        }
    }

    pub fn filter(&self) -> VisibilityFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: VisibilityFilter) {
        self.filter = filter;
    }

    /// Stop recomputing until [`thaw`](Self::thaw).
    pub fn freeze(&mut self) {
        if !self.frozen {
            log::trace!("Culling frozen with {} annotation(s)", self.culled.len());
        }
        self.frozen = true;
    }

    /// Unfreeze and recompute once against the settled view.
    pub fn thaw(&mut self, annotations: &[Annotation], visible: Rect) {
        self.frozen = false;
        self.recompute(annotations, visible);
    }

    /// Recompute the culled set, unless frozen.
    pub fn recompute(&mut self, annotations: &[Annotation], visible: Rect) {
        if self.frozen {
            return;
        }
        self.culled = cull(annotations, visible, self.padding);
        log::trace!(
            "Culled {} of {} annotation(s) into view",
            self.culled.len(),
            annotations.len()
        );
    }

    /// Make a freshly created annotation drawable while culling is frozen.
    pub fn note_created(&mut self, id: AnnotationId) {
        self.culled.insert(id);
    }

    /// Build the render set from the live annotation list.
    ///
    /// The cached culled set is only consulted for membership, so ids that
    /// were deleted since it was computed simply drop out.
    pub fn render_set(
        &self,
        annotations: &[Annotation],
        labels: &impl LabelRegistry,
        selected: &BTreeSet<AnnotationId>,
    ) -> RenderSet {
        let mut set = RenderSet::default();
        for ann in annotations {
            if !self.filter.is_eligible(ann, labels) {
                continue;
            }
            if selected.contains(&ann.id) {
                set.interactive_ids.push(ann.id);
            } else if self.culled.contains(&ann.id) {
                set.static_ids.push(ann.id);
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::model::{Label, Shape};
    use crate::store::LabelSet;

    fn rect(id: AnnotationId, x: f64, y: f64) -> Annotation {
        Annotation::new(id, 1, 1, Shape::Rectangle(Rect::new(x, y, 10.0, 10.0)))
    }

    fn labels() -> LabelSet {
        LabelSet::new(vec![Label::new(1, "object", "#00ff00")])
    }

    #[test]
    fn test_eligibility_rules() {
        let labels = labels();
        let filter = VisibilityFilter::default();
        assert!(filter.is_eligible(&rect(1, 0.0, 0.0), &labels));

        let mut hidden = rect(2, 0.0, 0.0);
        hidden.is_visible = false;
        assert!(!filter.is_eligible(&hidden, &labels));

        let mut orphan = rect(3, 0.0, 0.0);
        orphan.label_id = 99;
        assert!(!filter.is_eligible(&orphan, &labels));

        let mut no_rects = filter;
        no_rects.set(ShapeKind::Rectangle, false);
        assert!(!no_rects.is_eligible(&rect(4, 0.0, 0.0), &labels));
        let poly = Annotation::new(
            5,
            1,
            1,
            Shape::Polygon {
                points: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(0.0, 5.0)],
            },
        );
        assert!(no_rects.is_eligible(&poly, &labels));
    }

    #[test]
    fn test_cull_uses_padding() {
        let anns = vec![rect(1, 0.0, 0.0), rect(2, 140.0, 0.0), rect(3, 200.0, 0.0)];
        let visible = Rect::new(0.0, 0.0, 100.0, 100.0);
        let culled = cull(&anns, visible, 50.0);
        assert!(culled.contains(&1));
        // 140 - 50 = 90, inside
        assert!(culled.contains(&2));
        assert!(!culled.contains(&3));
    }

    #[test]
    fn test_selected_always_rendered() {
        let anns = vec![rect(1, 0.0, 0.0), rect(2, 5000.0, 5000.0)];
        let mut layer = VisibilityLayer::new(50.0);
        layer.recompute(&anns, Rect::new(0.0, 0.0, 100.0, 100.0));

        let set = layer.render_set(&anns, &labels(), &BTreeSet::new());
        assert_eq!(set.static_ids, vec![1]);

        let selected: BTreeSet<_> = [2].into_iter().collect();
        let set = layer.render_set(&anns, &labels(), &selected);
        assert_eq!(set.static_ids, vec![1]);
        assert_eq!(set.interactive_ids, vec![2]);
    }

    #[test]
    fn test_frozen_set_ignores_view_changes_until_thaw() {
        let anns = vec![rect(1, 0.0, 0.0), rect(2, 500.0, 0.0)];
        let mut layer = VisibilityLayer::new(0.0);
        layer.recompute(&anns, Rect::new(0.0, 0.0, 100.0, 100.0));

        layer.freeze();
        layer.recompute(&anns, Rect::new(450.0, 0.0, 100.0, 100.0));
        let set = layer.render_set(&anns, &labels(), &BTreeSet::new());
        assert_eq!(set.static_ids, vec![1]);

        layer.thaw(&anns, Rect::new(450.0, 0.0, 100.0, 100.0));
        let set = layer.render_set(&anns, &labels(), &BTreeSet::new());
        assert_eq!(set.static_ids, vec![2]);
    }

    #[test]
    fn test_frozen_set_drops_deleted_and_admits_created() {
        let mut anns = vec![rect(1, 0.0, 0.0), rect(2, 10.0, 0.0)];
        let mut layer = VisibilityLayer::new(0.0);
        layer.recompute(&anns, Rect::new(0.0, 0.0, 100.0, 100.0));
        layer.freeze();

        anns.remove(0);
        anns.push(rect(3, 20.0, 0.0));
        layer.note_created(3);
        let set = layer.render_set(&anns, &labels(), &BTreeSet::new());
        assert_eq!(set.static_ids, vec![2, 3]);
    }

    #[test]
    fn test_render_set_iter_order() {
        let set = RenderSet {
            static_ids: vec![1, 2],
            interactive_ids: vec![3],
        };
        assert_eq!(set.iter().rev().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(3));
    }
}
