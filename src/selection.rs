//! Selection manager.
//!
//! Owns the set of selected annotation ids. Every change is pushed through a
//! debounced commit so that rapid churn (e.g. clicking through shapes while
//! dragging) reaches the application only once, with the last value.

use std::collections::BTreeSet;
use std::time::Duration;
use web_time::Instant;

use crate::geometry::{self, Point, Rect};
use crate::model::AnnotationId;
use crate::timing::Debouncer;

/// An in-progress rubber-band selection in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubberBand {
    pub start: Point,
    pub end: Point,
    /// Shift was held when the band started: union with the prior selection.
    pub additive: bool,
}

impl RubberBand {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }
}

/// Set of selected annotations plus rubber-band state.
#[derive(Debug, Clone)]
pub struct SelectionManager {
    selected: BTreeSet<AnnotationId>,
    band: Option<RubberBand>,
    commit: Debouncer<Vec<AnnotationId>>,
    rubber_band_min_size: f64,
}

impl SelectionManager {
    pub fn new(rubber_band_min_size: f64, commit_delay: Duration) -> Self {
        Self {
            selected: BTreeSet::new(),
            band: None,
            commit: Debouncer::new(commit_delay),
            rubber_band_min_size,
        }
    }

    pub fn ids(&self) -> &BTreeSet<AnnotationId> {
        &self.selected
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn rubber_band(&self) -> Option<&RubberBand> {
        self.band.as_ref()
    }

    /// Plain click selects only `id`; shift-click toggles it.
    pub fn click(&mut self, id: AnnotationId, shift: bool, now: Instant) -> bool {
        let before = self.selected.clone();
        if shift {
            if !self.selected.remove(&id) {
                self.selected.insert(id);
            }
        } else {
            self.selected.clear();
            self.selected.insert(id);
        }
        self.changed_since(&before, now)
    }

    /// Replace the selection wholesale.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = AnnotationId>, now: Instant) -> bool {
        let before = std::mem::replace(&mut self.selected, ids.into_iter().collect());
        self.changed_since(&before, now)
    }

    pub fn clear(&mut self, now: Instant) -> bool {
        self.replace(std::iter::empty(), now)
    }

    /// Drop ids for which `keep` returns false, e.g. deleted annotations.
    pub fn retain(&mut self, keep: impl Fn(AnnotationId) -> bool, now: Instant) -> bool {
        let before = self.selected.clone();
        self.selected.retain(|id| keep(*id));
        self.changed_since(&before, now)
    }

    /// Pointer went down on empty canvas.
    ///
    /// Without shift the selection is cleared first.
    pub fn begin_rubber_band(&mut self, start: Point, shift: bool, now: Instant) -> bool {
        let changed = if shift { false } else { self.clear(now) };
        self.band = Some(RubberBand {
            start,
            end: start,
            additive: shift,
        });
        changed
    }

    pub fn update_rubber_band(&mut self, end: Point) {
        if let Some(band) = &mut self.band {
            band.end = end;
        }
    }

    /// Release the rubber band.
    ///
    /// `candidates` are the render-eligible annotations with their bounds.
    /// Bands no larger than the minimum size in both dimensions select
    /// nothing.
    pub fn finish_rubber_band(
        &mut self,
        candidates: impl IntoIterator<Item = (AnnotationId, Rect)>,
        now: Instant,
    ) -> bool {
        let Some(band) = self.band.take() else {
            return false;
        };
        let rect = band.rect();
        if rect.width <= self.rubber_band_min_size && rect.height <= self.rubber_band_min_size {
            return false;
        }

        let hits: Vec<AnnotationId> = candidates
            .into_iter()
            .filter(|(_, bounds)| geometry::intersects(&rect, bounds))
            .map(|(id, _)| id)
            .collect();
        log::debug!(
            "Rubber band ({:.1}, {:.1}, {:.1}x{:.1}) hit {} annotation(s)",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            hits.len()
        );

        let before = self.selected.clone();
        if !band.additive {
            self.selected.clear();
        }
        self.selected.extend(hits);
        self.changed_since(&before, now)
    }

    pub fn cancel_rubber_band(&mut self) -> bool {
        self.band.take().is_some()
    }

    /// Release the pending selection commit once idle.
    pub fn poll_commit(&mut self, now: Instant) -> Option<Vec<AnnotationId>> {
        self.commit.poll(now)
    }

    pub fn is_commit_pending(&self) -> bool {
        self.commit.is_pending()
    }

    /// Drop everything, including the pending commit.
    pub fn reset(&mut self) {
        self.selected.clear();
        self.band = None;
        self.commit.cancel();
    }

    fn changed_since(&mut self, before: &BTreeSet<AnnotationId>, now: Instant) -> bool {
        if *before == self.selected {
            return false;
        }
        self.commit.push(self.selected.iter().copied().collect(), now);
        log::trace!("Selection now {:?}", self.selected);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SelectionManager {
        SelectionManager::new(5.0, Duration::from_millis(50))
    }

    fn ids(m: &SelectionManager) -> Vec<AnnotationId> {
        m.ids().iter().copied().collect()
    }

    #[test]
    fn test_click_replaces_and_shift_toggles() {
        let now = Instant::now();
        let mut m = manager();
        m.click(1, false, now);
        m.click(2, false, now);
        assert_eq!(ids(&m), vec![2]);

        m.click(3, true, now);
        assert_eq!(ids(&m), vec![2, 3]);
        m.click(2, true, now);
        assert_eq!(ids(&m), vec![3]);
    }

    #[test]
    fn test_rubber_band_selects_intersecting() {
        let now = Instant::now();
        let mut m = manager();
        m.click(9, false, now);
        m.begin_rubber_band(Point::new(0.0, 0.0), false, now);
        assert!(m.is_empty());
        m.update_rubber_band(Point::new(100.0, 100.0));
        m.finish_rubber_band(
            vec![
                (1, Rect::new(10.0, 10.0, 20.0, 20.0)),
                (2, Rect::new(200.0, 200.0, 10.0, 10.0)),
                (3, Rect::new(90.0, 95.0, 50.0, 50.0)),
            ],
            now,
        );
        assert_eq!(ids(&m), vec![1, 3]);
        assert!(m.rubber_band().is_none());
    }

    #[test]
    fn test_rubber_band_shift_unions() {
        let now = Instant::now();
        let mut m = manager();
        m.click(7, false, now);
        m.begin_rubber_band(Point::new(100.0, 0.0), true, now);
        m.update_rubber_band(Point::new(0.0, 100.0));
        m.finish_rubber_band(vec![(1, Rect::new(10.0, 10.0, 20.0, 20.0))], now);
        assert_eq!(ids(&m), vec![1, 7]);
    }

    #[test]
    fn test_tiny_rubber_band_selects_nothing() {
        let now = Instant::now();
        let mut m = manager();
        m.begin_rubber_band(Point::new(10.0, 10.0), false, now);
        m.update_rubber_band(Point::new(14.0, 15.0));
        assert!(!m.finish_rubber_band(vec![(1, Rect::new(0.0, 0.0, 50.0, 50.0))], now));
        assert!(m.is_empty());

        // Thin but long bands still count
        m.begin_rubber_band(Point::new(10.0, 10.0), false, now);
        m.update_rubber_band(Point::new(12.0, 60.0));
        assert!(m.finish_rubber_band(vec![(1, Rect::new(0.0, 0.0, 50.0, 50.0))], now));
    }

    #[test]
    fn test_commit_is_coalesced() {
        let t0 = Instant::now();
        let mut m = manager();
        m.click(1, false, t0);
        m.click(2, true, t0 + Duration::from_millis(10));
        m.click(3, false, t0 + Duration::from_millis(20));
        assert_eq!(m.poll_commit(t0 + Duration::from_millis(40)), None);
        assert_eq!(m.poll_commit(t0 + Duration::from_millis(70)), Some(vec![3]));
        assert_eq!(m.poll_commit(t0 + Duration::from_millis(500)), None);
    }

    #[test]
    fn test_unchanged_selection_does_not_commit() {
        let t0 = Instant::now();
        let mut m = manager();
        m.click(1, false, t0);
        m.poll_commit(t0 + Duration::from_secs(1));
        assert!(!m.click(1, false, t0 + Duration::from_secs(2)));
        assert!(!m.is_commit_pending());
    }

    #[test]
    fn test_retain_drops_missing() {
        let now = Instant::now();
        let mut m = manager();
        m.replace([1, 2, 3], now);
        m.retain(|id| id != 2, now);
        assert_eq!(ids(&m), vec![1, 3]);
    }
}
