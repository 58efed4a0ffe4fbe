//! Debounced hover tooltips.
//!
//! Entering an annotation arms a show timer; the tooltip appears only if the
//! pointer is still over the same annotation when it fires. Leaving arms a
//! shorter hide timer so the pointer can cross into the tooltip itself.
//! Above a fixed number of eligible annotations hover tracking is switched
//! off entirely.

use std::collections::HashMap;
use std::time::Duration;
use web_time::Instant;

use crate::geometry::Rect;
use crate::model::AnnotationId;

/// What the host should do with the tooltip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoverAction {
    Show { id: AnnotationId, bounds: Rect },
    Hide,
}

#[derive(Debug, Clone)]
pub struct HoverController {
    show_delay: Duration,
    hide_delay: Duration,
    disable_threshold: usize,
    enabled: bool,
    /// Image-space bounds of every eligible annotation, built on rebuild.
    bounds: HashMap<AnnotationId, Rect>,
    /// Annotation under the pointer and when the pointer entered it.
    pending_show: Option<(AnnotationId, Instant)>,
    shown: Option<AnnotationId>,
    hide_at: Option<Instant>,
    /// Pointer rests on the tooltip itself.
    over_tooltip: bool,
}

impl HoverController {
    pub fn new(show_delay: Duration, hide_delay: Duration, disable_threshold: usize) -> Self {
        Self {
            show_delay,
            hide_delay,
            disable_threshold,
            enabled: true,
            bounds: HashMap::new(),
            pending_show: None,
            shown: None,
            hide_at: None,
            over_tooltip: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn shown(&self) -> Option<AnnotationId> {
        self.shown
    }

    /// Refresh the bounds cache from the eligible annotations.
    ///
    /// Returns [`HoverAction::Hide`] if a visible tooltip has to go because
    /// hover was disabled or its annotation is gone.
    pub fn rebuild(
        &mut self,
        eligible: impl IntoIterator<Item = (AnnotationId, Rect)>,
    ) -> Option<HoverAction> {
        self.bounds = eligible.into_iter().collect();
        let enabled = self.bounds.len() <= self.disable_threshold;
        if enabled != self.enabled {
            log::debug!(
                "Hover {} ({} eligible annotations)",
                if enabled { "enabled" } else { "disabled" },
                self.bounds.len()
            );
        }
        self.enabled = enabled;

        if !enabled {
            self.bounds.clear();
            return self.reset();
        }
        if let Some((id, _)) = self.pending_show {
            if !self.bounds.contains_key(&id) {
                self.pending_show = None;
            }
        }
        match self.shown {
            Some(id) if !self.bounds.contains_key(&id) => self.reset(),
            _ => None,
        }
    }

    /// The pointer is now over `target` (or over nothing).
    pub fn pointer_over(&mut self, target: Option<AnnotationId>, now: Instant) {
        if !self.enabled {
            return;
        }
        match target {
            Some(id) if self.shown == Some(id) => {
                self.pending_show = None;
                self.hide_at = None;
            }
            Some(id) => {
                if self.pending_show.map(|(pending, _)| pending) != Some(id) {
                    self.pending_show = Some((id, now));
                }
                self.arm_hide(now);
            }
            None => {
                self.pending_show = None;
                self.arm_hide(now);
            }
        }
    }

    /// The pointer entered or left the tooltip. While it is inside, moves
    /// off the annotation do not arm the hide timer; leaving arms it.
    pub fn tooltip_hovered(&mut self, hovered: bool, now: Instant) {
        if self.shown.is_none() {
            self.over_tooltip = false;
            return;
        }
        self.over_tooltip = hovered;
        if hovered {
            self.hide_at = None;
        } else {
            self.arm_hide(now);
        }
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: Instant) -> Vec<HoverAction> {
        let mut actions = Vec::new();

        if self.hide_at.is_some_and(|at| now >= at) {
            self.hide_at = None;
            self.over_tooltip = false;
            if self.shown.take().is_some() {
                actions.push(HoverAction::Hide);
            }
        }

        if let Some((id, since)) = self.pending_show {
            if now >= since + self.show_delay {
                self.pending_show = None;
                if let Some(bounds) = self.bounds.get(&id).copied() {
                    if self.shown.replace(id).is_some() {
                        actions.push(HoverAction::Hide);
                    }
                    self.hide_at = None;
                    actions.push(HoverAction::Show { id, bounds });
                }
            }
        }

        actions
    }

    /// Drop all timers and hide the tooltip.
    pub fn reset(&mut self) -> Option<HoverAction> {
        self.pending_show = None;
        self.hide_at = None;
        self.over_tooltip = false;
        self.shown.take().map(|_| HoverAction::Hide)
    }

    fn arm_hide(&mut self, now: Instant) {
        if self.shown.is_some() && !self.over_tooltip && self.hide_at.is_none() {
            self.hide_at = Some(now + self.hide_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> HoverController {
        let mut c =
            HoverController::new(Duration::from_millis(150), Duration::from_millis(100), 300);
        c.rebuild(vec![
            (1, Rect::new(0.0, 0.0, 10.0, 10.0)),
            (2, Rect::new(20.0, 0.0, 10.0, 10.0)),
        ]);
        c
    }

    fn ms(t0: Instant, n: u64) -> Instant {
        t0 + Duration::from_millis(n)
    }

    #[test]
    fn test_show_after_delay() {
        let t0 = Instant::now();
        let mut c = controller();
        c.pointer_over(Some(1), t0);
        assert!(c.tick(ms(t0, 100)).is_empty());
        assert_eq!(
            c.tick(ms(t0, 150)),
            vec![HoverAction::Show {
                id: 1,
                bounds: Rect::new(0.0, 0.0, 10.0, 10.0)
            }]
        );
        assert_eq!(c.shown(), Some(1));
    }

    #[test]
    fn test_leaving_before_delay_shows_nothing() {
        let t0 = Instant::now();
        let mut c = controller();
        c.pointer_over(Some(1), t0);
        c.pointer_over(None, ms(t0, 100));
        assert!(c.tick(ms(t0, 300)).is_empty());

        // Moving to another annotation restarts the window
        c.pointer_over(Some(1), ms(t0, 400));
        c.pointer_over(Some(2), ms(t0, 500));
        assert!(c.tick(ms(t0, 560)).is_empty());
        assert!(matches!(c.tick(ms(t0, 650)).as_slice(), [HoverAction::Show { id: 2, .. }]));
    }

    #[test]
    fn test_hide_after_shorter_delay_and_tooltip_hover() {
        let t0 = Instant::now();
        let mut c = controller();
        c.pointer_over(Some(1), t0);
        c.tick(ms(t0, 150));

        // Crossing into the tooltip cancels the pending hide
        c.pointer_over(None, ms(t0, 200));
        c.tooltip_hovered(true, ms(t0, 250));
        c.pointer_over(None, ms(t0, 260));
        assert!(c.tick(ms(t0, 600)).is_empty());
        assert_eq!(c.shown(), Some(1));

        c.tooltip_hovered(false, ms(t0, 700));
        assert!(c.tick(ms(t0, 750)).is_empty());
        assert_eq!(c.tick(ms(t0, 800)), vec![HoverAction::Hide]);

        // Nothing shown, nothing to keep
        c.tooltip_hovered(true, ms(t0, 900));
        c.pointer_over(Some(2), ms(t0, 900));
        c.pointer_over(None, ms(t0, 1000));
        assert!(c.tick(ms(t0, 1200)).is_empty());
    }

    #[test]
    fn test_disabled_above_threshold() {
        let t0 = Instant::now();
        let mut c = HoverController::new(Duration::from_millis(150), Duration::from_millis(100), 2);
        let many: Vec<_> = (0..3).map(|i| (i, Rect::new(0.0, 0.0, 1.0, 1.0))).collect();
        c.rebuild(many);
        assert!(!c.is_enabled());
        c.pointer_over(Some(1), t0);
        assert!(c.tick(ms(t0, 1000)).is_empty());
    }

    #[test]
    fn test_rebuild_hides_removed_annotation() {
        let t0 = Instant::now();
        let mut c = controller();
        c.pointer_over(Some(2), t0);
        c.tick(ms(t0, 150));
        assert_eq!(c.rebuild(vec![(1, Rect::new(0.0, 0.0, 10.0, 10.0))]), Some(HoverAction::Hide));
        assert_eq!(c.shown(), None);
    }
}
