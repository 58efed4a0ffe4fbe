//! Writing finished gestures back to the store.

use super::{CanvasEngine, EngineEvent};
use crate::error::{Rejection, StoreError};
use crate::model::{Annotation, AnnotationId, Shape};
use crate::scene::Scene;
use crate::store::{AnnotationStore, LabelRegistry};

impl<S, L, C> CanvasEngine<S, L, C>
where
    S: AnnotationStore,
    L: LabelRegistry,
    C: Scene,
{
    /// Store a shape produced by a drawing tool under the active label.
    pub(super) fn create_annotation(&mut self, shape: Shape) {
        let Some(label_id) = self.active_label.filter(|id| self.labels.get(*id).is_some()) else {
            self.reject(Rejection::NoActiveLabel);
            return;
        };

        let Some(id) = self.ids.next_id() else {
            self.reject(Rejection::IdsExhausted);
            return;
        };

        let annotation = Annotation::new(id, self.image_id, label_id, shape);
        log::info!(
            "✏️ Created {:?} annotation {} (label {})",
            annotation.kind(),
            annotation.id,
            label_id
        );
        self.store.create(annotation.clone());
        // Visible immediately, even while culling is frozen
        self.visibility.note_created(annotation.id);
        self.events.push(EngineEvent::AnnotationCreated(annotation));
        self.needs_sync = true;
    }

    /// Write new geometry for existing annotations.
    ///
    /// Targets deleted since the gesture began are dropped. Several updates
    /// go through the batch path; if the store refuses it they are applied
    /// one by one.
    pub(super) fn commit_shapes(&mut self, shapes: Vec<(AnnotationId, Shape)>) {
        let updated: Vec<Annotation> = shapes
            .into_iter()
            .filter_map(|(id, shape)| match self.store.get(id) {
                Some(current) => Some(current.with_shape(shape)),
                None => {
                    log::debug!("Dropping commit for deleted annotation {}", id);
                    None
                }
            })
            .collect();
        if updated.is_empty() {
            return;
        }

        let applied = if updated.len() == 1 {
            self.update_each(updated)
        } else {
            let ids: Vec<AnnotationId> = updated.iter().map(|a| a.id).collect();
            match self.store.update_many(updated.clone()) {
                Ok(()) => ids,
                Err(StoreError::BatchUnsupported) => {
                    log::debug!("Store has no batch update, updating {} one by one", ids.len());
                    self.update_each(updated)
                }
                Err(e) => {
                    log::debug!("Batch update failed ({}), updating one by one", e);
                    self.update_each(updated)
                }
            }
        };

        for id in &applied {
            self.memo.invalidate(*id);
        }
        if !applied.is_empty() {
            self.events.push(EngineEvent::AnnotationsUpdated(applied));
        }

        let visible = self.visible_image_rect();
        self.visibility.recompute(self.store.list(), visible);
        self.needs_sync = true;
    }

    fn update_each(&mut self, annotations: Vec<Annotation>) -> Vec<AnnotationId> {
        annotations
            .into_iter()
            .filter_map(|annotation| {
                let id = annotation.id;
                match self.store.update(annotation) {
                    Ok(()) => Some(id),
                    Err(e) => {
                        log::debug!("Dropping update for annotation {}: {}", id, e);
                        None
                    }
                }
            })
            .collect()
    }
}
