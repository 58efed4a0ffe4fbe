//! Collaborator interfaces owned outside the engine, plus in-memory
//! implementations for headless use and tests.
//!
//! The engine never assumes exclusive access to the annotation collection:
//! anything it read a moment ago may have been deleted by another path, so
//! every commit re-checks that its target still exists.

use crate::error::StoreError;
use crate::model::{Annotation, AnnotationId, ImageSize, Label, LabelId};

// ============================================================================
// Traits
// ============================================================================

/// Annotation CRUD for the current image.
pub trait AnnotationStore {
    /// All annotations of the current image, in paint order (later is on top).
    fn list(&self) -> &[Annotation];

    /// Look up an annotation by id.
    fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.list().iter().find(|a| a.id == id)
    }

    fn create(&mut self, annotation: Annotation);

    /// Replace the annotation with the same id.
    fn update(&mut self, annotation: Annotation) -> Result<(), StoreError>;

    /// Replace several annotations in one batch.
    ///
    /// Stores without batch support keep the default, which returns
    /// [`StoreError::BatchUnsupported`]; callers then fall back to one
    /// [`update`](Self::update) per annotation.
    fn update_many(&mut self, annotations: Vec<Annotation>) -> Result<(), StoreError> {
        let _ = annotations;
        Err(StoreError::BatchUnsupported)
    }
}

/// Read access to the label set.
pub trait LabelRegistry {
    fn get(&self, id: LabelId) -> Option<&Label>;
}

/// Source of the current image's pixel dimensions.
pub trait ImageProvider {
    /// `None` while the image is still loading.
    fn dimensions(&self) -> Option<ImageSize>;
}

impl ImageProvider for ImageSize {
    fn dimensions(&self) -> Option<ImageSize> {
        Some(*self)
    }
}

impl ImageProvider for Option<ImageSize> {
    fn dimensions(&self) -> Option<ImageSize> {
        *self
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Vec-backed annotation store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    annotations: Vec<Annotation>,
    supports_batch: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            annotations: Vec::new(),
            supports_batch: true,
        }
    }

    pub fn with_annotations(annotations: Vec<Annotation>) -> Self {
        Self {
            annotations,
            supports_batch: true,
        }
    }

    /// Disable `update_many`, forcing the sequential fallback.
    pub fn without_batch_support(mut self) -> Self {
        self.supports_batch = false;
        self
    }

    /// Delete an annotation, as the surrounding application would.
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id == id)?;
        Some(self.annotations.remove(index))
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore for MemoryStore {
    fn list(&self) -> &[Annotation] {
        &self.annotations
    }

    fn create(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    fn update(&mut self, annotation: Annotation) -> Result<(), StoreError> {
        let slot = self
            .annotations
            .iter_mut()
            .find(|a| a.id == annotation.id)
            .ok_or(StoreError::NotFound(annotation.id))?;
        *slot = annotation;
        Ok(())
    }

    fn update_many(&mut self, annotations: Vec<Annotation>) -> Result<(), StoreError> {
        if !self.supports_batch {
            return Err(StoreError::BatchUnsupported);
        }
        // All or nothing
        if let Some(missing) = annotations.iter().find(|a| self.get(a.id).is_none()) {
            return Err(StoreError::NotFound(missing.id));
        }
        for annotation in annotations {
            self.update(annotation)?;
        }
        Ok(())
    }
}

// ============================================================================
// Label set
// ============================================================================

/// Vec-backed label registry.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    /// Add or replace a label.
    pub fn insert(&mut self, label: Label) {
        match self.labels.iter_mut().find(|l| l.id == label.id) {
            Some(existing) => *existing = label,
            None => self.labels.push(label),
        }
    }

    pub fn remove(&mut self, id: LabelId) -> Option<Label> {
        let index = self.labels.iter().position(|l| l.id == id)?;
        Some(self.labels.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}

impl LabelRegistry for LabelSet {
    fn get(&self, id: LabelId) -> Option<&Label> {
        self.labels.iter().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::model::Shape;

    fn ann(id: AnnotationId) -> Annotation {
        Annotation::new(id, 1, 1, Shape::Rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)))
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut store = MemoryStore::with_annotations(vec![ann(1)]);
        assert!(matches!(store.update(ann(2)), Err(StoreError::NotFound(2))));
        assert!(store.update(ann(1)).is_ok());
    }

    #[test]
    fn test_update_many_is_all_or_nothing() {
        let mut store = MemoryStore::with_annotations(vec![ann(1), ann(2)]);
        let moved = ann(1).with_shape(Shape::Rectangle(Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(matches!(
            store.update_many(vec![moved.clone(), ann(3)]),
            Err(StoreError::NotFound(3))
        ));
        assert_eq!(store.get(1).map(|a| a.shape.clone()), Some(ann(1).shape));

        assert!(store.update_many(vec![moved.clone()]).is_ok());
        assert_eq!(store.get(1).map(|a| a.shape.clone()), Some(moved.shape));
    }

    #[test]
    fn test_batch_can_be_disabled() {
        let mut store = MemoryStore::with_annotations(vec![ann(1)]).without_batch_support();
        assert!(matches!(
            store.update_many(vec![ann(1)]),
            Err(StoreError::BatchUnsupported)
        ));
    }

    #[test]
    fn test_remove_and_labels() {
        let mut store = MemoryStore::with_annotations(vec![ann(1), ann(2)]);
        assert!(store.remove(1).is_some());
        assert!(store.remove(1).is_none());
        assert_eq!(store.len(), 1);

        let mut labels = LabelSet::default();
        labels.insert(Label::new(1, "cat", "#ff0000"));
        labels.insert(Label::new(1, "dog", "#00ff00"));
        assert_eq!(labels.get(1).map(|l| l.name.as_str()), Some("dog"));
        assert!(labels.remove(1).is_some());
        assert!(labels.get(1).is_none());
    }

    #[test]
    fn test_image_provider_impls() {
        let size = ImageSize::new(800, 600);
        assert_eq!(size.dimensions(), Some(size));
        assert_eq!(None::<ImageSize>.dimensions(), None);
    }
}
