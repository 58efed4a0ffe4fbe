//! Error types for the canvas engine.
//!
//! Nothing in the engine is fatal. User input that breaks a rule produces a
//! [`Rejection`] which the host shows as a transient notification; store
//! failures are [`StoreError`]s the engine recovers from locally.

use thiserror::Error;

use crate::model::AnnotationId;

/// User input that was refused. The draft or geometry it targeted is left
/// untouched so the user can continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Second rectangle corner too close to the first
    #[error(
        "Rectangle is too small ({width:.1} x {height:.1}); place the second corner more than {min} pixels away"
    )]
    RectangleTooSmall {
        /// Absolute width of the attempted rectangle
        width: f64,
        /// Absolute height of the attempted rectangle
        height: f64,
        /// Required minimum, exclusive
        min: f64,
    },

    /// Polygon close attempted with too few points
    #[error("A polygon needs at least 3 points, it has {count}")]
    PolygonTooFewPoints {
        /// Points in the draft
        count: usize,
    },

    /// Point deletion would leave fewer than 3 points
    #[error("Cannot delete point: polygons need at least 3 points")]
    PolygonPointFloor,

    /// No label is active, or the active label no longer exists
    #[error("Select a label before drawing")]
    NoActiveLabel,

    /// Every annotation id above the highest stored one is taken
    #[error("No annotation ids left to assign")]
    IdsExhausted,
}

/// Errors reported by an [`crate::store::AnnotationStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The annotation no longer exists
    #[error("Annotation not found: {0}")]
    NotFound(AnnotationId),

    /// The store has no batch update path
    #[error("Batch update not supported")]
    BatchUnsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        let err = Rejection::RectangleTooSmall {
            width: 3.0,
            height: 40.0,
            min: 5.0,
        };
        assert_eq!(
            err.to_string(),
            "Rectangle is too small (3.0 x 40.0); place the second corner more than 5 pixels away"
        );
        assert_eq!(
            Rejection::PolygonTooFewPoints { count: 2 }.to_string(),
            "A polygon needs at least 3 points, it has 2"
        );
    }
}
