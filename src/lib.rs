//! HVAT canvas - interactive annotation canvas engine
//!
//! Headless core of an image annotation canvas: zoom and pan, rectangle and
//! polygon drawing, selection, drag and resize, polygon point editing and
//! culled rendering through a pluggable scene.

pub mod config;
pub mod constants;
pub mod drag;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hover;
pub mod input;
pub mod model;
pub mod polygon_edit;
pub mod scene;
pub mod selection;
pub mod store;
pub mod timing;
pub mod tool;
pub mod viewport;
pub mod visibility;

pub use config::EngineConfig;
pub use engine::{CanvasEngine, EngineEvent};
pub use error::{Rejection, StoreError};
pub use geometry::{Point, Rect, ViewTransform};
pub use model::{Annotation, AnnotationId, ImageSize, Label, LabelId, Shape};
pub use scene::{RecordingScene, Scene};
pub use store::{AnnotationStore, ImageProvider, LabelRegistry, LabelSet, MemoryStore};
pub use tool::Tool;
pub use viewport::Viewport;
