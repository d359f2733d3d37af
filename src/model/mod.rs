//! The unified core data model shared by every parser and writer
//! (spec.md §3).

pub mod color;
pub mod drawing;
pub mod hole;
pub mod point;
pub mod project;
pub mod surface;

pub use color::ColorHex;
pub use drawing::{Drawing, DrawingCommon, DrawingMap, Vertex};
pub use hole::Hole;
pub use point::{Aabb3, Point3};
pub use project::{Image, Project};
pub use surface::{Surface, TexturedSurface, Triangle};
