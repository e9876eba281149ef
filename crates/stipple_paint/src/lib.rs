//! Stipple paint primitives
//!
//! Plain value types shared by the text and GPU crates.
//!
//! # Features
//!
//! - Colors with straight and premultiplied alpha
//! - Affine transforms
//! - Path commands with arc and shape helpers
//! - Paints (solid, linear/radial/box gradients, image patterns)
//! - Stroke caps, joins and miter limits

pub mod color;
pub mod geometry;
pub mod paint;
pub mod path;
pub mod stroke;
pub mod transform;

pub use color::Color;
pub use geometry::{Point, Rect};
pub use paint::{ImageId, Paint};
pub use path::{Path, PathBuilder, PathCommand, Winding, KAPPA90};
pub use stroke::{LineCap, LineJoin, StrokeStyle};
pub use transform::Transform2D;
