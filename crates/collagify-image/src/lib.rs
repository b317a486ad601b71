//! Collagify Image
//!
//! Grid compositing for daily collages: decode N photos, tile them row-major
//! onto a white canvas, re-encode as a single JPEG.
//!
//! All inputs are assumed to share the first image's dimensions. Larger
//! images are clipped to their cell and smaller ones leave background showing;
//! nothing is resized.

pub mod layout;
pub mod tiler;

pub use layout::Grid;
pub use tiler::{TileError, concat};
