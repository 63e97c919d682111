//! Grid primitives: device geometry, per-screen occupancy masks, and first-fit
//! space finding across screens.

pub mod geometry;
pub mod occupancy;
pub mod space_finder;

pub use geometry::GridGeometry;
pub use occupancy::GridOccupancy;
pub use space_finder::{Placement, SpaceFinder};
