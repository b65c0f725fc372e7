// src/volume/mod.rs
// Volume-rendering acceleration data. The sparse voxel storage itself is an
// external capability; this module only precomputes what the renderer samples
// cheaply at runtime.

pub mod density_grid;

pub use density_grid::{MaxDensityGrid, VolumeGrid, DENSITY_GRID_DIM};
