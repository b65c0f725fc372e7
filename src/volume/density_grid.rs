// src/volume/density_grid.rs
// Empty-space skipping for volume rendering: a 32x32x32 grid of per-bucket
// maximum density, built once per volume by scanning every active voxel.
// Uploads go one Z-slice per submission so no single copy stalls the queue.
// RELEVANT FILES: src/compute/backend.rs, src/compute/mod.rs

use crate::compute::backend::{BufferId, ComputeBackend};
use crate::error::{RenderError, RenderResult};

pub const DENSITY_GRID_DIM: u32 = 32;

/// Narrow view of an external sparse voxel grid.
pub trait VolumeGrid {
    /// Density at integer voxel coordinates.
    fn value(&self, x: i32, y: i32, z: i32) -> f32;
    /// Active-voxel bounding box: (min inclusive, max exclusive).
    fn active_bounds(&self) -> ([i32; 3], [i32; 3]);
    /// Global (min, max) density over active voxels.
    fn min_max(&self) -> (f32, f32);
}

/// Per-bucket maximum density over the active bounding box, x fastest.
pub struct MaxDensityGrid {
    data: Vec<f32>,
}

impl MaxDensityGrid {
    /// Scan every voxel in the active bounding box, folding each into its
    /// bucket's maximum.
    pub fn build(grid: &dyn VolumeGrid) -> RenderResult<Self> {
        let (lo, hi) = grid.active_bounds();
        let extent = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
        if extent.iter().any(|&e| e <= 0) {
            return Err(RenderError::GridMissing(
                "volume has an empty active bounding box".into(),
            ));
        }

        let dim = DENSITY_GRID_DIM as usize;
        let mut data = vec![0.0f32; dim * dim * dim];
        let bucket_of = |c: i32, lo: i32, extent: i32| -> usize {
            let b = ((c - lo) as i64 * dim as i64 / extent as i64) as usize;
            b.min(dim - 1)
        };

        for z in lo[2]..hi[2] {
            let bz = bucket_of(z, lo[2], extent[2]);
            for y in lo[1]..hi[1] {
                let by = bucket_of(y, lo[1], extent[1]);
                for x in lo[0]..hi[0] {
                    let bx = bucket_of(x, lo[0], extent[0]);
                    let index = (bz * dim + by) * dim + bx;
                    let value = grid.value(x, y, z);
                    if value > data[index] {
                        data[index] = value;
                    }
                }
            }
        }

        Ok(Self { data })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Copy the grid into `buffer`, one Z-slice per submission. The buffer
    /// must hold DENSITY_GRID_DIM^3 floats.
    pub fn upload(&self, backend: &mut dyn ComputeBackend, buffer: BufferId) -> RenderResult<()> {
        let dim = DENSITY_GRID_DIM as usize;
        let slice_floats = dim * dim;
        for z in 0..dim {
            let slice = &self.data[z * slice_floats..(z + 1) * slice_floats];
            backend.write_buffer(
                buffer,
                (z * slice_floats * 4) as u64,
                bytemuck::cast_slice(slice),
            )?;
            backend.flush_and_wait()?;
        }
        Ok(())
    }
}
