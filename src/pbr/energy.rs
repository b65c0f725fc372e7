// src/pbr/energy.rs
// Monte-Carlo energy-compensation tables for the GGX microfacet model: the
// average energy a single-scatter BRDF loses versus an energy-preserving one,
// tabulated over view angle, roughness, and anisotropy or IOR. Generation runs
// off the critical path, either fanned out over the CPU worker pool or as
// bounded GPU dispatch batches; both estimators are statistically equivalent.
// RELEVANT FILES: src/pbr/ggx.rs, src/shaders/energy_lut.wgsl, src/compute/backend.rs

use std::f32::consts::PI;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::compute::backend::{ComputeBackend, KernelDesc};
use crate::compute::{bounded_batches, DISPATCHES_PER_SUBMIT};
use crate::core::cancel::CancelToken;
use crate::core::worker_pool::WorkerPool;
use crate::error::{RenderError, RenderResult};
use crate::pbr::ggx::{
    anisotropic_alphas, fresnel_dielectric, reflect, refract, sample_vndf, smith_g1, MIN_ALPHA,
};

/// Third-axis IOR range of the refraction tables. 1.0 exactly would make
/// refraction an identity and total internal reflection degenerate.
pub const IOR_MIN: f32 = 1.01;
pub const IOR_MAX: f32 = 3.0;

/// Samples the GPU kernel folds into one dispatch; must match energy_lut.wgsl.
pub const SAMPLES_PER_DISPATCH: u32 = 20;

const WORKGROUP_SIZE: u32 = 64;

/// Which integrand a table holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnergyKind {
    /// Reflected energy over (view cosine, roughness, anisotropy).
    Reflection,
    /// Transmitted+reflected energy entering the surface, over
    /// (view cosine, roughness, IOR).
    RefractionEnter,
    /// Same, leaving the surface from inside.
    RefractionExit,
}

impl EnergyKind {
    fn mode(self) -> u32 {
        match self {
            EnergyKind::Reflection => 0,
            EnergyKind::RefractionEnter => 1,
            EnergyKind::RefractionExit => 2,
        }
    }
}

/// Discretization of one lookup table. Flat layout: x (view cosine) fastest,
/// then y (roughness), then z (anisotropy or IOR).
#[derive(Clone, Copy, Debug)]
pub struct EnergyTableDesc {
    pub kind: EnergyKind,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Continuous parameters of one table cell.
#[derive(Clone, Copy, Debug)]
pub struct CellParams {
    pub view_cos: f32,
    pub roughness: f32,
    /// Anisotropy for reflection tables, IOR for refraction tables.
    pub aux: f32,
}

impl EnergyTableDesc {
    pub fn reflection() -> Self {
        Self {
            kind: EnergyKind::Reflection,
            width: 32,
            height: 32,
            depth: 8,
        }
    }

    pub fn refraction_enter() -> Self {
        Self {
            kind: EnergyKind::RefractionEnter,
            width: 32,
            height: 32,
            depth: 8,
        }
    }

    pub fn refraction_exit() -> Self {
        Self {
            kind: EnergyKind::RefractionExit,
            width: 32,
            height: 32,
            depth: 8,
        }
    }

    pub fn cell_count(&self) -> usize {
        (self.width * self.height * self.depth) as usize
    }

    /// Midpoint discretization for view cosine and roughness keeps both off
    /// their degenerate endpoints; the third axis spans its range inclusively.
    pub fn cell_params(&self, x: u32, y: u32, z: u32) -> CellParams {
        let view_cos = (x as f32 + 0.5) / self.width as f32;
        let roughness = (y as f32 + 0.5) / self.height as f32;
        let t = if self.depth > 1 {
            z as f32 / (self.depth - 1) as f32
        } else {
            0.0
        };
        let aux = match self.kind {
            EnergyKind::Reflection => t,
            EnergyKind::RefractionEnter | EnergyKind::RefractionExit => {
                IOR_MIN + (IOR_MAX - IOR_MIN) * t
            }
        };
        CellParams {
            view_cos,
            roughness,
            aux,
        }
    }
}

/// Generator configuration shared by the CPU and GPU paths.
#[derive(Clone, Copy, Debug)]
pub struct EnergyGenParams {
    /// Total samples per table cell. The GPU path rounds up to whole
    /// dispatches of SAMPLES_PER_DISPATCH.
    pub samples_per_cell: u32,
    pub seed: u64,
}

impl Default for EnergyGenParams {
    fn default() -> Self {
        Self {
            samples_per_cell: 1024,
            seed: 0x45_4d_42_33,
        }
    }
}

/// Mean reflected energy for a view direction with polar cosine `view_cos`
/// and uniformly random azimuth.
///
/// Importance-sampling the visible normals makes the estimator BRDF/PDF
/// collapse: D and G1(V) appear in both numerator and denominator and cancel
/// together with the geometric factors, leaving F x G1(L) per sample. Fresnel
/// is applied by the shading code at lookup time, so the integrand kept here
/// is G1(L).
pub fn accumulate_reflection(
    sample_count: u32,
    roughness: f32,
    view_cos: f32,
    anisotropy: f32,
    rng: &mut impl Rng,
) -> f32 {
    if sample_count == 0 {
        return 0.0;
    }
    let (ax, ay) = anisotropic_alphas(roughness, anisotropy);
    let sin_theta = (1.0 - view_cos * view_cos).max(0.0).sqrt();

    let mut sum = 0.0f32;
    for _ in 0..sample_count {
        let azimuth = 2.0 * PI * rng.gen::<f32>();
        let v = Vec3::new(sin_theta * azimuth.cos(), sin_theta * azimuth.sin(), view_cos);
        let h = sample_vndf(v, ax, ay, rng.gen(), rng.gen());
        let l = reflect(v, h);
        if l.z > 0.0 {
            let w = smith_g1(l, ax, ay);
            if w.is_finite() {
                sum += w;
            }
        }
    }
    sum / sample_count as f32
}

/// Mean transported energy for a rough dielectric interface. `above_surface`
/// selects which side the view ray starts on, flipping the relative IOR. Each
/// sample picks reflection or refraction by the Fresnel probability and
/// contributes through the matching estimator; a sample that degenerates near
/// total internal reflection contributes zero instead of poisoning the mean.
pub fn accumulate_refraction(
    sample_count: u32,
    roughness: f32,
    view_cos: f32,
    ior: f32,
    above_surface: bool,
    rng: &mut impl Rng,
) -> f32 {
    if sample_count == 0 {
        return 0.0;
    }
    let alpha = roughness.max(MIN_ALPHA);
    let eta = if above_surface { 1.0 / ior } else { ior };
    let sin_theta = (1.0 - view_cos * view_cos).max(0.0).sqrt();

    let mut sum = 0.0f32;
    for _ in 0..sample_count {
        let azimuth = 2.0 * PI * rng.gen::<f32>();
        let v = Vec3::new(sin_theta * azimuth.cos(), sin_theta * azimuth.sin(), view_cos);
        let h = sample_vndf(v, alpha, alpha, rng.gen(), rng.gen());
        let f = fresnel_dielectric(v.dot(h), eta);

        let w = if rng.gen::<f32>() < f {
            let l = reflect(v, h);
            if l.z > 0.0 {
                smith_g1(l, alpha, alpha)
            } else {
                0.0
            }
        } else {
            match refract(v, h, eta) {
                Some(t) if t.z < 0.0 => smith_g1(Vec3::new(t.x, t.y, -t.z), alpha, alpha),
                _ => 0.0,
            }
        };
        if w.is_finite() {
            sum += w;
        }
    }
    sum / sample_count as f32
}

fn cell_value(desc: &EnergyTableDesc, cell: CellParams, samples: u32, rng: &mut StdRng) -> f32 {
    match desc.kind {
        EnergyKind::Reflection => {
            accumulate_reflection(samples, cell.roughness, cell.view_cos, cell.aux, rng)
        }
        EnergyKind::RefractionEnter => {
            accumulate_refraction(samples, cell.roughness, cell.view_cos, cell.aux, true, rng)
        }
        EnergyKind::RefractionExit => {
            accumulate_refraction(samples, cell.roughness, cell.view_cos, cell.aux, false, rng)
        }
    }
}

fn cell_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Fill a table on the worker pool: one independent task per cell, each
/// owning a disjoint index. Results come back over a channel and are written
/// by this thread, so the table itself needs no locking. Cancellation is
/// honored between tasks; cells never reached stay 0.
pub fn generate_table_cpu(
    desc: &EnergyTableDesc,
    params: &EnergyGenParams,
    pool: &WorkerPool,
    cancel: &CancelToken,
) -> RenderResult<Vec<f32>> {
    let cells = desc.cell_count();
    let mut table = vec![0.0f32; cells];
    let (tx, rx) = mpsc::channel::<(usize, f32)>();

    let mut pushed = 0usize;
    'push: for z in 0..desc.depth {
        for y in 0..desc.height {
            for x in 0..desc.width {
                if cancel.is_cancelled() {
                    break 'push;
                }
                let index = (z * desc.height * desc.width + y * desc.width + x) as usize;
                let cell = desc.cell_params(x, y, z);
                let kind_desc = *desc;
                let samples = params.samples_per_cell;
                let seed = cell_seed(params.seed, index);
                let tx = tx.clone();
                pool.push_task(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let value = cell_value(&kind_desc, cell, samples, &mut rng);
                    let _ = tx.send((index, value));
                })?;
                pushed += 1;
            }
        }
    }
    drop(tx);

    // Join through the result channel instead of polling the pool's counter;
    // the channel closing early means a worker died.
    let mut received = 0usize;
    let mut logged_pct = 0usize;
    while received < pushed {
        let (index, value) = rx
            .recv()
            .map_err(|_| RenderError::pool("energy table worker exited early"))?;
        table[index] = value;
        received += 1;
        let pct = received * 100 / pushed;
        if pct >= logged_pct + 10 {
            logged_pct = pct - pct % 10;
            log::info!(
                "energy table {:?}: {}% ({} tasks left)",
                desc.kind,
                logged_pct,
                pool.tasks_left()
            );
        }
    }
    Ok(table)
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
struct EnergyUniforms {
    width: u32,
    height: u32,
    depth: u32,
    mode: u32,
    ior_min: f32,
    ior_max: f32,
    seed: u32,
    _pad: u32,
}

/// Fill a table on the GPU with the same estimator. Each dispatch folds
/// SAMPLES_PER_DISPATCH samples per cell into a running sum; per-cell
/// iteration counters live GPU-side, so the RNG stream of a dispatch depends
/// only on (cell, iteration) and host-side batching cannot change the result.
/// At most `batch_cap` dispatches are recorded per submit-and-wait cycle, and
/// a barrier separates the write phase of one dispatch from the read of the
/// next. Cancellation is honored between submitted batches; the table then
/// holds the mean over the iterations that completed.
pub fn generate_table_gpu(
    desc: &EnergyTableDesc,
    params: &EnergyGenParams,
    backend: &mut dyn ComputeBackend,
    batch_cap: u32,
    cancel: &CancelToken,
) -> RenderResult<Vec<f32>> {
    let cells = desc.cell_count() as u32;
    let iterations =
        ((params.samples_per_cell + SAMPLES_PER_DISPATCH - 1) / SAMPLES_PER_DISPATCH).max(1);

    let kernel = backend.create_kernel(&KernelDesc {
        label: "energy-lut",
        source: include_str!("../shaders/energy_lut.wgsl"),
        entry_point: "cs_energy",
        storage_buffers: 2,
    })?;

    let uniforms = EnergyUniforms {
        width: desc.width,
        height: desc.height,
        depth: desc.depth,
        mode: desc.kind.mode(),
        ior_min: IOR_MIN,
        ior_max: IOR_MAX,
        seed: params.seed as u32,
        _pad: 0,
    };
    let ubo = backend.upload_uniform("energy-lut-uniforms", bytemuck::bytes_of(&uniforms))?;
    let accum = backend.alloc_storage("energy-lut-accum", cells as u64 * 4)?;
    let iters = backend.alloc_storage("energy-lut-iters", cells as u64 * 4)?;
    let groups = (cells + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

    let mut completed = 0u32;
    for batch in bounded_batches(iterations, batch_cap.max(1)) {
        for _ in batch.clone() {
            backend.dispatch(kernel, ubo, &[accum, iters], [groups, 1, 1])?;
            backend.barrier()?;
        }
        backend.flush_and_wait()?;
        completed += batch.end - batch.start;
        if cancel.is_cancelled() {
            break;
        }
    }

    let bytes = backend.download(accum)?;
    let sums: &[f32] = bytemuck::cast_slice(&bytes);
    let inv = 1.0 / completed.max(1) as f32;
    Ok(sums.iter().map(|s| s * inv).collect())
}

/// GPU generation with the default submission cap.
pub fn generate_table_gpu_default(
    desc: &EnergyTableDesc,
    params: &EnergyGenParams,
    backend: &mut dyn ComputeBackend,
    cancel: &CancelToken,
) -> RenderResult<Vec<f32>> {
    generate_table_gpu(desc, params, backend, DISPATCHES_PER_SUBMIT, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_surface_loses_almost_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let e = accumulate_reflection(2048, 0.05, 0.8, 0.0, &mut rng);
        assert!(e > 0.9 && e <= 1.0 + 1e-3, "got {}", e);
    }

    #[test]
    fn rough_grazing_view_loses_energy() {
        let mut rng = StdRng::seed_from_u64(7);
        let smooth = accumulate_reflection(2048, 0.1, 0.9, 0.0, &mut rng);
        let rough = accumulate_reflection(2048, 0.9, 0.1, 0.0, &mut rng);
        assert!(rough < smooth);
    }

    #[test]
    fn refraction_mean_is_bounded_and_finite() {
        let mut rng = StdRng::seed_from_u64(11);
        for &(r, v, ior, above) in &[
            (0.1, 0.9, 1.5, true),
            (0.5, 0.5, 1.5, false),
            (0.9, 0.05, 2.4, true),
            (0.3, 0.2, 1.01, false),
        ] {
            let e = accumulate_refraction(1024, r, v, ior, above, &mut rng);
            assert!(e.is_finite());
            assert!(e >= 0.0 && e <= 1.0 + 1e-3, "got {}", e);
        }
    }

    #[test]
    fn cell_params_cover_the_axes() {
        let desc = EnergyTableDesc::refraction_enter();
        let first = desc.cell_params(0, 0, 0);
        let last = desc.cell_params(desc.width - 1, desc.height - 1, desc.depth - 1);
        assert!(first.view_cos > 0.0 && last.view_cos < 1.0);
        assert!((first.aux - IOR_MIN).abs() < 1e-6);
        assert!((last.aux - IOR_MAX).abs() < 1e-6);
    }

    #[test]
    fn zero_samples_yield_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(accumulate_reflection(0, 0.5, 0.5, 0.0, &mut rng), 0.0);
        assert_eq!(accumulate_refraction(0, 0.5, 0.5, 1.5, true, &mut rng), 0.0);
    }
}
