// src/path_tracing/accumulation.rs
// Progressive accumulation scheduler: paces chunked ray dispatches across
// frames and decides when the image has converged. The screen is subdivided
// into chunk_count x chunk_count tiles and one tile is traced per submission;
// a full-frame trace at high sample counts can outlive the driver watchdog and
// lose the device, so the subdivision is an invariant, not a tuning knob.
// RELEVANT FILES: src/compute/mod.rs, src/path_tracing/alias_table.rs

use std::time::Instant;

use crate::core::cancel::CancelToken;

/// PCG-style integer hash. Stateless: the per-frame seed is a hash of elapsed
/// milliseconds, which decorrelates noise patterns across frames without
/// carrying a PRNG object.
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulationParams {
    /// Samples added to every pixel by one full sweep over all chunks.
    pub samples_per_frame: u32,
    /// The screen is split into chunk_count^2 tiles, one tile per dispatch.
    pub chunk_count: u32,
    /// Target per-pixel sample count; reaching it converges the scheduler.
    pub max_samples_accumulated: u32,
}

impl Default for AccumulationParams {
    fn default() -> Self {
        Self {
            samples_per_frame: 16,
            chunk_count: 4,
            max_samples_accumulated: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Accumulating,
    Converged,
}

/// Outcome of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Trace this chunk now, seeding the ray generator with `seed`.
    Dispatch { chunk_index: u32, seed: u32 },
    /// All samples accumulated (or cancellation requested); nothing to trace.
    Done,
}

pub struct AccumulationScheduler {
    params: AccumulationParams,
    phase: Phase,
    frame_count: u32,
    dispatch_count: u32,
    samples_accumulated: u32,
    epoch: Instant,
    cancel: CancelToken,
}

impl AccumulationScheduler {
    pub fn new(params: AccumulationParams) -> Self {
        Self {
            params: AccumulationParams {
                chunk_count: params.chunk_count.max(1),
                ..params
            },
            phase: Phase::Idle,
            frame_count: 0,
            dispatch_count: 0,
            samples_accumulated: 0,
            epoch: Instant::now(),
            cancel: CancelToken::new(),
        }
    }

    /// Zero all counters and start accumulating. Must be called whenever any
    /// parameter that changes the rendered image is modified: scene, camera,
    /// material, sampling option, denoiser toggle, resolution.
    pub fn reset(&mut self) {
        self.frame_count = 0;
        self.dispatch_count = 0;
        self.samples_accumulated = 0;
        self.phase = Phase::Accumulating;
    }

    /// Change the screen subdivision. Counters derived from dispatch_count are
    /// only meaningful for the chunk count they were accumulated under, so the
    /// change always resets.
    pub fn set_chunk_count(&mut self, chunk_count: u32) {
        self.params.chunk_count = chunk_count.max(1);
        self.reset();
    }

    pub fn set_samples_per_frame(&mut self, samples_per_frame: u32) {
        self.params.samples_per_frame = samples_per_frame;
        self.reset();
    }

    pub fn set_max_samples_accumulated(&mut self, max_samples_accumulated: u32) {
        self.params.max_samples_accumulated = max_samples_accumulated;
        self.reset();
    }

    /// Decide the next dispatch. Counters are recomputed from dispatch_count
    /// rather than incremented so a partially completed chunk sweep always
    /// reports a consistent frame/sample count.
    pub fn advance(&mut self) -> Advance {
        if self.phase == Phase::Converged || self.cancel.is_cancelled() {
            return Advance::Done;
        }
        if self.phase == Phase::Idle {
            self.phase = Phase::Accumulating;
        }

        let chunks = self.params.chunk_count * self.params.chunk_count;
        let chunk_index = self.dispatch_count % chunks;
        let seed = pcg_hash(self.epoch.elapsed().as_millis() as u32);

        self.dispatch_count += 1;
        self.frame_count = self.dispatch_count / chunks;
        self.samples_accumulated = self.frame_count * self.params.samples_per_frame;

        if self.samples_accumulated >= self.params.max_samples_accumulated {
            self.phase = Phase::Converged;
        }

        Advance::Dispatch { chunk_index, seed }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_converged(&self) -> bool {
        self.phase == Phase::Converged
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn dispatch_count(&self) -> u32 {
        self.dispatch_count
    }

    pub fn samples_accumulated(&self) -> u32 {
        self.samples_accumulated
    }

    pub fn params(&self) -> &AccumulationParams {
        &self.params
    }

    /// Token observed once per advance; cancelling parks the scheduler on
    /// Done without touching the counters.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
