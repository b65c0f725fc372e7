// src/compute/wgpu_backend.rs
// wgpu implementation of the ComputeBackend capability. Work is recorded into
// at most one pending command encoder; flush_and_wait submits it and blocks on
// Maintain::Wait, so every submission is a short, bounded unit.
// RELEVANT FILES: src/compute/backend.rs, src/gpu.rs, src/pbr/energy.rs

use std::sync::mpsc;

use crate::compute::backend::{BufferId, ComputeBackend, KernelDesc, KernelId};
use crate::error::{RenderError, RenderResult};
use crate::gpu::{try_ctx, GpuContext};

struct Kernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

struct PendingDispatch {
    kernel: usize,
    uniform: usize,
    storage: Vec<usize>,
    workgroups: [u32; 3],
}

pub struct WgpuBackend {
    gpu: &'static GpuContext,
    kernels: Vec<Kernel>,
    buffers: Vec<wgpu::Buffer>,
    encoder: Option<wgpu::CommandEncoder>,
    pending: Vec<PendingDispatch>,
}

impl WgpuBackend {
    /// Bind to the process-wide device. Fails instead of panicking when the
    /// machine has no compatible adapter so callers can fall back to the CPU
    /// path.
    pub fn new() -> RenderResult<Self> {
        let gpu = try_ctx().ok_or_else(|| RenderError::device("no compatible GPU adapter"))?;
        Ok(Self {
            gpu,
            kernels: Vec::new(),
            buffers: Vec::new(),
            encoder: None,
            pending: Vec::new(),
        })
    }

    fn build_kernel(&self, desc: &KernelDesc) -> RenderResult<Kernel> {
        let device = &self.gpu.device;

        // Validation errors from bad WGSL must not reach the uncaptured error
        // handler; the scope turns them into a typed error and leaves any
        // previously built pipeline untouched.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for i in 0..desc.storage_buffers {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: i + 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: desc.entry_point,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::render(format!(
                "kernel '{}' failed validation: {}",
                desc.label, err
            )));
        }

        Ok(Kernel { pipeline, layout })
    }

    /// Record all pending dispatches into one compute pass. Pass boundaries
    /// are where wgpu orders storage access, so this is the barrier point.
    fn record_pending(&mut self) -> RenderResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let device = &self.gpu.device;
        let mut prepared = Vec::with_capacity(self.pending.len());
        for d in &self.pending {
            let kernel = &self.kernels[d.kernel];
            let mut entries = vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: self.buffers[d.uniform].as_entire_binding(),
            }];
            for (i, &b) in d.storage.iter().enumerate() {
                entries.push(wgpu::BindGroupEntry {
                    binding: (i + 1) as u32,
                    resource: self.buffers[b].as_entire_binding(),
                });
            }
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ember3d-dispatch"),
                layout: &kernel.layout,
                entries: &entries,
            });
            prepared.push((d.kernel, bind_group, d.workgroups));
        }

        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ember3d-batch"),
            })
        });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ember3d-cpass"),
                ..Default::default()
            });
            for (kernel, bind_group, workgroups) in &prepared {
                cpass.set_pipeline(&self.kernels[*kernel].pipeline);
                cpass.set_bind_group(0, bind_group, &[]);
                cpass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
            }
        }

        self.pending.clear();
        Ok(())
    }
}

impl ComputeBackend for WgpuBackend {
    fn create_kernel(&mut self, desc: &KernelDesc) -> RenderResult<KernelId> {
        let kernel = self.build_kernel(desc)?;
        self.kernels.push(kernel);
        Ok(KernelId(self.kernels.len() - 1))
    }

    fn reload_kernel(&mut self, kernel: KernelId, desc: &KernelDesc) -> RenderResult<()> {
        if kernel.0 >= self.kernels.len() {
            return Err(RenderError::render("reload of unknown kernel"));
        }
        // Swap only after the new pipeline validated.
        let rebuilt = self.build_kernel(desc)?;
        self.kernels[kernel.0] = rebuilt;
        Ok(())
    }

    fn upload_uniform(&mut self, label: &str, bytes: &[u8]) -> RenderResult<BufferId> {
        use wgpu::util::DeviceExt;
        let buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        self.buffers.push(buffer);
        Ok(BufferId(self.buffers.len() - 1))
    }

    fn alloc_storage(&mut self, label: &str, size: u64) -> RenderResult<BufferId> {
        let buffer = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.buffers.push(buffer);
        Ok(BufferId(self.buffers.len() - 1))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, bytes: &[u8]) -> RenderResult<()> {
        let buf = self
            .buffers
            .get(buffer.0)
            .ok_or_else(|| RenderError::upload("write to unknown buffer"))?;
        self.gpu.queue.write_buffer(buf, offset, bytes);
        Ok(())
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        uniform: BufferId,
        storage: &[BufferId],
        workgroups: [u32; 3],
    ) -> RenderResult<()> {
        if kernel.0 >= self.kernels.len() {
            return Err(RenderError::render("dispatch of unknown kernel"));
        }
        self.pending.push(PendingDispatch {
            kernel: kernel.0,
            uniform: uniform.0,
            storage: storage.iter().map(|b| b.0).collect(),
            workgroups,
        });
        Ok(())
    }

    fn barrier(&mut self) -> RenderResult<()> {
        // Close the open pass; the next dispatch starts a new one and wgpu
        // orders storage access across the boundary.
        self.record_pending()
    }

    fn flush_and_wait(&mut self) -> RenderResult<()> {
        self.record_pending()?;
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue.submit([encoder.finish()]);
            self.gpu.device.poll(wgpu::Maintain::Wait);
        }
        Ok(())
    }

    fn download(&mut self, buffer: BufferId) -> RenderResult<Vec<u8>> {
        self.flush_and_wait()?;

        let device = &self.gpu.device;
        let src = self
            .buffers
            .get(buffer.0)
            .ok_or_else(|| RenderError::readback("download of unknown buffer"))?;
        let size = src.size();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ember3d-staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember3d-readback"),
        });
        encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
        self.gpu.queue.submit([encoder.finish()]);

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| RenderError::readback("map_async channel closed"))?
            .map_err(|e| RenderError::readback(format!("MapAsync failed: {:?}", e)))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}
