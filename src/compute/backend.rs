// src/compute/backend.rs
// Narrow compute capability consumed by the lookup generators: run bounded
// units of GPU work and move linear buffers in and out. The core never manages
// the backing device's lifetime.
// RELEVANT FILES: src/compute/wgpu_backend.rs, src/pbr/energy.rs

use crate::error::RenderResult;

/// Opaque handle to a compute pipeline owned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelId(pub(crate) usize);

/// Opaque handle to a linear GPU buffer owned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferId(pub(crate) usize);

/// Description of a compute kernel. Bind group layout convention: binding 0 is
/// a uniform buffer, bindings 1..=storage_buffers are read-write storage.
#[derive(Clone, Copy, Debug)]
pub struct KernelDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub entry_point: &'a str,
    pub storage_buffers: u32,
}

pub trait ComputeBackend {
    /// Build a compute pipeline from WGSL source. A validation failure returns
    /// an error and registers nothing.
    fn create_kernel(&mut self, desc: &KernelDesc) -> RenderResult<KernelId>;

    /// Rebuild `kernel` from new source. On failure the previously built
    /// pipeline stays bound and usable; interactive shader reloads rely on
    /// this.
    fn reload_kernel(&mut self, kernel: KernelId, desc: &KernelDesc) -> RenderResult<()>;

    /// Upload a uniform buffer.
    fn upload_uniform(&mut self, label: &str, bytes: &[u8]) -> RenderResult<BufferId>;

    /// Allocate a zero-initialized read-write storage buffer.
    fn alloc_storage(&mut self, label: &str, size: u64) -> RenderResult<BufferId>;

    /// Queue a host-to-buffer write. Takes effect no later than the next
    /// flush_and_wait.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, bytes: &[u8]) -> RenderResult<()>;

    /// Record one bounded unit of work: `workgroups` of `kernel` with the
    /// given uniform and storage bindings.
    fn dispatch(
        &mut self,
        kernel: KernelId,
        uniform: BufferId,
        storage: &[BufferId],
        workgroups: [u32; 3],
    ) -> RenderResult<()>;

    /// Order all storage writes recorded so far before any subsequent access.
    /// Callers place one between the write and read phases of a shared result
    /// buffer.
    fn barrier(&mut self) -> RenderResult<()>;

    /// Submit everything recorded so far and block until the device is idle.
    fn flush_and_wait(&mut self) -> RenderResult<()>;

    /// Read back the full contents of a buffer. Implies flush_and_wait.
    fn download(&mut self, buffer: BufferId) -> RenderResult<Vec<u8>>;
}
