use once_cell::sync::OnceCell;

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue:  wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

static CTX: OnceCell<Option<GpuContext>> = OnceCell::new();

/// Acquire the process-wide GPU context, or None when no adapter exists.
/// Precompute callers use this to fall back to the CPU path instead of
/// panicking on headless machines.
pub fn try_ctx() -> Option<&'static GpuContext> {
    CTX.get_or_init(|| {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor { backends: wgpu::Backends::all(), ..Default::default() });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                label: Some("ember3d-device"),
            }, None
        )).ok()?;

        Some(GpuContext { device, queue, adapter })
    }).as_ref()
}

pub fn ctx() -> &'static GpuContext {
    try_ctx().expect("No suitable GPU adapter")
}
