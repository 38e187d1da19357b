//! Training devices, with a GPU picked up when one is present.

use crate::error::{Error, Result};
use burn::backend::wgpu::{init_device, RuntimeOptions, Wgpu, WgpuDevice, WgpuSetup};
use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, info};
use wgpu::{Adapter, Backends, Instance, PowerPreference};

/// Differentiable CPU backend, always available.
pub type CpuBackend = Autodiff<NdArray>;
/// Differentiable GPU backend.
pub type GpuBackend = Autodiff<Wgpu>;
pub type CpuDevice = burn::backend::ndarray::NdArrayDevice;

/// Where a model should train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePlacement {
    /// CPU via NdArray.
    #[default]
    Cpu,
    /// GPU via Wgpu, when an adapter is found.
    Gpu,
}

/// Work that can run on any differentiable backend.
///
/// [`BackendPool::run`] picks the backend and hands the task its device.
pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output;
}

struct GpuHandle {
    device: WgpuDevice,
    adapter: String,
}

/// The CPU device plus an opened GPU device, if any.
pub struct BackendPool {
    gpu: Option<GpuHandle>,
    cpu_device: CpuDevice,
}

impl BackendPool {
    /// Look for a GPU. A missing adapter leaves the pool CPU-only.
    pub fn new() -> Self {
        let gpu = match open_gpu() {
            Ok(handle) => {
                info!("Training device: GPU ({})", handle.adapter);
                Some(handle)
            }
            Err(e) => {
                info!("Training device: CPU ({})", e);
                None
            }
        };
        Self {
            gpu,
            cpu_device: CpuDevice::default(),
        }
    }

    /// CPU only, without touching the GPU driver.
    pub fn cpu_only() -> Self {
        Self {
            gpu: None,
            cpu_device: CpuDevice::default(),
        }
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn gpu_device(&self) -> Option<&WgpuDevice> {
        self.gpu.as_ref().map(|g| &g.device)
    }

    /// Name of the opened GPU adapter.
    pub fn adapter_name(&self) -> Option<&str> {
        self.gpu.as_ref().map(|g| g.adapter.as_str())
    }

    pub fn cpu_device(&self) -> &CpuDevice {
        &self.cpu_device
    }

    /// GPU when available.
    pub fn default_placement(&self) -> DevicePlacement {
        self.effective_placement(DevicePlacement::Gpu)
    }

    /// `preferred`, falling back to CPU when no GPU was found.
    pub fn effective_placement(&self, preferred: DevicePlacement) -> DevicePlacement {
        match preferred {
            DevicePlacement::Gpu if self.has_gpu() => DevicePlacement::Gpu,
            _ => DevicePlacement::Cpu,
        }
    }

    /// Run `task` on the backend for `preferred`.
    pub fn run<T: BackendTask>(&self, preferred: DevicePlacement, task: T) -> T::Output {
        match (self.effective_placement(preferred), &self.gpu) {
            (DevicePlacement::Gpu, Some(gpu)) => task.run::<GpuBackend>(gpu.device.clone()),
            _ => task.run::<CpuBackend>(self.cpu_device),
        }
    }
}

impl Default for BackendPool {
    fn default() -> Self {
        Self::new()
    }
}

fn open_gpu() -> Result<GpuHandle> {
    let instance = Instance::new(&wgpu::InstanceDescriptor {
        backends: native_backends(),
        ..Default::default()
    });
    let adapter = request_adapter(&instance)?;
    let info = adapter.get_info();
    debug!("GPU adapter: {:?}", info);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("rollnet training"),
        ..Default::default()
    }))
    .map_err(|e| Error::BackendInit(e.to_string()))?;

    let device = init_device(
        WgpuSetup {
            instance,
            adapter,
            device,
            queue,
            backend: info.backend,
        },
        RuntimeOptions::default(),
    );
    Ok(GpuHandle {
        device,
        adapter: info.name,
    })
}

fn request_adapter(instance: &Instance) -> Result<Adapter> {
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: PowerPreference::HighPerformance,
        force_fallback_adapter: false,
        compatible_surface: None,
    }))
    .map_err(|_| Error::BackendInit("no GPU adapter".into()))
}

fn native_backends() -> Backends {
    if cfg!(target_os = "macos") {
        Backends::METAL
    } else if cfg!(target_os = "windows") {
        Backends::DX12 | Backends::VULKAN
    } else if cfg!(target_os = "linux") {
        Backends::VULKAN
    } else {
        Backends::all()
    }
}
