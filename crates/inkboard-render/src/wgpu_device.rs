//! [`GpuDevice`] backed by a wgpu device.

use inkboard_core::gpu::{BufferUsage, DeviceError, DeviceResult, GpuDevice};
use wgpu::util::DeviceExt;

/// Map a buffer role to wgpu usage flags.
pub(crate) fn usage_flags(usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
        BufferUsage::Index => wgpu::BufferUsages::INDEX,
    }
}

/// Creates mesh buffers on a wgpu device.
#[derive(Debug, Clone)]
pub struct WgpuDevice {
    device: wgpu::Device,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

impl GpuDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;

    fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> DeviceResult<wgpu::Buffer> {
        let max = self.device.limits().max_buffer_size;
        if contents.len() as u64 > max {
            return Err(DeviceError::Allocation(format!(
                "{} bytes exceeds the device limit of {}",
                contents.len(),
                max
            )));
        }
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: usage_flags(usage),
            }))
    }

    fn release_buffer(&mut self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }
}
