//! GPU buffer management.
//!
//! [`BufferManager`] is the only component that moves a drawable's
//! [`MeshState`] into `Built`. It is generic over [`GpuDevice`] so the cache
//! protocol can run (and be tested) without a real GPU.

use crate::canvas::Layer;
use crate::drawable::Drawable;
use crate::frame::Frame;
use crate::mesh::{MeshHandle, MeshState};
use crate::tessellate::{Mesh, tessellate};
use std::collections::HashMap;
use thiserror::Error;

/// Device buffer sizes must be multiples of this.
pub const BUFFER_ALIGNMENT: usize = 4;

/// Device errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Buffer allocation failed: {0}")]
    Allocation(String),
    #[error("Device lost")]
    Lost,
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// What a device buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Minimal device surface the buffer manager needs.
pub trait GpuDevice {
    type Buffer;

    /// Create a buffer initialized with `contents`. `contents.len()` is
    /// always a multiple of [`BUFFER_ALIGNMENT`].
    fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> DeviceResult<Self::Buffer>;

    /// Release a buffer's device memory now.
    fn release_buffer(&mut self, buffer: Self::Buffer);
}

/// Vertex and index buffers of one uploaded mesh.
#[derive(Debug)]
pub struct DeviceMesh<B> {
    pub vertex_buffer: B,
    pub index_buffer: B,
    pub index_count: u32,
}

/// Meshes to draw for one frame, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawList {
    /// Layer meshes, back to front.
    pub meshes: Vec<MeshHandle>,
    /// Whether the in-progress mesh was uploaded for this frame.
    pub has_transient: bool,
}

/// Pad `bytes` with zeros up to the next multiple of [`BUFFER_ALIGNMENT`].
pub fn aligned_bytes(bytes: &[u8]) -> Vec<u8> {
    let len = bytes.len().div_ceil(BUFFER_ALIGNMENT) * BUFFER_ALIGNMENT;
    let mut padded = Vec::with_capacity(len);
    padded.extend_from_slice(bytes);
    padded.resize(len, 0);
    padded
}

/// Owns device-resident meshes for drawables.
pub struct BufferManager<D: GpuDevice> {
    device: D,
    meshes: HashMap<MeshHandle, DeviceMesh<D::Buffer>>,
    transient: Option<DeviceMesh<D::Buffer>>,
    next_handle: u64,
}

impl<D: GpuDevice> BufferManager<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            meshes: HashMap::new(),
            transient: None,
            next_handle: 1,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Number of cached drawable meshes (excluding the transient one).
    pub fn live_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&DeviceMesh<D::Buffer>> {
        self.meshes.get(&handle)
    }

    /// The in-progress mesh uploaded by the last [`Self::prepare_transient`].
    pub fn transient(&self) -> Option<&DeviceMesh<D::Buffer>> {
        self.transient.as_ref()
    }

    fn upload(&mut self, label: &str, mesh: &Mesh) -> DeviceResult<DeviceMesh<D::Buffer>> {
        let vertex_bytes = aligned_bytes(bytemuck::cast_slice(&mesh.vertices));
        let index_bytes = aligned_bytes(bytemuck::cast_slice(&mesh.indices));

        let vertex_buffer = self
            .device
            .create_buffer(label, BufferUsage::Vertex, &vertex_bytes)?;
        let index_buffer = match self
            .device
            .create_buffer(label, BufferUsage::Index, &index_bytes)
        {
            Ok(buffer) => buffer,
            Err(err) => {
                self.device.release_buffer(vertex_buffer);
                return Err(err);
            }
        };

        Ok(DeviceMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    fn release_mesh(&mut self, mesh: DeviceMesh<D::Buffer>) {
        self.device.release_buffer(mesh.vertex_buffer);
        self.device.release_buffer(mesh.index_buffer);
    }

    /// Release the device buffers behind `handle`, if still resident.
    pub fn release(&mut self, handle: MeshHandle) {
        if let Some(mesh) = self.meshes.remove(&handle) {
            self.release_mesh(mesh);
        }
    }

    /// Release handles retired by removals since the last tick.
    pub fn release_retired(&mut self, retired: impl IntoIterator<Item = MeshHandle>) {
        for handle in retired {
            self.release(handle);
        }
    }

    /// Make sure `drawable` has an up-to-date mesh.
    ///
    /// Returns the handle to draw, or `None` for degenerate geometry or a
    /// failed upload (retried on the next call).
    pub fn ensure_mesh(&mut self, drawable: &mut Drawable) -> Option<MeshHandle> {
        if let MeshState::Built(handle) = drawable.mesh() {
            if self.meshes.contains_key(handle) {
                return Some(*handle);
            }
        }

        if let Some(old) = drawable.take_mesh() {
            self.release(old);
        }

        let mesh = tessellate(drawable);
        if mesh.is_empty() {
            return None;
        }

        let label = drawable.id().to_string();
        match self.upload(&label, &mesh) {
            Ok(device_mesh) => {
                let handle = MeshHandle::from_raw(self.next_handle);
                self.next_handle += 1;
                self.meshes.insert(handle, device_mesh);
                *drawable.mesh_mut() = MeshState::Built(handle);
                Some(handle)
            }
            Err(err) => {
                log::warn!("Failed to upload mesh for {}: {}", drawable.id(), err);
                None
            }
        }
    }

    /// Ensure meshes for every visible layer; returns handles in draw order.
    pub fn prepare_layers(&mut self, layers: &mut [Layer]) -> Vec<MeshHandle> {
        let mut draw_list = Vec::new();
        for layer in layers.iter_mut().filter(|layer| layer.is_visible) {
            for drawable in layer.drawables_mut() {
                if let Some(handle) = self.ensure_mesh(drawable) {
                    draw_list.push(handle);
                }
            }
        }
        draw_list
    }

    /// Rebuild the in-progress mesh from scratch, releasing last tick's.
    pub fn prepare_transient(
        &mut self,
        drawable: Option<&Drawable>,
    ) -> Option<&DeviceMesh<D::Buffer>> {
        if let Some(previous) = self.transient.take() {
            self.release_mesh(previous);
        }

        let drawable = drawable?;
        let mesh = tessellate(drawable);
        if mesh.is_empty() {
            return None;
        }

        match self.upload("in-progress", &mesh) {
            Ok(device_mesh) => {
                self.transient = Some(device_mesh);
                self.transient.as_ref()
            }
            Err(err) => {
                log::warn!("Failed to upload in-progress mesh: {}", err);
                None
            }
        }
    }

    /// Release retired handles, then bring every mesh of the frame up to
    /// date.
    pub fn prepare_frame(&mut self, frame: &mut Frame<'_>) -> DrawList {
        self.release_retired(std::mem::take(&mut frame.retired));
        let meshes = self.prepare_layers(frame.layers);
        let has_transient = self.prepare_transient(frame.in_progress).is_some();
        DrawList {
            meshes,
            has_transient,
        }
    }

    /// Release every buffer this manager owns.
    pub fn release_all(&mut self) {
        let meshes: Vec<_> = self.meshes.drain().map(|(_, mesh)| mesh).collect();
        for mesh in meshes {
            self.release_mesh(mesh);
        }
        if let Some(transient) = self.transient.take() {
            self.release_mesh(transient);
        }
    }
}

/// A device that keeps buffers in host memory.
///
/// Used when no GPU is available and in tests, where the uploaded bytes can
/// be inspected.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    buffers: HashMap<u64, (BufferUsage, Vec<u8>)>,
    next_id: u64,
    /// Number of upcoming `create_buffer` calls that fail.
    pub fail_next: usize,
    /// Fail every `create_buffer` call for this usage.
    pub fail_usage: Option<BufferUsage>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn contents(&self, buffer: u64) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, bytes)| bytes.as_slice())
    }
}

impl GpuDevice for MemoryDevice {
    type Buffer = u64;

    fn create_buffer(
        &mut self,
        _label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> DeviceResult<u64> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(DeviceError::Allocation("simulated failure".to_string()));
        }
        if self.fail_usage == Some(usage) {
            return Err(DeviceError::Allocation(format!("{usage:?} buffers disabled")));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, (usage, contents.to_vec()));
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: u64) {
        self.buffers.remove(&buffer);
    }
}
