//! wgpu-based renderer implementation.

use crate::renderer::{RenderResult, RenderStyle, Renderer, RendererError};
use crate::wgpu_device::WgpuDevice;
use bytemuck::{Pod, Zeroable};
use inkboard_core::frame::Frame;
use inkboard_core::gpu::BufferManager;
use inkboard_core::tessellate::Vertex;
use kurbo::Size;
use peniko::Color;
use wgpu::util::DeviceExt;

/// Texture format used for headless rendering.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const SHADER: &str = r#"
struct Globals {
    projection: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = globals.projection * vec4<f32>(in.position, 0.0, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Uniform block shared by both pipelines.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Globals {
    projection: [[f32; 4]; 4],
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Convert a peniko color to a wgpu clear color.
fn clear_color(color: Color) -> wgpu::Color {
    let [r, g, b, a] = color.components;
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

/// Renderer that draws frames with two pipelines over a shared projection:
/// a triangle list for drawable meshes and a line list for overlays.
pub struct WgpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: BufferManager<WgpuDevice>,
    mesh_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    format: wgpu::TextureFormat,
    style: RenderStyle,
}

impl WgpuRenderer {
    /// Create a renderer drawing into targets of `format`.
    ///
    /// Vertex colors are straight sRGB values; a non-sRGB target format
    /// keeps them unconverted.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("inkboard shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals {
                projection: [[0.0; 4]; 4],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals bind group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("inkboard pipeline layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::TriangleList,
            "mesh pipeline",
        );
        let overlay_pipeline = create_pipeline(
            &device,
            &layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::LineList,
            "overlay pipeline",
        );

        log::info!("Renderer created for {:?}", format);

        Self {
            buffers: BufferManager::new(WgpuDevice::new(device.clone())),
            device,
            queue,
            mesh_pipeline,
            overlay_pipeline,
            globals_buffer,
            globals_bind_group,
            format,
            style: RenderStyle::default(),
        }
    }

    /// Create a renderer on the default adapter with no surface.
    ///
    /// Fails with [`RendererError::InitFailed`] when no adapter or device is
    /// available.
    pub fn headless() -> RenderResult<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| RendererError::InitFailed(format!("No adapter: {}", e)))?;

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("inkboard device"),
                    ..Default::default()
                })
                .await
                .map_err(|e| RendererError::InitFailed(format!("No device: {}", e)))?;

            Ok(Self::new(device, queue, HEADLESS_FORMAT))
        })
    }

    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Number of drawable meshes resident on the device.
    pub fn live_mesh_count(&self) -> usize {
        self.buffers.live_mesh_count()
    }

    /// Create an offscreen texture to render into.
    pub fn create_target(&self, size: Size) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: (size.width.ceil() as u32).max(1),
                height: (size.height.ceil() as u32).max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[vertex_layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl Renderer for WgpuRenderer {
    type Target = wgpu::TextureView;

    fn render(&mut self, frame: &mut Frame<'_>, target: &wgpu::TextureView) -> RenderResult<()> {
        let draw_list = self.buffers.prepare_frame(frame);

        let globals = Globals {
            projection: frame.projection(),
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let overlay = frame.overlay(&self.style.overlay);
        let overlay_buffer = (!overlay.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("overlay"),
                    contents: bytemuck::cast_slice(&overlay),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(self.style.background_color)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.mesh_pipeline);
            pass.set_bind_group(0, &self.globals_bind_group, &[]);

            let layer_meshes = draw_list
                .meshes
                .iter()
                .filter_map(|handle| self.buffers.mesh(*handle));
            let transient = draw_list
                .has_transient
                .then(|| self.buffers.transient())
                .flatten();
            for mesh in layer_meshes.chain(transient) {
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }

            if let Some(buffer) = &overlay_buffer {
                pass.set_pipeline(&self.overlay_pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..overlay.len() as u32, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn style(&self) -> &RenderStyle {
        &self.style
    }

    fn release_all(&mut self) {
        self.buffers.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_matches_vertex() {
        let layout = vertex_layout();
        assert_eq!(layout.array_stride, 24);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 8);
        assert_eq!(layout.attributes[1].shader_location, 1);
    }

    #[test]
    fn test_globals_size() {
        assert_eq!(std::mem::size_of::<Globals>(), 64);
    }

    #[test]
    fn test_clear_color() {
        let color = clear_color(Color::from_rgba8(255, 0, 0, 255));
        assert!((color.r - 1.0).abs() < 1e-6);
        assert!(color.g.abs() < 1e-6);
        assert!((color.a - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_style() {
        let style = RenderStyle::default().with_background(Color::from_rgba8(0, 0, 0, 255));
        let color = clear_color(style.background_color);
        assert!(color.r.abs() < 1e-6);
    }
}
