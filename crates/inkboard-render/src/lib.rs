//! Inkboard Render Library
//!
//! Renderer abstraction and the wgpu implementation for Inkboard: device
//! buffers for drawable meshes, one pipeline for meshes and one for overlay
//! lines.

mod renderer;
mod wgpu_device;
mod wgpu_impl;

pub use renderer::{RenderResult, RenderStyle, Renderer, RendererError};
pub use wgpu_device::WgpuDevice;
pub use wgpu_impl::{HEADLESS_FORMAT, WgpuRenderer};
