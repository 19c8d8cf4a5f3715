//! Inkboard Core Library
//!
//! Platform-agnostic data model, tessellation, buffer management, view and
//! editing logic for the Inkboard ink canvas.

pub mod canvas;
pub mod drawable;
pub mod frame;
pub mod gpu;
pub mod history;
pub mod input;
pub mod mesh;
pub mod overlay;
pub mod selection;
pub mod session;
pub mod smoothing;
pub mod storage;
pub mod tessellate;
pub mod tools;
pub mod view;

pub use canvas::{Canvas, EditError, Layer, LayerId};
pub use drawable::{
    Drawable, DrawableBody, DrawableId, SerializableColor, Shape, ShapeKind, Stroke,
};
pub use frame::Frame;
pub use gpu::{
    BufferManager, BufferUsage, DeviceError, DeviceMesh, DrawList, GpuDevice, MemoryDevice,
};
pub use history::{HISTORY_CAPACITY, History, HistoryAction};
pub use input::{GestureState, Modifiers, MouseButton, PointerEvent, PointerId, WheelEvent};
pub use mesh::{MeshHandle, MeshState};
pub use overlay::{LaserTrail, OverlayStyle};
pub use selection::{HandleKind, Selection};
pub use session::Session;
pub use storage::{MemoryStorage, Storage, StorageError, StorageResult};
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
pub use tessellate::{Mesh, Vertex, tessellate};
pub use tools::{BrushSettings, ToolConfig, ToolKind};
pub use view::{ViewState, ViewTransform};
