//! Tool and brush configuration supplied by the host.

use crate::drawable::{SerializableColor, ShapeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default eraser radius in screen pixels.
pub const DEFAULT_ERASER_RADIUS: f64 = 10.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pen,
    Highlighter,
    Rectangle,
    Circle,
    Triangle,
    Eraser,
    Lasso,
    Laser,
    Pan,
}

impl ToolKind {
    /// Shape produced by a shape tool.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rectangle => Some(ShapeKind::Rect),
            ToolKind::Circle => Some(ShapeKind::Circle),
            ToolKind::Triangle => Some(ShapeKind::Triangle),
            _ => None,
        }
    }
}

/// Color, width, opacity and smoothness for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrushSettings {
    pub color: SerializableColor,
    pub line_width: f64,
    /// Opacity in percent (0-100).
    pub opacity: f64,
    /// Smoothness (0-100); only used by freehand tools.
    pub smoothness: f64,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            line_width: 3.0,
            opacity: 100.0,
            smoothness: 50.0,
        }
    }
}

impl BrushSettings {
    /// Built-in settings for a tool the host did not configure.
    pub fn default_for(tool: ToolKind) -> Self {
        match tool {
            ToolKind::Highlighter => Self {
                color: SerializableColor::new(250, 204, 21, 255),
                line_width: 16.0,
                opacity: 40.0,
                smoothness: 50.0,
            },
            ToolKind::Rectangle | ToolKind::Circle | ToolKind::Triangle => Self {
                smoothness: 0.0,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    /// Opacity clamped to 0-100.
    pub fn clamped_opacity(&self) -> f64 {
        self.opacity.clamp(0.0, 100.0)
    }
}

/// Read-only tool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolConfig {
    pub active_tool: ToolKind,
    /// Per-tool overrides of [`BrushSettings::default_for`].
    pub brushes: HashMap<ToolKind, BrushSettings>,
    /// Eraser radius in screen pixels.
    pub eraser_radius: f64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            active_tool: ToolKind::default(),
            brushes: HashMap::new(),
            eraser_radius: DEFAULT_ERASER_RADIUS,
        }
    }
}

impl ToolConfig {
    /// Load from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.active_tool = tool;
        self
    }

    pub fn with_brush(mut self, tool: ToolKind, brush: BrushSettings) -> Self {
        self.brushes.insert(tool, brush);
        self
    }

    /// Settings for `tool`.
    pub fn brush(&self, tool: ToolKind) -> BrushSettings {
        self.brushes
            .get(&tool)
            .copied()
            .unwrap_or_else(|| BrushSettings::default_for(tool))
    }
}
