//! Canvas document: layers of drawables plus the persisted view.

use crate::drawable::{Drawable, DrawableId};
use crate::mesh::MeshHandle;
use crate::view::{ViewTransform, clamp_scale};
use kurbo::{Rect, Vec2};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a layer.
pub type LayerId = Uuid;

/// Errors for layer operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("Layer not found: {0}")]
    UnknownLayer(LayerId),
    #[error("Cannot remove the last layer")]
    LastLayer,
}

/// An ordered, visibility-toggled container of drawables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub is_visible: bool,
    /// Drawables back to front.
    #[serde(rename = "strokes")]
    drawables: Vec<Drawable>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_visible: true,
            drawables: Vec::new(),
        }
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    /// Mutable access to drawables; geometry edits still go through
    /// [`Drawable`] methods, which invalidate meshes.
    pub fn drawables_mut(&mut self) -> &mut [Drawable] {
        &mut self.drawables
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    pub fn contains(&self, id: DrawableId) -> bool {
        self.drawables.iter().any(|d| d.id() == id)
    }

    pub fn get(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.iter().find(|d| d.id() == id)
    }

    pub fn get_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.iter_mut().find(|d| d.id() == id)
    }

    /// Append a drawable. Rejects (and returns) a drawable whose id is
    /// already present.
    pub fn push(&mut self, drawable: Drawable) -> Result<(), Drawable> {
        if self.contains(drawable.id()) {
            return Err(drawable);
        }
        self.drawables.push(drawable);
        Ok(())
    }

    /// Insert a drawable at `index` (clamped to the end). Rejects (and
    /// returns) a drawable whose id is already present.
    pub fn insert(&mut self, index: usize, drawable: Drawable) -> Result<(), Drawable> {
        if self.contains(drawable.id()) {
            return Err(drawable);
        }
        let index = index.min(self.drawables.len());
        self.drawables.insert(index, drawable);
        Ok(())
    }

    /// Remove a drawable by id, keeping the order of the rest.
    pub fn remove(&mut self, id: DrawableId) -> Option<Drawable> {
        let index = self.drawables.iter().position(|d| d.id() == id)?;
        Some(self.drawables.remove(index))
    }

    /// Swap in `drawable` at the position of the drawable with the same id.
    /// Returns the previous drawable.
    pub fn replace(&mut self, drawable: Drawable) -> Option<Drawable> {
        let slot = self.get_mut(drawable.id())?;
        Some(std::mem::replace(slot, drawable))
    }

    /// Union of drawable bounds.
    pub fn bounds(&self) -> Option<Rect> {
        union_bounds(self.drawables.iter())
    }
}

/// Union of the bounds of `drawables`, or `None` for an empty set.
pub fn union_bounds<'a>(drawables: impl IntoIterator<Item = &'a Drawable>) -> Option<Rect> {
    drawables
        .into_iter()
        .map(Drawable::bounds)
        .reduce(|acc, bounds| acc.union(bounds))
}

/// A document's full drawing state.
///
/// Always holds at least one layer, and `active_layer_id` always resolves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    layers: Vec<Layer>,
    active_layer_id: LayerId,
    pub pan_offset: Vec2,
    pub scale: f64,
    /// Mesh handles detached from removed drawables, released next tick.
    #[serde(skip)]
    retired: Vec<MeshHandle>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Create a canvas with a single empty layer.
    pub fn new() -> Self {
        let layer = Layer::new("Layer 1");
        Self {
            active_layer_id: layer.id,
            layers: vec![layer],
            pan_offset: Vec2::ZERO,
            scale: 1.0,
            retired: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access to the layers without changing how many there are.
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn active_layer_id(&self) -> LayerId {
        self.active_layer_id
    }

    fn active_index(&self) -> usize {
        self.layers
            .iter()
            .position(|l| l.id == self.active_layer_id)
            .unwrap_or(0)
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active_index()]
    }

    pub fn active_layer_mut(&mut self) -> &mut Layer {
        let index = self.active_index();
        &mut self.layers[index]
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> Result<(), EditError> {
        if self.layer(id).is_none() {
            return Err(EditError::UnknownLayer(id));
        }
        self.active_layer_id = id;
        Ok(())
    }

    /// Append a new layer and make it active.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let layer = Layer::new(name);
        let id = layer.id;
        self.layers.push(layer);
        self.active_layer_id = id;
        id
    }

    /// Remove a layer, retiring the meshes of its drawables. The last
    /// remaining layer cannot be removed.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer, EditError> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(EditError::UnknownLayer(id))?;
        if self.layers.len() == 1 {
            return Err(EditError::LastLayer);
        }

        let mut layer = self.layers.remove(index);
        for drawable in &mut layer.drawables {
            self.retired.extend(drawable.take_mesh());
        }
        if self.active_layer_id == id {
            let fallback = index.min(self.layers.len() - 1);
            self.active_layer_id = self.layers[fallback].id;
        }
        Ok(layer)
    }

    /// Flip a layer's visibility; returns the new state.
    pub fn toggle_layer_visibility(&mut self, id: LayerId) -> Result<bool, EditError> {
        let layer = self.layer_mut(id).ok_or(EditError::UnknownLayer(id))?;
        layer.is_visible = !layer.is_visible;
        Ok(layer.is_visible)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> Result<(), EditError> {
        let layer = self.layer_mut(id).ok_or(EditError::UnknownLayer(id))?;
        layer.name = name.into();
        Ok(())
    }

    /// Remove drawables from a layer and queue their meshes for release.
    /// Returns the removed drawables (without meshes) in layer order, each
    /// paired with its index before removal.
    pub fn remove_drawables(
        &mut self,
        layer_id: LayerId,
        ids: &[DrawableId],
    ) -> Vec<(usize, Drawable)> {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(layer.drawables.len());
        for (index, mut drawable) in layer.drawables.drain(..).enumerate() {
            if ids.contains(&drawable.id()) {
                self.retired.extend(drawable.take_mesh());
                removed.push((index, drawable));
            } else {
                kept.push(drawable);
            }
        }
        layer.drawables = kept;
        removed
    }

    /// Append drawables to a layer, skipping ids already present.
    /// Returns how many were inserted.
    pub fn insert_drawables(&mut self, layer_id: LayerId, drawables: Vec<Drawable>) -> usize {
        let Some(layer) = self.layer_mut(layer_id) else {
            return 0;
        };
        let mut inserted = 0;
        for drawable in drawables {
            match layer.push(drawable) {
                Ok(()) => inserted += 1,
                Err(duplicate) => log::warn!("Drawable {} already on layer", duplicate.id()),
            }
        }
        inserted
    }

    /// Put removed drawables back at their recorded indices, lowest first,
    /// so the layer regains its original order. Ids already present are
    /// skipped. Returns how many were restored.
    pub fn restore_drawables(
        &mut self,
        layer_id: LayerId,
        mut drawables: Vec<(usize, Drawable)>,
    ) -> usize {
        let Some(layer) = self.layer_mut(layer_id) else {
            return 0;
        };
        drawables.sort_by_key(|(index, _)| *index);
        let mut restored = 0;
        for (index, drawable) in drawables {
            match layer.insert(index, drawable) {
                Ok(()) => restored += 1,
                Err(duplicate) => log::warn!("Drawable {} already on layer", duplicate.id()),
            }
        }
        restored
    }

    /// Replace drawables in place by id, retiring the replaced meshes.
    /// Drawables whose id is not in the layer are ignored.
    pub fn replace_drawables(&mut self, layer_id: LayerId, drawables: Vec<Drawable>) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            return;
        };
        for drawable in drawables {
            if let Some(mut old) = layer.replace(drawable) {
                self.retired.extend(old.take_mesh());
            }
        }
    }

    /// Queue a mesh handle for release at the start of the next tick.
    pub fn retire_mesh(&mut self, drawable: &mut Drawable) {
        self.retired.extend(drawable.take_mesh());
    }

    /// Drain the handles retired since the last call.
    pub fn take_retired(&mut self) -> Vec<MeshHandle> {
        std::mem::take(&mut self.retired)
    }

    /// Split borrow used by the render tick: layers plus retired handles.
    pub fn render_parts(&mut self) -> (&mut [Layer], Vec<MeshHandle>) {
        let retired = std::mem::take(&mut self.retired);
        (&mut self.layers, retired)
    }

    /// Bounds of all drawables on visible layers.
    pub fn content_bounds(&self) -> Option<Rect> {
        union_bounds(
            self.layers
                .iter()
                .filter(|l| l.is_visible)
                .flat_map(|l| l.drawables.iter()),
        )
    }

    /// Total number of drawables across layers.
    pub fn drawable_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    pub fn view(&self) -> ViewTransform {
        ViewTransform::new(self.pan_offset, self.scale)
    }

    pub fn set_view(&mut self, view: ViewTransform) {
        self.pan_offset = view.pan;
        self.scale = view.scale;
    }

    /// Serialize the canvas record to JSON. Meshes are never included.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a canvas record, repairing anything corrupt instead of failing.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => Self::from_value(value),
            Err(err) => {
                log::warn!("Canvas record is not valid JSON ({err}); starting empty");
                Self::new()
            }
        }
    }

    /// Repairing load from a parsed JSON value.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut root) = value else {
            log::warn!("Canvas record is not an object; starting empty");
            return Self::new();
        };

        let mut layers = Vec::new();
        let mut layer_ids = HashSet::new();
        match root.remove("layers") {
            Some(Value::Array(entries)) => {
                for (index, entry) in entries.into_iter().enumerate() {
                    if let Some(mut layer) = repair_layer(entry, index) {
                        if !layer_ids.insert(layer.id) {
                            log::warn!("Duplicate layer id {}; assigning a new one", layer.id);
                            layer.id = Uuid::new_v4();
                            layer_ids.insert(layer.id);
                        }
                        layers.push(layer);
                    }
                }
            }
            _ => {
                // Legacy records kept a flat stroke list at the root.
                log::warn!("Canvas record has no layers; creating a default layer");
                let mut layer = Layer::new("Layer 1");
                if let Some(Value::Array(strokes)) = root.remove("strokes") {
                    layer.drawables = repair_drawables(strokes);
                }
                layers.push(layer);
            }
        }
        if layers.is_empty() {
            log::warn!("Canvas record has an empty layer list; creating a default layer");
            layers.push(Layer::new("Layer 1"));
        }

        let active_layer_id = root
            .get("activeLayerId")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .filter(|id| layers.iter().any(|l| l.id == *id))
            .unwrap_or_else(|| {
                log::warn!("Invalid activeLayerId; falling back to the first layer");
                layers[0].id
            });

        let pan_offset = root
            .get("panOffset")
            .and_then(|v| Some(Vec2::new(v.get("x")?.as_f64()?, v.get("y")?.as_f64()?)))
            .filter(|v| v.is_finite())
            .unwrap_or(Vec2::ZERO);

        let scale = match root.get("scale").and_then(Value::as_f64) {
            Some(scale) if scale.is_finite() && scale > 0.0 => clamp_scale(scale),
            _ => {
                log::warn!("Invalid scale in canvas record; resetting to 1");
                1.0
            }
        };

        Self {
            layers,
            active_layer_id,
            pan_offset,
            scale,
            retired: Vec::new(),
        }
    }
}

fn repair_layer(value: Value, index: usize) -> Option<Layer> {
    let Value::Object(mut fields) = value else {
        log::warn!("Dropping malformed layer at index {index}");
        return None;
    };

    let id = fields
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let name = fields
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Layer {}", index + 1));
    let is_visible = fields
        .get("isVisible")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let drawables = match fields.remove("strokes") {
        Some(Value::Array(entries)) => repair_drawables(entries),
        _ => Vec::new(),
    };

    Some(Layer {
        id,
        name,
        is_visible,
        drawables,
    })
}

/// Deserialize drawables one by one, dropping malformed entries and
/// duplicate ids.
fn repair_drawables(entries: Vec<Value>) -> Vec<Drawable> {
    let mut seen = HashSet::new();
    let mut drawables = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Drawable>(entry) {
            Ok(drawable) if seen.insert(drawable.id()) => drawables.push(drawable),
            Ok(drawable) => log::warn!("Dropping duplicate drawable {}", drawable.id()),
            Err(err) => log::warn!("Dropping malformed drawable: {err}"),
        }
    }
    drawables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::{SerializableColor, Stroke};
    use crate::mesh::MeshState;
    use crate::tessellate::tessellate;
    use kurbo::Point;
    use serde_json::json;

    fn stroke_at(x: f64) -> Drawable {
        Drawable::stroke(Stroke::new(
            vec![Point::new(x, 0.0), Point::new(x + 10.0, 5.0), Point::new(x + 20.0, 0.0)],
            SerializableColor::new(10, 20, 30, 255),
            3.0,
        ))
    }

    #[test]
    fn test_new_canvas_has_active_layer() {
        let canvas = Canvas::new();
        assert_eq!(canvas.layers().len(), 1);
        assert_eq!(canvas.active_layer().id, canvas.active_layer_id());
    }

    #[test]
    fn test_layer_push_rejects_duplicate_id() {
        let mut layer = Layer::new("Test");
        let drawable = stroke_at(0.0);
        let copy = drawable.snapshot();
        assert!(layer.push(drawable).is_ok());
        assert!(layer.push(copy).is_err());
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn test_remove_layer_keeps_one() {
        let mut canvas = Canvas::new();
        let first = canvas.active_layer_id();
        assert_eq!(canvas.remove_layer(first), Err(EditError::LastLayer));

        let second = canvas.add_layer("Layer 2");
        assert_eq!(canvas.active_layer_id(), second);
        assert!(canvas.remove_layer(second).is_ok());
        assert_eq!(canvas.active_layer_id(), first);

        let unknown = Uuid::new_v4();
        assert_eq!(canvas.remove_layer(unknown), Err(EditError::UnknownLayer(unknown)));
    }

    #[test]
    fn test_remove_drawables_retires_meshes() {
        let mut canvas = Canvas::new();
        let layer_id = canvas.active_layer_id();
        let mut drawable = stroke_at(0.0);
        *drawable.mesh_mut() = MeshState::Built(MeshHandle::from_raw(11));
        let id = drawable.id();
        canvas.active_layer_mut().push(drawable).unwrap();
        canvas.active_layer_mut().push(stroke_at(50.0)).unwrap();

        let removed = canvas.remove_drawables(layer_id, &[id]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, 0);
        assert!(removed[0].1.mesh().is_absent());
        assert_eq!(canvas.active_layer().len(), 1);
        assert_eq!(canvas.take_retired(), vec![MeshHandle::from_raw(11)]);
        assert!(canvas.take_retired().is_empty());
    }

    #[test]
    fn test_toggle_visibility_hides_from_content_bounds() {
        let mut canvas = Canvas::new();
        let layer_id = canvas.active_layer_id();
        canvas.active_layer_mut().push(stroke_at(0.0)).unwrap();
        assert!(canvas.content_bounds().is_some());

        assert_eq!(canvas.toggle_layer_visibility(layer_id), Ok(false));
        assert!(canvas.content_bounds().is_none());
    }

    #[test]
    fn test_json_roundtrip_reproduces_meshes() {
        let mut canvas = Canvas::new();
        let mut drawable = stroke_at(0.0);
        *drawable.mesh_mut() = MeshState::Built(MeshHandle::from_raw(4));
        let before = tessellate(&drawable);
        canvas.active_layer_mut().push(drawable).unwrap();
        canvas.pan_offset = Vec2::new(12.0, -4.0);
        canvas.scale = 2.0;

        let json = canvas.to_json().unwrap();
        assert!(!json.contains("mesh"));
        let loaded = Canvas::from_json(&json);

        assert_eq!(loaded.layers(), canvas.layers());
        assert_eq!(loaded.active_layer_id(), canvas.active_layer_id());
        assert_eq!(loaded.pan_offset, canvas.pan_offset);
        let restored = &loaded.active_layer().drawables()[0];
        assert!(restored.mesh().is_absent());
        assert_eq!(tessellate(restored), before);
    }

    #[test]
    fn test_record_field_names() {
        let canvas = Canvas::new();
        let value = serde_json::to_value(&canvas).unwrap();
        assert!(value["activeLayerId"].is_string());
        assert!(value["panOffset"]["x"].is_number());
        assert!(value["layers"][0]["isVisible"].as_bool().unwrap());
        assert!(value["layers"][0]["strokes"].is_array());
    }

    #[test]
    fn test_repair_missing_layers() {
        let canvas = Canvas::from_value(json!({ "scale": 1.5 }));
        assert_eq!(canvas.layers().len(), 1);
        assert_eq!(canvas.layers()[0].name, "Layer 1");
        assert!((canvas.scale - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_repair_invalid_active_layer_and_scale() {
        let layer_id = Uuid::new_v4();
        let canvas = Canvas::from_value(json!({
            "layers": [{
                "id": layer_id.to_string(),
                "name": "Ink",
                "isVisible": true,
                "strokes": []
            }],
            "activeLayerId": "not-a-layer",
            "scale": -3.0
        }));
        assert_eq!(canvas.active_layer_id(), layer_id);
        assert!((canvas.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_repair_drops_malformed_and_duplicate_drawables() {
        let good = stroke_at(0.0);
        let good_value = serde_json::to_value(&good).unwrap();
        let canvas = Canvas::from_value(json!({
            "layers": [{
                "id": Uuid::new_v4().to_string(),
                "name": "Ink",
                "isVisible": true,
                "strokes": [
                    good_value.clone(),
                    { "id": Uuid::new_v4().to_string(), "type": "stroke", "color": "#000000" },
                    { "type": "shape", "kind": "hexagon" },
                    good_value
                ]
            }]
        }));
        let layer = &canvas.layers()[0];
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.drawables()[0], good);
    }

    #[test]
    fn test_repair_garbage_input() {
        assert_eq!(Canvas::from_json("{{not json").layers().len(), 1);
        assert_eq!(Canvas::from_value(json!([1, 2, 3])).layers().len(), 1);
        assert_eq!(Canvas::from_value(json!({ "layers": [] })).layers().len(), 1);
    }

    #[test]
    fn test_legacy_flat_strokes_are_adopted() {
        let stroke = serde_json::to_value(stroke_at(0.0)).unwrap();
        let canvas = Canvas::from_value(json!({ "strokes": [stroke] }));
        assert_eq!(canvas.active_layer().len(), 1);
    }
}
