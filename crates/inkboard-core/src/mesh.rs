//! Per-drawable mesh residency state.

/// Opaque handle to a device mesh owned by a [`crate::gpu::BufferManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(u64);

impl MeshHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Mesh cache state attached to every drawable.
///
/// Only the buffer manager moves a drawable into `Built`. Everything else may
/// only invalidate (`Built` -> `Stale`) or detach the handle for release.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum MeshState {
    /// No device resource.
    #[default]
    Absent,
    /// A device resource exists but no longer matches the geometry.
    Stale(MeshHandle),
    /// A device resource matching the current geometry.
    Built(MeshHandle),
}

/// A cloned drawable is a new object and never shares device buffers.
impl Clone for MeshState {
    fn clone(&self) -> Self {
        MeshState::Absent
    }
}

impl MeshState {
    pub fn is_absent(&self) -> bool {
        matches!(self, MeshState::Absent)
    }

    /// Whether the buffer manager has to (re)build this mesh.
    pub fn needs_build(&self) -> bool {
        !matches!(self, MeshState::Built(_))
    }

    pub fn handle(&self) -> Option<MeshHandle> {
        match self {
            MeshState::Absent => None,
            MeshState::Stale(h) | MeshState::Built(h) => Some(*h),
        }
    }

    pub fn invalidate(&mut self) {
        if let MeshState::Built(h) = *self {
            *self = MeshState::Stale(h);
        }
    }

    /// Detach the handle, leaving `Absent`.
    pub fn take(&mut self) -> Option<MeshHandle> {
        std::mem::take(self).handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_only_touches_built() {
        let mut state = MeshState::Absent;
        state.invalidate();
        assert!(state.is_absent());

        let mut state = MeshState::Built(MeshHandle::from_raw(2));
        state.invalidate();
        assert_eq!(state, MeshState::Stale(MeshHandle::from_raw(2)));
        assert!(state.needs_build());
    }

    #[test]
    fn test_take_detaches() {
        let mut state = MeshState::Stale(MeshHandle::from_raw(9));
        assert_eq!(state.take(), Some(MeshHandle::from_raw(9)));
        assert!(state.is_absent());
        assert_eq!(state.take(), None);
    }
}
