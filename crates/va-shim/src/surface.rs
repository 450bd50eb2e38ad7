//! `VASurface`: the opaque consumer-visible handle for one decoded-frame
//! slot, and the binding logic that maps it onto an `m2m` output buffer.
//!
//! Surfaces carry their own mutex/condvar (reusing [`m2m::OutputBinding`]
//! directly — it already has exactly the decoded-flag-plus-condvar shape
//! spec §3 describes) and must never be locked while the owning session's
//! mutex is held, per §5.

use std::sync::Arc;

use m2m::OutputBinding;

use crate::types::VAContextID;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Nv12,
    /// 10-bit NV12-shaped layout (HEVC Main-10 / VP9 Profile-2).
    P010,
}

pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub binding: Arc<OutputBinding>,
    /// `None` until the surface has been used as a render target at least
    /// once.
    pub owning_context: Option<VAContextID>,
    /// Cached dma-buf fd from a prior `ExportSurfaceHandle` call on this
    /// surface, if any.
    pub exported_fd: Option<i32>,
}

impl Surface {
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        Surface {
            width,
            height,
            layout,
            binding: OutputBinding::new(),
            owning_context: None,
            exported_fd: None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        self.binding.state.lock().unwrap().decoded
    }

    pub fn bound_buffer_index(&self) -> Option<u32> {
        self.binding.state.lock().unwrap().buffer_index
    }

    /// Detaches this surface's current binding (a fresh one replaces it)
    /// and returns the previously-bound output-buffer index, if any, so
    /// the caller can recycle it back to the kernel before the surface is
    /// reused as a render target. Invariant (i): an output buffer is
    /// either queued to the kernel or owned by exactly one surface, never
    /// both — this is the moment ownership releases back to "queued".
    pub fn take_previous_binding(&mut self) -> Option<u32> {
        let previous = self.bound_buffer_index();
        self.binding = OutputBinding::new();
        self.exported_fd = None;
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_surface_is_not_decoded_and_unbound() {
        let s = Surface::new(640, 368, PixelLayout::Nv12);
        assert!(!s.is_decoded());
        assert_eq!(s.bound_buffer_index(), None);
    }

    #[test]
    fn reuse_clears_binding_and_returns_previous_index() {
        let mut s = Surface::new(640, 368, PixelLayout::Nv12);
        {
            let mut state = s.binding.state.lock().unwrap();
            state.buffer_index = Some(3);
            state.decoded = true;
        }
        let previous = s.take_previous_binding();
        assert_eq!(previous, Some(3));
        assert!(!s.is_decoded());
        assert_eq!(s.bound_buffer_index(), None);
    }
}
