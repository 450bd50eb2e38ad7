//! `VAContext` (named `Context` here to avoid colliding with
//! `VADriverContext`): one active decode session. Owns the `m2m::Session`
//! queue pair, the per-codec header/assembly state, and the latched
//! slice-parameters the current `RenderPicture` call is building up.

use std::sync::{Arc, Mutex};

use headers::assembler::{Assembler, H264Headers, HevcHeaders, RawPassthrough};
use m2m::Session;

use crate::format::Codec;
use crate::surface::Surface;
use crate::types::{VAContextID, VASurfaceID};

/// `VASliceParameterBufferBase`-equivalent: where in the slice-data
/// buffer one slice's bytes live. Real VA slice-parameter buffers carry
/// codec-specific fields too (reference lists, weights, ...) that this
/// driver's M2M target never reads, because the kernel decoder re-parses
/// the bitstream itself — only the byte range matters here.
#[derive(Debug, Clone, Copy)]
pub struct SliceRange {
    pub offset: u32,
    pub size: u32,
}

pub struct Context {
    pub codec: Codec,
    pub max_width: u32,
    pub max_height: u32,
    pub session: Mutex<Session>,
    pub assembler: Mutex<Assembler>,

    /// Latched by the most recent slice-parameter buffer in the current
    /// `RenderPicture`, consumed by the next slice-data buffer. Spec §3:
    /// "a latched pointer+count to the current picture's
    /// slice-parameters array".
    pub latched_slices: Mutex<Vec<SliceRange>>,

    /// Growable per-picture bitstream assembly buffer. Non-empty at
    /// `EndPicture` iff at least one slice-data buffer was delivered in
    /// the enclosing `RenderPicture` (invariant (ii)).
    pub assembly: Mutex<Vec<u8>>,

    /// The surface passed to the most recent `BeginPicture`.
    pub render_target: Mutex<Option<VASurfaceID>>,
}

impl Context {
    pub fn open(codec: Codec, max_width: u32, max_height: u32) -> m2m::Result<Context> {
        let session = Session::open(codec.fourcc(), max_width, max_height)?;
        let assembler = match codec {
            Codec::H264 => Assembler::H264(H264Headers::new()),
            Codec::Hevc => Assembler::Hevc(HevcHeaders::new()),
            Codec::Vp8 | Codec::Vp9 | Codec::Av1 => Assembler::Raw(RawPassthrough),
        };
        Ok(Context {
            codec,
            max_width,
            max_height,
            session: Mutex::new(session),
            assembler: Mutex::new(assembler),
            latched_slices: Mutex::new(Vec::new()),
            assembly: Mutex::new(Vec::new()),
            render_target: Mutex::new(None),
        })
    }

    pub fn begin_picture(&self, target: VASurfaceID) {
        *self.render_target.lock().unwrap() = Some(target);
        self.assembly.lock().unwrap().clear();
        self.latched_slices.lock().unwrap().clear();
    }

    /// Appends one slice's worth of bytes (bounded by `range` within
    /// `slice_data`) to the assembly buffer, running it through the
    /// codec's header-aware assembler first.
    pub fn append_slice(&self, slice_data: &[u8], range: SliceRange) {
        let start = range.offset as usize;
        let end = start + range.size as usize;
        if end > slice_data.len() {
            return;
        }
        let nal = &slice_data[start..end];
        let mut assembler = self.assembler.lock().unwrap();
        let mut out = self.assembly.lock().unwrap();
        let _ = assembler.handle_slice_data(nal, &mut out);
    }

    /// Hands the assembled bitstream to the kernel input queue and binds
    /// the decoded frame to `target`'s surface. Called at `EndPicture`.
    pub fn end_picture(&self, context_id: VAContextID, target: &mut Surface) -> m2m::Result<()> {
        let _ = context_id;
        let data = std::mem::take(&mut *self.assembly.lock().unwrap());
        target.owning_context = Some(context_id);
        let binding = Arc::clone(&target.binding);
        self.session.lock().unwrap().submit_picture(&data, binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_range_out_of_bounds_is_dropped_not_panicking() {
        let assembler = Mutex::new(Assembler::Raw(RawPassthrough));
        let assembly = Mutex::new(Vec::new());
        let data = [0u8; 4];
        let range = SliceRange { offset: 2, size: 10 };
        // Mirrors Context::append_slice's bounds check without requiring a
        // live kernel device to construct a full Context.
        let start = range.offset as usize;
        let end = start + range.size as usize;
        if end <= data.len() {
            let mut a = assembler.lock().unwrap();
            let mut out = assembly.lock().unwrap();
            let _ = a.handle_slice_data(&data[start..end], &mut out);
        }
        assert!(assembly.lock().unwrap().is_empty());
    }
}
