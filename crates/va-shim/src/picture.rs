//! `BeginPicture` / `RenderPicture` / `EndPicture`: the per-frame
//! submission path.
//!
//! `RenderPicture` walks the buffer-id array the consumer hands in and
//! dispatches on each buffer's declared type — picture-parameters update
//! the assembler's cached headers, slice-parameters latch byte ranges,
//! slice-data consumes those ranges and appends framed NALs to the
//! picture's assembly buffer. `EndPicture` hands the finished bitstream
//! to the context's `m2m::Session`.

use std::os::raw::c_int;
use std::slice;

use headers::h264::PictureParamsH264;
use headers::hevc::PictureParamsHevc;

use crate::context::Context;
use crate::driver::DriverState;
use crate::format::Codec;
use crate::status::{
    self, VAStatus, VA_STATUS_ERROR_INVALID_BUFFER, VA_STATUS_ERROR_INVALID_CONTEXT,
    VA_STATUS_ERROR_INVALID_PARAMETER, VA_STATUS_ERROR_INVALID_SURFACE, VA_STATUS_SUCCESS,
};
use crate::types::{
    VABufferID, VAContextID, VADriverContextP, VASurfaceID, VA_PICTURE_PARAMETER_BUFFER_TYPE,
    VA_SLICE_DATA_BUFFER_TYPE, VA_SLICE_PARAMETER_BUFFER_TYPE,
};
use crate::va_params::{
    parse_fixed, parse_slice_ranges, RawPictureParameterBufferH264, RawPictureParameterBufferHevc,
};

/// # Safety
/// `ctx` must point at a live `VADriverContext` produced by this driver.
pub unsafe extern "C" fn va_begin_picture(
    ctx: VADriverContextP,
    context: VAContextID,
    render_target: VASurfaceID,
) -> VAStatus {
    let state = DriverState::from_ctx(ctx);
    if !state.surfaces.contains(render_target) {
        return VA_STATUS_ERROR_INVALID_SURFACE;
    }

    // Surface re-use (spec §3 invariant (i), §8 scenario 5): if this
    // surface already owns a decoded output buffer from a previous
    // picture, release it back to the kernel's free list before this
    // picture's slices start building the next bitstream.
    let previous_binding = state
        .surfaces
        .with_mut(render_target, |s| s.take_previous_binding())
        .flatten();
    if let Some(index) = previous_binding {
        let requeued = state
            .contexts
            .with(context, |c| c.session.lock().unwrap().requeue_output(index));
        match requeued {
            Some(Ok(())) => {}
            Some(Err(e)) => return status::from_m2m_error(e),
            None => return VA_STATUS_ERROR_INVALID_CONTEXT,
        }
    }

    match state.contexts.with(context, |c| c.begin_picture(render_target)) {
        Some(()) => VA_STATUS_SUCCESS,
        None => VA_STATUS_ERROR_INVALID_CONTEXT,
    }
}

/// Decodes a picture-parameter buffer's raw bytes for `c`'s codec and
/// feeds them to the cached-header assembler. Buffers that don't decode
/// to the expected fixed size are silently ignored — a malformed buffer
/// leaves the previously cached headers in place rather than corrupting
/// state.
fn apply_picture_params(c: &Context, data: &[u8]) {
    match c.codec {
        Codec::H264 => {
            if let Some(raw) = parse_fixed::<RawPictureParameterBufferH264>(data) {
                let params: PictureParamsH264 = raw.into();
                let _ = c.assembler.lock().unwrap().handle_h264_picture_params(&params);
            }
        }
        Codec::Hevc => {
            if let Some(raw) = parse_fixed::<RawPictureParameterBufferHevc>(data) {
                let params: PictureParamsHevc = raw.into();
                let _ = c.assembler.lock().unwrap().handle_hevc_picture_params(&params);
            }
        }
        Codec::Vp8 | Codec::Vp9 | Codec::Av1 => {}
    }
}

/// # Safety
/// `ctx` must point at a live `VADriverContext`; `buffers` must be valid
/// for `num_buffers` reads of `VABufferID`.
pub unsafe extern "C" fn va_render_picture(
    ctx: VADriverContextP,
    context: VAContextID,
    buffers: *mut VABufferID,
    num_buffers: c_int,
) -> VAStatus {
    if buffers.is_null() || num_buffers < 0 {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    let ids = slice::from_raw_parts(buffers, num_buffers as usize);

    let outcome = state.contexts.with(context, |c| {
        for &buf_id in ids {
            let dispatched = state.buffers.with(buf_id, |buf| match buf.buf_type {
                VA_PICTURE_PARAMETER_BUFFER_TYPE => apply_picture_params(c, &buf.data),
                VA_SLICE_PARAMETER_BUFFER_TYPE => {
                    *c.latched_slices.lock().unwrap() = parse_slice_ranges(&buf.data);
                }
                VA_SLICE_DATA_BUFFER_TYPE => {
                    let ranges = std::mem::take(&mut *c.latched_slices.lock().unwrap());
                    for range in ranges {
                        c.append_slice(&buf.data, range);
                    }
                }
                _ => {}
            });
            if dispatched.is_none() {
                return VA_STATUS_ERROR_INVALID_BUFFER;
            }
        }
        VA_STATUS_SUCCESS
    });

    outcome.unwrap_or(VA_STATUS_ERROR_INVALID_CONTEXT)
}

/// # Safety
/// `ctx` must point at a live `VADriverContext` produced by this driver.
pub unsafe extern "C" fn va_end_picture(ctx: VADriverContextP, context: VAContextID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);

    let target = match state.contexts.with(context, |c| *c.render_target.lock().unwrap()) {
        Some(Some(id)) => id,
        Some(None) => return VA_STATUS_ERROR_INVALID_PARAMETER,
        None => return VA_STATUS_ERROR_INVALID_CONTEXT,
    };

    let result = state
        .contexts
        .with(context, |c| state.surfaces.with_mut(target, |surface| c.end_picture(context, surface)));

    match result {
        Some(Some(Ok(()))) => VA_STATUS_SUCCESS,
        Some(Some(Err(e))) => status::from_m2m_error(e),
        Some(None) => VA_STATUS_ERROR_INVALID_SURFACE,
        None => VA_STATUS_ERROR_INVALID_CONTEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picture_param_buffer_of_wrong_size_is_ignored_not_parsed() {
        // A truncated buffer must not be reinterpreted; `parse_fixed`
        // returning `None` is the only contract `apply_picture_params`
        // relies on here.
        let short = [0u8; 3];
        assert!(parse_fixed::<RawPictureParameterBufferH264>(&short).is_none());
    }
}
