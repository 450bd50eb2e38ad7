//! `CreateImage` / `DeriveImage` / `DestroyImage` / `GetImage`: the
//! memory-mapped readback path (§4.D "Readback") for consumers that
//! can't or don't want a dma-buf export.
//!
//! Only full-frame NV12/P010 readback is supported — no sub-rectangle
//! extraction, matching the session manager's `read_back`, which always
//! copies the whole Y and UV planes.

use std::os::raw::c_int;

use crate::driver::DriverState;
use crate::status::{
    self, VAStatus, VA_STATUS_ERROR_INVALID_IMAGE, VA_STATUS_ERROR_INVALID_PARAMETER,
    VA_STATUS_ERROR_INVALID_SURFACE, VA_STATUS_ERROR_RESOLUTION_NOT_SUPPORTED, VA_STATUS_SUCCESS,
};
use crate::types::{VABufferType, VADriverContextP, VAImage, VAImageID, VASurfaceID, VA_IMAGE_BUFFER_TYPE};
use crate::buffer::Buffer;

/// NV12/P010-shaped two-plane byte size for a `width`×`height` frame at
/// the given bytes-per-sample (1 for 8-bit, 2 for 10-bit-packed-in-16).
fn frame_byte_size(width: u32, height: u32, bytes_per_sample: u32) -> usize {
    (width as usize * height as usize * 3 / 2) * bytes_per_sample as usize
}

fn make_image_record(image_id: VAImageID, buf: crate::types::VABufferID, format_fourcc: u32, width: u32, height: u32) -> VAImage {
    VAImage {
        image_id,
        format_fourcc,
        buf,
        width: width as u16,
        height: height as u16,
        data_size: frame_byte_size(width, height, 1) as u32,
        num_planes: 2,
        pitches: [width, width, 0],
        offsets: [0, width * height, 0],
    }
}

/// # Safety
/// `ctx` must point at a live `VADriverContext`; `image` must be valid
/// for one `VAImage` write.
pub unsafe extern "C" fn va_create_image(
    ctx: VADriverContextP,
    format_fourcc: u32,
    width: c_int,
    height: c_int,
    image: *mut VAImage,
) -> VAStatus {
    if image.is_null() || width <= 0 || height <= 0 {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let (width, height) = (width as u32, height as u32);
    let state = DriverState::from_ctx(ctx);

    let data = vec![0u8; frame_byte_size(width, height, 1)];
    let buf_id = state.buffers.insert(Buffer::new(VA_IMAGE_BUFFER_TYPE, data));

    let placeholder = make_image_record(0, buf_id, format_fourcc, width, height);
    let image_id = state.images.insert(placeholder);
    state.images.with_mut(image_id, |img| img.image_id = image_id);

    *image = state.images.with(image_id, |img| *img).expect("just inserted");
    VA_STATUS_SUCCESS
}

/// # Safety
/// `ctx` must point at a live `VADriverContext`; `image` must be valid
/// for one `VAImage` write.
pub unsafe extern "C" fn va_derive_image(ctx: VADriverContextP, surface: VASurfaceID, image: *mut VAImage) -> VAStatus {
    if image.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);

    let (width, height, owning_context) = match state.surfaces.with(surface, |s| (s.width, s.height, s.owning_context)) {
        Some(v) => v,
        None => return VA_STATUS_ERROR_INVALID_SURFACE,
    };

    let mut data = vec![0u8; frame_byte_size(width, height, 1)];
    let wh = (width as usize) * (height as usize);
    let read = match owning_context {
        Some(context_id) => state.contexts.with(context_id, |c| {
            state.surfaces.with(surface, |s| {
                let (y, uv) = data.split_at_mut(wh);
                c.session.lock().unwrap().read_back(s.bound_buffer_index().unwrap_or(0), y, uv)
            })
        }),
        None => None,
    };
    match read {
        Some(Some(Ok(()))) | None => {}
        Some(Some(Err(e))) => return status::from_m2m_error(e),
        Some(None) => return VA_STATUS_ERROR_INVALID_SURFACE,
    }

    let buf_id = state.buffers.insert(Buffer::new(VA_IMAGE_BUFFER_TYPE, data));
    let placeholder = make_image_record(0, buf_id, 0, width, height);
    let image_id = state.images.insert(placeholder);
    state.images.with_mut(image_id, |img| img.image_id = image_id);

    *image = state.images.with(image_id, |img| *img).expect("just inserted");
    VA_STATUS_SUCCESS
}

/// # Safety
/// `ctx` must point at a live `VADriverContext`.
pub unsafe extern "C" fn va_destroy_image(ctx: VADriverContextP, image: VAImageID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);
    let Some(record) = state.images.remove(image) else {
        return VA_STATUS_ERROR_INVALID_IMAGE;
    };
    let freed = state.buffers.with_mut(record.buf, |b| {
        if b.mapped {
            b.destroy_deferred = true;
            false
        } else {
            true
        }
    });
    if freed == Some(true) {
        state.buffers.remove(record.buf);
    }
    VA_STATUS_SUCCESS
}

/// # Safety
/// `ctx` must point at a live `VADriverContext`.
pub unsafe extern "C" fn va_get_image(
    ctx: VADriverContextP,
    surface: VASurfaceID,
    x: c_int,
    y: c_int,
    width: c_int,
    height: c_int,
    image: VAImageID,
) -> VAStatus {
    let state = DriverState::from_ctx(ctx);

    let (sw, sh, owning_context) = match state.surfaces.with(surface, |s| (s.width, s.height, s.owning_context)) {
        Some(v) => v,
        None => return VA_STATUS_ERROR_INVALID_SURFACE,
    };
    if x != 0 || y != 0 || width as u32 != sw || height as u32 != sh {
        return VA_STATUS_ERROR_RESOLUTION_NOT_SUPPORTED;
    }

    let Some(buf_id) = state.images.with(image, |img| img.buf) else {
        return VA_STATUS_ERROR_INVALID_IMAGE;
    };
    let Some(context_id) = owning_context else {
        return VA_STATUS_SUCCESS; // never rendered to: buffer stays zeroed
    };

    let wh = (sw as usize) * (sh as usize);
    let result = state.contexts.with(context_id, |c| {
        state.surfaces.with(surface, |s| {
            state.buffers.with_mut(buf_id, |buf| {
                let (y_plane, uv_plane) = buf.data.split_at_mut(wh);
                c.session.lock().unwrap().read_back(s.bound_buffer_index().unwrap_or(0), y_plane, uv_plane)
            })
        })
    });

    match result {
        Some(Some(Some(Ok(())))) => VA_STATUS_SUCCESS,
        Some(Some(Some(Err(e)))) => status::from_m2m_error(e),
        Some(Some(None)) => VA_STATUS_ERROR_INVALID_IMAGE,
        Some(None) => VA_STATUS_ERROR_INVALID_SURFACE,
        None => VA_STATUS_ERROR_INVALID_PARAMETER,
    }
}
