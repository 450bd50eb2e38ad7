//! `ExportSurfaceHandle`: zero-copy dma-buf/DRM-prime descriptor export,
//! per §4.D "Descriptor export" — one memory object sized `W·H·3/2`,
//! two layers (8-bit Y at offset 0, two-channel UV at offset `W·H`).

use crate::driver::DriverState;
use crate::status::{
    self, VAStatus, VA_STATUS_ERROR_INVALID_CONTEXT, VA_STATUS_ERROR_INVALID_SURFACE, VA_STATUS_SUCCESS,
};
use crate::types::{VADriverContextP, VADrmPrimeLayer, VADrmPrimeObject, VADrmPrimeSurfaceDescriptor, VASurfaceID};

/// NV12 fourcc as DRM uses it (little-endian `'N','V','1','2'`), distinct
/// from the V4L2 pixel-format constant this driver uses on its kernel
/// side — the descriptor handed to the consumer speaks DRM's vocabulary.
const DRM_FORMAT_NV12: u32 = u32::from_le_bytes(*b"NV12");

/// # Safety
/// `ctx` must point at a live `VADriverContext`; `descriptor` must be
/// valid for one `VADrmPrimeSurfaceDescriptor` write.
pub unsafe extern "C" fn va_export_surface_handle(
    ctx: VADriverContextP,
    surface: VASurfaceID,
    _mem_type: u32,
    _flags: u32,
    descriptor: *mut VADrmPrimeSurfaceDescriptor,
) -> VAStatus {
    if descriptor.is_null() {
        return VA_STATUS_ERROR_INVALID_SURFACE;
    }
    let state = DriverState::from_ctx(ctx);

    let (width, height, owning_context) = match state.surfaces.with(surface, |s| (s.width, s.height, s.owning_context)) {
        Some(v) => v,
        None => return VA_STATUS_ERROR_INVALID_SURFACE,
    };
    let Some(context_id) = owning_context else {
        return VA_STATUS_ERROR_INVALID_SURFACE;
    };

    let result = state.contexts.with(context_id, |c| {
        state.surfaces.with(surface, |s| {
            let index = s.bound_buffer_index().unwrap_or(0);
            c.session.lock().unwrap().export_output_buffer(index)
        })
    });

    let fd = match result {
        Some(Some(Ok(fd))) => fd,
        Some(Some(Err(e))) => return status::from_m2m_error(e),
        Some(None) => return VA_STATUS_ERROR_INVALID_SURFACE,
        None => return VA_STATUS_ERROR_INVALID_CONTEXT,
    };

    state.surfaces.with_mut(surface, |s| s.exported_fd = Some(fd));

    let size = (width as u64) * (height as u64) * 3 / 2;
    let mut desc = VADrmPrimeSurfaceDescriptor {
        fourcc: DRM_FORMAT_NV12,
        width,
        height,
        num_objects: 1,
        objects: Default::default(),
        num_layers: 2,
        layers: Default::default(),
    };
    desc.objects[0] = VADrmPrimeObject {
        fd,
        size: size as u32,
        drm_format_modifier: 0, // linear
    };
    desc.layers[0] = VADrmPrimeLayer {
        drm_format: u32::from_le_bytes(*b"R8  "),
        num_planes: 1,
        object_index: [0, 0, 0, 0],
        offset: [0, 0, 0, 0],
        pitch: [width, 0, 0, 0],
    };
    desc.layers[1] = VADrmPrimeLayer {
        drm_format: u32::from_le_bytes(*b"GR88"),
        num_planes: 1,
        object_index: [0, 0, 0, 0],
        offset: [width * height, 0, 0, 0],
        pitch: [width, 0, 0, 0],
    };

    *descriptor = desc;
    VA_STATUS_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_fourcc_is_well_known_drm_code() {
        assert_eq!(DRM_FORMAT_NV12, 0x3231_564E);
    }
}
