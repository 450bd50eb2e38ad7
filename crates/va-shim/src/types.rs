//! Opaque consumer-facing handle types and the small POD structs the
//! vtable signatures pass across the FFI boundary. Field order and naming
//! follow the public libva headers; trimmed to the subset this driver's
//! entry points actually touch.

use std::os::raw::{c_int, c_void};

use crate::objects::Id;

pub type VAStatus = c_int;
pub type VAGenericID = Id;
pub type VAConfigID = Id;
pub type VAContextID = Id;
pub type VASurfaceID = Id;
pub type VABufferID = Id;
pub type VAImageID = Id;

pub type VAProfile = c_int;
pub type VAEntrypoint = c_int;
pub type VABufferType = c_int;

pub const VA_INVALID_ID: VAGenericID = 0xFFFF_FFFF;

// VAProfile values this driver recognises (subset of the real enum).
pub const VA_PROFILE_H264_CONSTRAINED_BASELINE: VAProfile = 13;
pub const VA_PROFILE_H264_MAIN: VAProfile = 5;
pub const VA_PROFILE_H264_HIGH: VAProfile = 6;
pub const VA_PROFILE_HEVC_MAIN: VAProfile = 25;
pub const VA_PROFILE_HEVC_MAIN10: VAProfile = 26;
pub const VA_PROFILE_VP8_VERSION0_3: VAProfile = 20;
pub const VA_PROFILE_VP9_PROFILE0: VAProfile = 21;
pub const VA_PROFILE_VP9_PROFILE2: VAProfile = 23;

pub const VA_ENTRYPOINT_VLD: VAEntrypoint = 1;

// VARTFormat values `CreateSurfaces2` accepts: a bit-depth/chroma class,
// not a fourcc. Only the two this driver's surfaces actually use.
pub const VA_RT_FORMAT_YUV420: u32 = 0x0000_0001;
pub const VA_RT_FORMAT_YUV420_10: u32 = 0x0000_0100;

// VABufferType values this driver recognises.
pub const VA_PICTURE_PARAMETER_BUFFER_TYPE: VABufferType = 0;
pub const VA_SLICE_PARAMETER_BUFFER_TYPE: VABufferType = 2;
pub const VA_SLICE_DATA_BUFFER_TYPE: VABufferType = 3;
pub const VA_IMAGE_BUFFER_TYPE: VABufferType = 10;

// VASurfaceAttribType values `vaCreateSurfaces`' attribute-handling variant
// recognises; anything else is rejected with `VA_STATUS_ERROR_ATTR_NOT_SUPPORTED`.
pub const VA_SURFACE_ATTRIB_PIXEL_FORMAT: c_int = 1;
pub const VA_SURFACE_ATTRIB_MIN_WIDTH: c_int = 2;
pub const VA_SURFACE_ATTRIB_MAX_WIDTH: c_int = 3;
pub const VA_SURFACE_ATTRIB_MIN_HEIGHT: c_int = 4;
pub const VA_SURFACE_ATTRIB_MAX_HEIGHT: c_int = 5;
pub const VA_SURFACE_ATTRIB_MEMORY_TYPE: c_int = 6;
pub const VA_SURFACE_ATTRIB_USAGE_HINT: c_int = 8;

/// Flattened `VAGenericValue`: the real union carries an `i32`/`u32`/`f32`/
/// pointer payload tagged by `value_type`. This driver's only consumer
/// (`VASurfaceAttribPixelFormat`) ever needs the `ui` (fourcc) arm, so the
/// other arms are represented by the same 32-bit slot rather than mirroring
/// the full union layout (see `va_params.rs` for the same kind of
/// simplification applied to picture-parameter bitfields).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VAGenericValue {
    pub value_type: c_int,
    pub value: u32,
}

/// `VASurfaceAttrib`: one entry in the attribute list `vaCreateSurfaces`'s
/// attribute-handling variant accepts.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VASurfaceAttrib {
    pub attrib_type: c_int,
    pub flags: u32,
    pub value: VAGenericValue,
}

/// Per-driver private state, stashed behind `VADriverContext::pDriverData`.
/// Defined here (rather than in `driver.rs`) so `vtable.rs` can reference
/// it without a module cycle.
#[repr(C)]
pub struct VADriverContext {
    pub version_major: c_int,
    pub version_minor: c_int,
    pub max_profiles: c_int,
    pub max_entrypoints: c_int,
    pub max_image_formats: c_int,
    pub max_subpic_formats: c_int,
    pub max_display_attributes: c_int,
    pub driver_data: *mut c_void,
    pub vtable: *mut crate::vtable::VADriverVTable,
}

pub type VADriverContextP = *mut VADriverContext;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VARectangle {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VAImage {
    pub image_id: VAImageID,
    pub format_fourcc: u32,
    pub buf: VABufferID,
    pub width: u16,
    pub height: u16,
    pub data_size: u32,
    pub num_planes: u32,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
}

/// Layout returned by `ExportSurfaceHandle` for the driver's sole export
/// format (linux dma-buf / DRM-prime-style descriptor), per spec §4.D: one
/// memory object, two layers for NV12 (8-bit Y, 2-channel UV).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VADrmPrimeSurfaceDescriptor {
    pub fourcc: u32,
    pub width: u32,
    pub height: u32,
    pub num_objects: u32,
    pub objects: [VADrmPrimeObject; 4],
    pub num_layers: u32,
    pub layers: [VADrmPrimeLayer; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VADrmPrimeObject {
    pub fd: c_int,
    pub size: u32,
    pub drm_format_modifier: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VADrmPrimeLayer {
    pub drm_format: u32,
    pub num_planes: u32,
    pub object_index: [u32; 4],
    pub offset: [u32; 4],
    pub pitch: [u32; 4],
}
