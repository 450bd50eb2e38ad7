//! The upper-edge VA driver vtable: every slot must be populated (the
//! dispatcher rejects a null entry), but only the subset listed in spec
//! §6 does real work. Everything else points at [`unimplemented_entry`].
//!
//! Struct layout mirrors the shape of libva's `VADriverVTable` (grouped
//! roughly in the order the real header declares them); this driver does
//! not attempt byte-for-byte ABI compatibility with a specific libva
//! release, only the entry-point surface spec §6 names.

use std::os::raw::{c_char, c_int, c_void};

use crate::types::{
    VABufferID, VABufferType, VAContextID, VADriverContextP, VADrmPrimeSurfaceDescriptor,
    VAEntrypoint, VAGenericID, VAImage, VAImageID, VAProfile, VARectangle, VAStatus, VASurfaceAttrib,
    VASurfaceID,
};

pub type Terminate = unsafe extern "C" fn(ctx: VADriverContextP) -> VAStatus;

pub type QueryConfigProfiles =
    unsafe extern "C" fn(ctx: VADriverContextP, profile_list: *mut VAProfile, num_profiles: *mut c_int) -> VAStatus;
pub type QueryConfigEntrypoints = unsafe extern "C" fn(
    ctx: VADriverContextP,
    profile: VAProfile,
    entrypoint_list: *mut VAEntrypoint,
    num_entrypoints: *mut c_int,
) -> VAStatus;
pub type CreateConfig = unsafe extern "C" fn(
    ctx: VADriverContextP,
    profile: VAProfile,
    entrypoint: VAEntrypoint,
    config_id: *mut VAGenericID,
) -> VAStatus;
pub type DestroyConfig = unsafe extern "C" fn(ctx: VADriverContextP, config_id: VAGenericID) -> VAStatus;

/// The legacy, attribute-less surface-creation entry point: `format` here
/// is a `VA_RT_FORMAT_*` class, same as `CreateSurfaces2`'s, but there is no
/// attribute list — callers that don't need pixel-format overrides or
/// usage hints use this one.
pub type CreateSurfaces = unsafe extern "C" fn(
    ctx: VADriverContextP,
    width: c_int,
    height: c_int,
    format: c_int,
    num_surfaces: c_int,
    surfaces: *mut VASurfaceID,
) -> VAStatus;
/// The attribute-handling surface-creation entry point (spec §6: "surface
/// create/destroy (with the two variants differing only in attribute
/// handling)"). `attrib_list`/`num_attribs` is the only thing this adds
/// over [`CreateSurfaces`].
pub type CreateSurfaces2 = unsafe extern "C" fn(
    ctx: VADriverContextP,
    format: u32,
    width: u32,
    height: u32,
    surfaces: *mut VASurfaceID,
    num_surfaces: u32,
    attrib_list: *mut VASurfaceAttrib,
    num_attribs: u32,
) -> VAStatus;
pub type DestroySurfaces =
    unsafe extern "C" fn(ctx: VADriverContextP, surface_list: *mut VASurfaceID, num_surfaces: c_int) -> VAStatus;

pub type CreateContext = unsafe extern "C" fn(
    ctx: VADriverContextP,
    config_id: VAGenericID,
    picture_width: c_int,
    picture_height: c_int,
    flag: c_int,
    render_targets: *mut VASurfaceID,
    num_render_targets: c_int,
    context: *mut VAContextID,
) -> VAStatus;
pub type DestroyContext = unsafe extern "C" fn(ctx: VADriverContextP, context: VAContextID) -> VAStatus;

pub type CreateBuffer = unsafe extern "C" fn(
    ctx: VADriverContextP,
    context: VAContextID,
    buf_type: VABufferType,
    size: c_int,
    num_elements: c_int,
    data: *const c_void,
    buf_id: *mut VABufferID,
) -> VAStatus;
pub type MapBuffer =
    unsafe extern "C" fn(ctx: VADriverContextP, buf_id: VABufferID, pbuf: *mut *mut c_void) -> VAStatus;
pub type UnmapBuffer = unsafe extern "C" fn(ctx: VADriverContextP, buf_id: VABufferID) -> VAStatus;
pub type DestroyBuffer = unsafe extern "C" fn(ctx: VADriverContextP, buf_id: VABufferID) -> VAStatus;

pub type BeginPicture =
    unsafe extern "C" fn(ctx: VADriverContextP, context: VAContextID, render_target: VASurfaceID) -> VAStatus;
pub type RenderPicture = unsafe extern "C" fn(
    ctx: VADriverContextP,
    context: VAContextID,
    buffers: *mut VABufferID,
    num_buffers: c_int,
) -> VAStatus;
pub type EndPicture = unsafe extern "C" fn(ctx: VADriverContextP, context: VAContextID) -> VAStatus;

pub type SyncSurface = unsafe extern "C" fn(ctx: VADriverContextP, surface: VASurfaceID) -> VAStatus;
pub type QuerySurfaceStatus =
    unsafe extern "C" fn(ctx: VADriverContextP, surface: VASurfaceID, status: *mut c_int) -> VAStatus;

pub type CreateImage = unsafe extern "C" fn(
    ctx: VADriverContextP,
    format_fourcc: u32,
    width: c_int,
    height: c_int,
    image: *mut VAImage,
) -> VAStatus;
pub type DeriveImage =
    unsafe extern "C" fn(ctx: VADriverContextP, surface: VASurfaceID, image: *mut VAImage) -> VAStatus;
pub type DestroyImage = unsafe extern "C" fn(ctx: VADriverContextP, image: VAImageID) -> VAStatus;
pub type GetImage = unsafe extern "C" fn(
    ctx: VADriverContextP,
    surface: VASurfaceID,
    x: c_int,
    y: c_int,
    width: c_int,
    height: c_int,
    image: VAImageID,
) -> VAStatus;

pub type ExportSurfaceHandle = unsafe extern "C" fn(
    ctx: VADriverContextP,
    surface: VASurfaceID,
    mem_type: u32,
    flags: u32,
    descriptor: *mut VADrmPrimeSurfaceDescriptor,
) -> VAStatus;

pub type GenericUnimplemented = unsafe extern "C" fn(ctx: VADriverContextP) -> VAStatus;

/// Every field is `Option<fn(...)>`; [`populate`] fills the entry points
/// this driver implements and [`unimplemented_entry`]-typed closures for
/// the rest, so no slot is ever null.
#[repr(C)]
pub struct VADriverVTable {
    pub va_terminate: Terminate,

    pub va_query_config_profiles: QueryConfigProfiles,
    pub va_query_config_entrypoints: QueryConfigEntrypoints,
    pub va_create_config: CreateConfig,
    pub va_destroy_config: DestroyConfig,

    pub va_create_surfaces: CreateSurfaces,
    pub va_create_surfaces2: CreateSurfaces2,
    pub va_destroy_surfaces: DestroySurfaces,

    pub va_create_context: CreateContext,
    pub va_destroy_context: DestroyContext,

    pub va_create_buffer: CreateBuffer,
    pub va_map_buffer: MapBuffer,
    pub va_unmap_buffer: UnmapBuffer,
    pub va_destroy_buffer: DestroyBuffer,

    pub va_begin_picture: BeginPicture,
    pub va_render_picture: RenderPicture,
    pub va_end_picture: EndPicture,

    pub va_sync_surface: SyncSurface,
    pub va_query_surface_status: QuerySurfaceStatus,

    pub va_create_image: CreateImage,
    pub va_derive_image: DeriveImage,
    pub va_destroy_image: DestroyImage,
    pub va_get_image: GetImage,

    pub va_export_surface_handle: ExportSurfaceHandle,

    // --- unimplemented surface: present so the dispatcher never sees a
    // null slot, per spec §6. Subpicture, display-attribute, multi-frame,
    // processing-rate, put-surface/image, and lock/unlock all land here.
    pub va_put_surface: GenericUnimplemented,
    pub va_put_image: GenericUnimplemented,
    pub va_query_subpicture_formats: GenericUnimplemented,
    pub va_create_subpicture: GenericUnimplemented,
    pub va_destroy_subpicture: GenericUnimplemented,
    pub va_set_subpicture_image: GenericUnimplemented,
    pub va_set_subpicture_chromakey: GenericUnimplemented,
    pub va_set_subpicture_global_alpha: GenericUnimplemented,
    pub va_associate_subpicture: GenericUnimplemented,
    pub va_deassociate_subpicture: GenericUnimplemented,
    pub va_query_display_attributes: GenericUnimplemented,
    pub va_get_display_attributes: GenericUnimplemented,
    pub va_set_display_attributes: GenericUnimplemented,
    pub va_query_processing_rate: GenericUnimplemented,
    pub va_lock_surface: GenericUnimplemented,
    pub va_unlock_surface: GenericUnimplemented,
}

/// Shared stub for every entry point spec §6 declares "uniformly
/// unimplemented". Present in every such slot so the vtable never carries
/// a null function pointer.
pub unsafe extern "C" fn unimplemented_entry(_ctx: VADriverContextP) -> VAStatus {
    crate::status::VA_STATUS_ERROR_UNIMPLEMENTED
}

// The real entry points above take extra parameters the generic stub
// signature doesn't carry; `populate` casts `unimplemented_entry` to each
// slot's concrete function-pointer type. This is sound: every signature
// here is `unsafe extern "C" fn(VADriverContextP, ...) -> VAStatus`, the
// stub never reads past its first argument, and the dispatcher always
// calls through the slot's own declared type, never through our cast.
macro_rules! stub {
    ($ty:ty) => {
        unsafe { std::mem::transmute::<GenericUnimplemented, $ty>(unimplemented_entry) }
    };
}

pub(crate) use stub;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn vtable_slots_are_function_pointer_sized() {
        assert_eq!(size_of::<Terminate>(), size_of::<usize>());
        assert_eq!(size_of::<GenericUnimplemented>(), size_of::<usize>());
    }
}
