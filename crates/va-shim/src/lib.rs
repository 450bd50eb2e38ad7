//! `va_m2m_shim_drv_video`: a VA driver module that bridges a consumer
//! speaking the VA API to an ARM VPU's stateful M2M kernel decoder.
//!
//! The VA dispatcher discovers this module by its file name
//! (`libva_m2m_shim_drv_video.so`) next to the other installed drivers
//! and resolves `__vaDriverInit_1_0` as its sole external entry point;
//! everything else is reached only through the vtable that call
//! populates.
//!
//! Module map:
//! - [`bitwriter`]-backed header synthesis lives in the `headers` crate;
//!   queue orchestration lives in the `m2m` crate. This crate is the
//!   glue: object tables, the vtable surface, and the small amount of
//!   marshalling between raw VA buffer bytes and those two crates'
//!   typed APIs.
//! - `objects`/`driver`: opaque-handle tables and per-context state.
//! - `config`/`surface`/`context`/`buffer`: the four object kinds the
//!   vtable creates and destroys.
//! - `picture`/`sync`/`image`/`export`: the entry points that actually
//!   move bytes (submission, readback, export).
//! - `status`/`types`/`vtable`: the FFI boundary itself.

mod buffer;
mod config;
mod context;
mod driver;
mod export;
mod format;
mod image;
mod log;
mod objects;
mod picture;
mod status;
mod surface;
mod sync;
mod types;
mod va_params;
mod vtable;

use std::os::raw::{c_int, c_void};
use std::ptr;

use buffer::Buffer;
use config::Config;
use context::Context;
use driver::DriverState;
use format::Codec;
use status::{
    VAStatus, VA_STATUS_ERROR_ATTR_NOT_SUPPORTED, VA_STATUS_ERROR_INVALID_BUFFER,
    VA_STATUS_ERROR_INVALID_CONFIG, VA_STATUS_ERROR_INVALID_CONTEXT, VA_STATUS_ERROR_INVALID_PARAMETER,
    VA_STATUS_ERROR_UNSUPPORTED_BUFFERTYPE, VA_STATUS_ERROR_UNSUPPORTED_PROFILE, VA_STATUS_SUCCESS,
};
use surface::{PixelLayout, Surface};
use types::{
    VABufferID, VABufferType, VAContextID, VADriverContext, VADriverContextP, VAEntrypoint, VAGenericID,
    VAProfile, VASurfaceAttrib, VASurfaceID, VA_RT_FORMAT_YUV420_10, VA_SURFACE_ATTRIB_MAX_HEIGHT,
    VA_SURFACE_ATTRIB_MAX_WIDTH, VA_SURFACE_ATTRIB_MEMORY_TYPE, VA_SURFACE_ATTRIB_MIN_HEIGHT,
    VA_SURFACE_ATTRIB_MIN_WIDTH, VA_SURFACE_ATTRIB_PIXEL_FORMAT, VA_SURFACE_ATTRIB_USAGE_HINT,
};
use vtable::{stub, VADriverVTable};

fn layout_for_rt_format(format: u32) -> PixelLayout {
    if format == VA_RT_FORMAT_YUV420_10 {
        PixelLayout::P010
    } else {
        PixelLayout::Nv12
    }
}

unsafe extern "C" fn va_terminate(ctx: VADriverContextP) -> VAStatus {
    let _ = DriverState::reclaim(ctx);
    (*ctx).driver_data = ptr::null_mut();
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_query_config_profiles(
    ctx: VADriverContextP,
    profile_list: *mut VAProfile,
    num_profiles: *mut c_int,
) -> VAStatus {
    let _ = ctx;
    if profile_list.is_null() || num_profiles.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let profiles = format::supported_profiles();
    for (i, p) in profiles.iter().enumerate() {
        *profile_list.add(i) = *p;
    }
    *num_profiles = profiles.len() as c_int;
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_query_config_entrypoints(
    ctx: VADriverContextP,
    profile: VAProfile,
    entrypoint_list: *mut VAEntrypoint,
    num_entrypoints: *mut c_int,
) -> VAStatus {
    let _ = ctx;
    if entrypoint_list.is_null() || num_entrypoints.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    if Codec::from_profile(profile).is_none() {
        *num_entrypoints = 0;
        return VA_STATUS_ERROR_UNSUPPORTED_PROFILE;
    }
    *entrypoint_list = types::VA_ENTRYPOINT_VLD;
    *num_entrypoints = 1;
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_create_config(
    ctx: VADriverContextP,
    profile: VAProfile,
    entrypoint: VAEntrypoint,
    config_id: *mut VAGenericID,
) -> VAStatus {
    if config_id.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    match Config::create(profile, entrypoint) {
        Ok(cfg) => {
            *config_id = state.configs.insert(cfg);
            VA_STATUS_SUCCESS
        }
        Err(config::ConfigError::UnsupportedProfile) => VA_STATUS_ERROR_UNSUPPORTED_PROFILE,
        Err(config::ConfigError::UnsupportedEntrypoint) => status::VA_STATUS_ERROR_UNSUPPORTED_ENTRYPOINT,
    }
}

unsafe extern "C" fn va_destroy_config(ctx: VADriverContextP, config_id: VAGenericID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);
    match state.configs.remove(config_id) {
        Some(_) => VA_STATUS_SUCCESS,
        None => VA_STATUS_ERROR_INVALID_CONFIG,
    }
}

fn is_known_surface_attrib(attrib_type: c_int) -> bool {
    matches!(
        attrib_type,
        VA_SURFACE_ATTRIB_PIXEL_FORMAT
            | VA_SURFACE_ATTRIB_MIN_WIDTH
            | VA_SURFACE_ATTRIB_MAX_WIDTH
            | VA_SURFACE_ATTRIB_MIN_HEIGHT
            | VA_SURFACE_ATTRIB_MAX_HEIGHT
            | VA_SURFACE_ATTRIB_MEMORY_TYPE
            | VA_SURFACE_ATTRIB_USAGE_HINT
    )
}

unsafe extern "C" fn va_create_surfaces(
    ctx: VADriverContextP,
    width: c_int,
    height: c_int,
    format: c_int,
    num_surfaces: c_int,
    surfaces: *mut VASurfaceID,
) -> VAStatus {
    if surfaces.is_null() || width <= 0 || height <= 0 || num_surfaces < 0 {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    let layout = layout_for_rt_format(format as u32);
    for i in 0..num_surfaces as usize {
        let id = state
            .surfaces
            .insert(Surface::new(width as u32, height as u32, layout));
        *surfaces.add(i) = id;
    }
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_create_surfaces2(
    ctx: VADriverContextP,
    format: u32,
    width: u32,
    height: u32,
    surfaces: *mut VASurfaceID,
    num_surfaces: u32,
    attrib_list: *mut VASurfaceAttrib,
    num_attribs: u32,
) -> VAStatus {
    if surfaces.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    if !attrib_list.is_null() {
        for i in 0..num_attribs as usize {
            let attrib = *attrib_list.add(i);
            if !is_known_surface_attrib(attrib.attrib_type) {
                return VA_STATUS_ERROR_ATTR_NOT_SUPPORTED;
            }
        }
    }
    let state = DriverState::from_ctx(ctx);
    let layout = layout_for_rt_format(format);
    for i in 0..num_surfaces as usize {
        let id = state.surfaces.insert(Surface::new(width, height, layout));
        *surfaces.add(i) = id;
    }
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_destroy_surfaces(
    ctx: VADriverContextP,
    surface_list: *mut VASurfaceID,
    num_surfaces: c_int,
) -> VAStatus {
    if surface_list.is_null() || num_surfaces < 0 {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    for i in 0..num_surfaces as usize {
        state.surfaces.remove(*surface_list.add(i));
    }
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_create_context(
    ctx: VADriverContextP,
    config_id: VAGenericID,
    picture_width: c_int,
    picture_height: c_int,
    flag: c_int,
    render_targets: *mut VASurfaceID,
    num_render_targets: c_int,
    context: *mut VAContextID,
) -> VAStatus {
    let _ = (flag, render_targets, num_render_targets);
    if context.is_null() || picture_width <= 0 || picture_height <= 0 {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    let Some(codec) = state.configs.with(config_id, |c| c.codec) else {
        return VA_STATUS_ERROR_INVALID_CONFIG;
    };
    match Context::open(codec, picture_width as u32, picture_height as u32) {
        Ok(c) => {
            *context = state.contexts.insert(c);
            VA_STATUS_SUCCESS
        }
        Err(e) => status::from_m2m_error(e),
    }
}

unsafe extern "C" fn va_destroy_context(ctx: VADriverContextP, context: VAContextID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);
    match state.contexts.remove(context) {
        Some(_) => VA_STATUS_SUCCESS,
        None => VA_STATUS_ERROR_INVALID_CONTEXT,
    }
}

unsafe extern "C" fn va_create_buffer(
    ctx: VADriverContextP,
    context: VAContextID,
    buf_type: VABufferType,
    size: c_int,
    num_elements: c_int,
    data: *const c_void,
    buf_id: *mut VABufferID,
) -> VAStatus {
    let _ = context;
    if buf_id.is_null() || size < 0 || num_elements < 0 || !Buffer::is_known_type(buf_type) {
        return VA_STATUS_ERROR_UNSUPPORTED_BUFFERTYPE;
    }
    let state = DriverState::from_ctx(ctx);
    let total = size as usize * num_elements as usize;
    let mut bytes = vec![0u8; total];
    if !data.is_null() && total > 0 {
        ptr::copy_nonoverlapping(data as *const u8, bytes.as_mut_ptr(), total);
    }
    *buf_id = state.buffers.insert(Buffer::new(buf_type, bytes));
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_map_buffer(ctx: VADriverContextP, buf_id: VABufferID, pbuf: *mut *mut c_void) -> VAStatus {
    if pbuf.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    match state.buffers.with_mut(buf_id, |b| {
        b.mapped = true;
        b.data.as_mut_ptr()
    }) {
        Some(p) => {
            *pbuf = p as *mut c_void;
            VA_STATUS_SUCCESS
        }
        None => VA_STATUS_ERROR_INVALID_BUFFER,
    }
}

unsafe extern "C" fn va_unmap_buffer(ctx: VADriverContextP, buf_id: VABufferID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);
    let ready = match state.buffers.with_mut(buf_id, |b| {
        b.mapped = false;
        b.ready_to_free()
    }) {
        Some(r) => r,
        None => return VA_STATUS_ERROR_INVALID_BUFFER,
    };
    if ready {
        state.buffers.remove(buf_id);
    }
    VA_STATUS_SUCCESS
}

unsafe extern "C" fn va_destroy_buffer(ctx: VADriverContextP, buf_id: VABufferID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);
    let freed = match state.buffers.with_mut(buf_id, |b| {
        if b.mapped {
            b.destroy_deferred = true;
            false
        } else {
            true
        }
    }) {
        Some(f) => f,
        None => return VA_STATUS_ERROR_INVALID_BUFFER,
    };
    if freed {
        state.buffers.remove(buf_id);
    }
    VA_STATUS_SUCCESS
}

fn populate_vtable() -> VADriverVTable {
    VADriverVTable {
        va_terminate,

        va_query_config_profiles,
        va_query_config_entrypoints,
        va_create_config,
        va_destroy_config,

        va_create_surfaces,
        va_create_surfaces2,
        va_destroy_surfaces,

        va_create_context,
        va_destroy_context,

        va_create_buffer,
        va_map_buffer,
        va_unmap_buffer,
        va_destroy_buffer,

        va_begin_picture: picture::va_begin_picture,
        va_render_picture: picture::va_render_picture,
        va_end_picture: picture::va_end_picture,

        va_sync_surface: sync::va_sync_surface,
        va_query_surface_status: sync::va_query_surface_status,

        va_create_image: image::va_create_image,
        va_derive_image: image::va_derive_image,
        va_destroy_image: image::va_destroy_image,
        va_get_image: image::va_get_image,

        va_export_surface_handle: export::va_export_surface_handle,

        va_put_surface: stub!(vtable::GenericUnimplemented),
        va_put_image: stub!(vtable::GenericUnimplemented),
        va_query_subpicture_formats: stub!(vtable::GenericUnimplemented),
        va_create_subpicture: stub!(vtable::GenericUnimplemented),
        va_destroy_subpicture: stub!(vtable::GenericUnimplemented),
        va_set_subpicture_image: stub!(vtable::GenericUnimplemented),
        va_set_subpicture_chromakey: stub!(vtable::GenericUnimplemented),
        va_set_subpicture_global_alpha: stub!(vtable::GenericUnimplemented),
        va_associate_subpicture: stub!(vtable::GenericUnimplemented),
        va_deassociate_subpicture: stub!(vtable::GenericUnimplemented),
        va_query_display_attributes: stub!(vtable::GenericUnimplemented),
        va_get_display_attributes: stub!(vtable::GenericUnimplemented),
        va_set_display_attributes: stub!(vtable::GenericUnimplemented),
        va_query_processing_rate: stub!(vtable::GenericUnimplemented),
        va_lock_surface: stub!(vtable::GenericUnimplemented),
        va_unlock_surface: stub!(vtable::GenericUnimplemented),
    }
}

/// The driver module's sole external entry point. Named and signatured
/// to match what the VA dispatcher's `dlsym` lookup expects for a
/// version-1.0 driver.
///
/// # Safety
/// `ctx` must be non-null and point at a `VADriverContext` the dispatcher
/// owns for the lifetime of this display connection.
#[no_mangle]
pub unsafe extern "C" fn __vaDriverInit_1_0(ctx: VADriverContextP) -> VAStatus {
    if ctx.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    log::init();

    let vtable = Box::into_raw(Box::new(populate_vtable()));
    let driver_data = DriverState::default().boxed_into_raw();

    let ctx_ref: &mut VADriverContext = &mut *ctx;
    ctx_ref.version_major = 1;
    ctx_ref.version_minor = 0;
    ctx_ref.max_profiles = 8;
    ctx_ref.max_entrypoints = 1;
    ctx_ref.max_image_formats = 1;
    ctx_ref.max_subpic_formats = 0;
    ctx_ref.max_display_attributes = 0;
    ctx_ref.driver_data = driver_data;
    ctx_ref.vtable = vtable;

    tracing::info!("va_m2m_shim_drv_video initialised");
    VA_STATUS_SUCCESS
}
