//! `SyncSurface` / `QuerySurfaceStatus`: blocking and non-blocking reads
//! of a surface's decoded-flag, backed by `m2m::Session::sync_output`.

use std::os::raw::c_int;

use crate::driver::DriverState;
use crate::status::{VAStatus, VA_STATUS_ERROR_INVALID_PARAMETER, VA_STATUS_ERROR_INVALID_SURFACE, VA_STATUS_SUCCESS};
use crate::types::{VADriverContextP, VASurfaceID};

/// `VASurfaceStatus` values this driver reports: only "ready" and
/// "rendering" are meaningful for a decode-only driver with no display
/// queue, so the still-in-flight / just-finished distinction collapses
/// to these two.
const VA_SURFACE_READY: c_int = 0x1;
const VA_SURFACE_RENDERING: c_int = 0x2;

/// # Safety
/// `ctx` must point at a live `VADriverContext` produced by this driver.
/// Blocks the calling thread until the surface's binding is marked
/// decoded or the session's bounded wait gives up, per spec §5's
/// liveness-over-completeness tradeoff: a timed-out wait still reports
/// success rather than hanging the caller forever.
pub unsafe extern "C" fn va_sync_surface(ctx: VADriverContextP, surface: VASurfaceID) -> VAStatus {
    let state = DriverState::from_ctx(ctx);

    let owning_context = match state.surfaces.with(surface, |s| s.owning_context) {
        Some(owner) => owner,
        None => return VA_STATUS_ERROR_INVALID_SURFACE,
    };
    let Some(context_id) = owning_context else {
        // Never rendered to: nothing to wait for.
        return VA_STATUS_SUCCESS;
    };

    let result = state.contexts.with(context_id, |c| {
        state
            .surfaces
            .with(surface, |s| c.session.lock().unwrap().sync_output(&s.binding))
    });

    match result {
        Some(Some(Ok(()))) => VA_STATUS_SUCCESS,
        Some(Some(Err(e))) => crate::status::from_m2m_error(e),
        Some(None) => VA_STATUS_ERROR_INVALID_SURFACE,
        None => VA_STATUS_ERROR_INVALID_PARAMETER,
    }
}

/// # Safety
/// `ctx` must point at a live `VADriverContext` produced by this driver;
/// `out_status` must be valid for one `c_int` write.
pub unsafe extern "C" fn va_query_surface_status(
    ctx: VADriverContextP,
    surface: VASurfaceID,
    out_status: *mut c_int,
) -> VAStatus {
    if out_status.is_null() {
        return VA_STATUS_ERROR_INVALID_PARAMETER;
    }
    let state = DriverState::from_ctx(ctx);
    match state.surfaces.with(surface, |s| s.is_decoded()) {
        Some(decoded) => {
            *out_status = if decoded { VA_SURFACE_READY } else { VA_SURFACE_RENDERING };
            VA_STATUS_SUCCESS
        }
        None => VA_STATUS_ERROR_INVALID_SURFACE,
    }
}
