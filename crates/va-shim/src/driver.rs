//! `VADriverContextExt`: the driver-private state attached to
//! `VADriverContext::driver_data`. Created in `vaDriverInit`, torn down in
//! `vaTerminate`.

use std::os::raw::c_void;

use crate::buffer::Buffer;
use crate::config::Config;
use crate::context::Context;
use crate::objects::HandleTable;
use crate::surface::Surface;
use crate::types::{VADriverContextP, VAImage};

#[derive(Default)]
pub struct DriverState {
    pub configs: HandleTable<Config>,
    pub contexts: HandleTable<Context>,
    pub surfaces: HandleTable<Surface>,
    pub buffers: HandleTable<Buffer>,
    pub images: HandleTable<VAImage>,
}

impl DriverState {
    pub fn boxed_into_raw(self) -> *mut c_void {
        Box::into_raw(Box::new(self)) as *mut c_void
    }

    /// # Safety
    /// `ctx` must be non-null and its `driver_data` must point at a
    /// `DriverState` previously produced by [`boxed_into_raw`] and not yet
    /// reclaimed.
    pub unsafe fn from_ctx<'a>(ctx: VADriverContextP) -> &'a DriverState {
        &*((*ctx).driver_data as *const DriverState)
    }

    /// # Safety
    /// Same as [`from_ctx`]; additionally, no other reference to the
    /// `DriverState` may be reclaimed concurrently. `vaTerminate` is only
    /// ever called once per context, under the consumer's own discipline.
    pub unsafe fn reclaim(ctx: VADriverContextP) -> Box<DriverState> {
        Box::from_raw((*ctx).driver_data as *mut DriverState)
    }
}
