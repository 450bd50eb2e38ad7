//! `VAStatus` codes and the conversions that collapse this crate's internal
//! error types into them at the vtable boundary. This is the only layer
//! allowed to turn an error into a bare integer — everywhere below here
//! stays `Result`-shaped.

use std::os::raw::c_int;

pub type VAStatus = c_int;

pub const VA_STATUS_SUCCESS: VAStatus = 0x0000_0000;
pub const VA_STATUS_ERROR_OPERATION_FAILED: VAStatus = 0x0000_0001;
pub const VA_STATUS_ERROR_ALLOCATION_FAILED: VAStatus = 0x0000_0002;
pub const VA_STATUS_ERROR_INVALID_DISPLAY: VAStatus = 0x0000_0003;
pub const VA_STATUS_ERROR_INVALID_CONFIG: VAStatus = 0x0000_0004;
pub const VA_STATUS_ERROR_INVALID_CONTEXT: VAStatus = 0x0000_0005;
pub const VA_STATUS_ERROR_INVALID_SURFACE: VAStatus = 0x0000_0006;
pub const VA_STATUS_ERROR_INVALID_BUFFER: VAStatus = 0x0000_0007;
pub const VA_STATUS_ERROR_INVALID_IMAGE: VAStatus = 0x0000_0008;
pub const VA_STATUS_ERROR_INVALID_SUBPICTURE: VAStatus = 0x0000_0009;
pub const VA_STATUS_ERROR_ATTR_NOT_SUPPORTED: VAStatus = 0x0000_000A;
pub const VA_STATUS_ERROR_MAX_NUM_EXCEEDED: VAStatus = 0x0000_000B;
pub const VA_STATUS_ERROR_UNSUPPORTED_PROFILE: VAStatus = 0x0000_000C;
pub const VA_STATUS_ERROR_UNSUPPORTED_ENTRYPOINT: VAStatus = 0x0000_000D;
pub const VA_STATUS_ERROR_UNSUPPORTED_RT_FORMAT: VAStatus = 0x0000_000E;
pub const VA_STATUS_ERROR_UNSUPPORTED_BUFFERTYPE: VAStatus = 0x0000_000F;
pub const VA_STATUS_ERROR_SURFACE_BUSY: VAStatus = 0x0000_0010;
pub const VA_STATUS_ERROR_FLAG_NOT_SUPPORTED: VAStatus = 0x0000_0011;
pub const VA_STATUS_ERROR_INVALID_PARAMETER: VAStatus = 0x0000_0012;
pub const VA_STATUS_ERROR_RESOLUTION_NOT_SUPPORTED: VAStatus = 0x0000_0013;
pub const VA_STATUS_ERROR_UNIMPLEMENTED: VAStatus = 0x0000_0014;
pub const VA_STATUS_ERROR_SURFACE_IN_DISPLAYING: VAStatus = 0x0000_0015;
pub const VA_STATUS_ERROR_INVALID_IMAGE_FORMAT: VAStatus = 0x0000_0016;
pub const VA_STATUS_ERROR_DECODING_ERROR: VAStatus = 0x0000_0017;
pub const VA_STATUS_ERROR_TIMEDOUT: VAStatus = 0x0000_0020;

/// Collapses an `m2m` queue-orchestration error into a `VAStatus`. A plain
/// function rather than `impl From<m2m::M2mError> for VAStatus` — both
/// types are foreign to this crate, so a trait impl would violate the
/// orphan rule.
pub fn from_m2m_error(e: m2m::M2mError) -> VAStatus {
    match e {
        m2m::M2mError::Transient => VA_STATUS_ERROR_SURFACE_BUSY,
        m2m::M2mError::Timeout => VA_STATUS_ERROR_TIMEDOUT,
        m2m::M2mError::DeviceOpen(_) | m2m::M2mError::Ioctl(_, _) | m2m::M2mError::Mmap(_) => {
            VA_STATUS_ERROR_OPERATION_FAILED
        }
    }
}
