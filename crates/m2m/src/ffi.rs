//! Raw V4L2 ioctl surface: opaque fd, `#[repr(C)]` argument structs, and
//! request-code constants computed the same way the kernel's own
//! `<linux/ioctl.h>` macros do. No `bindgen` — hand-written to match the
//! workspace's existing FFI style (see `video-pipeline::ffi`), generalised
//! from a CoreMedia/VideoToolbox surface to a V4L2 one.

use std::os::raw::{c_int, c_ulong};

// --- ioctl request-code construction (linux/asm-generic/ioctl.h) ---

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u32, nr: u32, size: u32) -> c_ulong {
    ((dir << IOC_DIRSHIFT) | (ty << IOC_TYPESHIFT) | (nr << IOC_NRSHIFT) | (size << IOC_SIZESHIFT))
        as c_ulong
}

const fn io(ty: u32, nr: u32) -> c_ulong {
    ioc(IOC_NONE, ty, nr, 0)
}

const fn iow<T>(ty: u32, nr: u32) -> c_ulong {
    ioc(IOC_WRITE, ty, nr, std::mem::size_of::<T>() as u32)
}

const fn ior<T>(ty: u32, nr: u32) -> c_ulong {
    ioc(IOC_READ, ty, nr, std::mem::size_of::<T>() as u32)
}

const fn iowr<T>(ty: u32, nr: u32) -> c_ulong {
    ioc(IOC_READ | IOC_WRITE, ty, nr, std::mem::size_of::<T>() as u32)
}

const V: u32 = b'V' as u32;

// --- buffer type / memory type / capability enumerators ---

/// The driver's compressed-bitstream *input* queue, in kernel terms the
/// "output" queue (the application writes into the device).
pub const V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE: u32 = 10;
/// The driver's decoded-frame *output* queue, in kernel terms the
/// "capture" queue (the application reads from the device).
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE: u32 = 9;

pub const V4L2_MEMORY_MMAP: u32 = 1;

pub const V4L2_CAP_VIDEO_M2M_MPLANE: u32 = 0x0000_4000;
pub const V4L2_CAP_VIDEO_M2M: u32 = 0x0000_8000;

pub const V4L2_PIX_FMT_H264: u32 = fourcc(b'H', b'2', b'6', b'4');
pub const V4L2_PIX_FMT_HEVC: u32 = fourcc(b'H', b'E', b'V', b'C');
pub const V4L2_PIX_FMT_VP8: u32 = fourcc(b'V', b'P', b'8', b'0');
pub const V4L2_PIX_FMT_VP9: u32 = fourcc(b'V', b'P', b'9', b'0');
pub const V4L2_PIX_FMT_AV1: u32 = fourcc(b'A', b'V', b'0', b'1');
pub const V4L2_PIX_FMT_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
pub const V4L2_PIX_FMT_YUV420: u32 = fourcc(b'Y', b'U', b'1', b'2');

const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

// --- event types ---

pub const V4L2_EVENT_SOURCE_CHANGE: u32 = 5;
pub const V4L2_EVENT_EOS: u32 = 6;
pub const V4L2_EVENT_SUB_ID_SOURCE_CHANGE: u32 = V4L2_EVENT_SOURCE_CHANGE;
pub const V4L2_EVENT_SUB_ID_EOS: u32 = V4L2_EVENT_EOS;

// --- structs (multi-planar variants only; this driver never uses the
// single-plane buffer/format structs) ---

pub const VIDEO_MAX_PLANES: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct V4l2Capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2PlanePixFormat {
    pub sizeimage: u32,
    pub bytesperline: u32,
    pub reserved: [u16; 6],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct V4l2PixFormatMplane {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub colorspace: u32,
    pub plane_fmt: [V4l2PlanePixFormat; VIDEO_MAX_PLANES],
    pub num_planes: u8,
    pub flags: u8,
    pub ycbcr_enc_or_hsv_enc: u8,
    pub quantization: u8,
    pub xfer_func: u8,
    pub reserved: [u8; 7],
}

impl Default for V4l2PixFormatMplane {
    fn default() -> Self {
        // SAFETY: an all-zero V4l2PixFormatMplane is a valid bit pattern
        // (every field is a plain integer / fixed-size array of one).
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union V4l2FormatUnion {
    pub pix_mp: V4l2PixFormatMplane,
    pub raw_data: [u8; 200],
}

#[repr(C)]
pub struct V4l2Format {
    pub type_: u32,
    pub fmt: V4l2FormatUnion,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2RequestBuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Plane {
    pub bytesused: u32,
    pub length: u32,
    pub m_mem_offset: u32,
    pub data_offset: u32,
    pub reserved: [u32; 11],
}

#[repr(C)]
pub struct V4l2Buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp_sec: i64,
    pub timestamp_usec: i64,
    pub sequence: u32,
    pub memory: u32,
    pub m_planes: *mut V4l2Plane,
    pub length: u32,
    pub request_fd: i32,
    pub reserved: u32,
}

impl Default for V4l2Buffer {
    fn default() -> Self {
        V4l2Buffer {
            index: 0,
            type_: 0,
            bytesused: 0,
            flags: 0,
            field: 0,
            timestamp_sec: 0,
            timestamp_usec: 0,
            sequence: 0,
            memory: 0,
            m_planes: std::ptr::null_mut(),
            length: 0,
            request_fd: 0,
            reserved: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2EventSubscription {
    pub type_: u32,
    pub id: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct V4l2Event {
    pub type_: u32,
    pub u: [u8; 64],
    pub pending: u32,
    pub sequence: u32,
    pub timestamp_sec: i64,
    pub timestamp_nsec: i64,
    pub id: u32,
    pub reserved: [u32; 8],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct V4l2Fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

impl Default for V4l2Fmtdesc {
    fn default() -> Self {
        // SAFETY: every field is a plain integer or fixed-size byte array.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2ExportBuffer {
    pub type_: u32,
    pub index: u32,
    pub plane: u32,
    pub flags: u32,
    pub fd: i32,
    pub reserved: [u32; 11],
}

pub const VIDIOC_QUERYCAP: c_ulong = ior::<V4l2Capability>(V, 0);
pub const VIDIOC_ENUM_FMT: c_ulong = iowr::<V4l2Fmtdesc>(V, 2);
pub const VIDIOC_G_FMT: c_ulong = iowr::<V4l2Format>(V, 4);
pub const VIDIOC_S_FMT: c_ulong = iowr::<V4l2Format>(V, 5);
pub const VIDIOC_REQBUFS: c_ulong = iowr::<V4l2RequestBuffers>(V, 8);
pub const VIDIOC_QUERYBUF: c_ulong = iowr::<V4l2Buffer>(V, 9);
pub const VIDIOC_QBUF: c_ulong = iowr::<V4l2Buffer>(V, 15);
pub const VIDIOC_EXPBUF: c_ulong = iowr::<V4l2ExportBuffer>(V, 16);
pub const VIDIOC_DQBUF: c_ulong = iowr::<V4l2Buffer>(V, 17);
pub const VIDIOC_STREAMON: c_ulong = iow::<c_int>(V, 18);
pub const VIDIOC_STREAMOFF: c_ulong = iow::<c_int>(V, 19);
pub const VIDIOC_DQEVENT: c_ulong = ior::<V4l2Event>(V, 89);
pub const VIDIOC_SUBSCRIBE_EVENT: c_ulong = iow::<V4l2EventSubscription>(V, 90);

/// Thin wrapper over `libc::ioctl` so call sites read as V4L2 operations
/// rather than raw syscalls; retries once on `EINTR`.
///
/// # Safety
/// `arg` must point to a valid instance of whatever struct `request`
/// expects, sized and laid out exactly as the kernel's uapi headers define
/// it.
pub unsafe fn ioctl(fd: c_int, request: c_ulong, arg: *mut libc::c_void) -> std::io::Result<c_int> {
    loop {
        let ret = libc::ioctl(fd, request as _, arg);
        if ret >= 0 {
            return Ok(ret);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamon_is_a_write_only_int_request() {
        // dir=WRITE(1), size=size_of::<c_int>(), type='V', nr=18
        let expected = ((1u32) << IOC_DIRSHIFT)
            | ((std::mem::size_of::<c_int>() as u32) << IOC_SIZESHIFT)
            | (V << IOC_TYPESHIFT)
            | 18;
        assert_eq!(VIDIOC_STREAMON, expected as c_ulong);
    }

    #[test]
    fn querycap_is_read_only() {
        let dir = (VIDIOC_QUERYCAP as u32) >> IOC_DIRSHIFT;
        assert_eq!(dir, IOC_READ);
    }

    #[test]
    fn fourcc_packs_little_endian_bytes() {
        assert_eq!(V4L2_PIX_FMT_NV12 & 0xFF, b'N' as u32);
        assert_eq!((V4L2_PIX_FMT_NV12 >> 24) & 0xFF, b'2' as u32);
    }
}
