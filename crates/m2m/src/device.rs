//! M2M device-node discovery.

use std::ffi::CString;
use std::os::raw::c_int;
use std::os::unix::io::RawFd;

use tracing::debug;

use crate::error::{M2mError, Result};
use crate::ffi;

/// Candidate device nodes tried in order; the first that opens and reports
/// multi-planar or single-planar M2M capability wins.
const CANDIDATES: &[&str] = &["/dev/video0", "/dev/video-dec0"];

/// An opened, capability-checked M2M device node.
pub struct Device {
    fd: RawFd,
}

impl Device {
    /// Tries each candidate path in order, returning the first that opens
    /// and reports `V4L2_CAP_VIDEO_M2M_MPLANE` or `V4L2_CAP_VIDEO_M2M`.
    pub fn discover() -> Result<Self> {
        let mut last_err = None;
        for path in CANDIDATES {
            match Self::try_open(path) {
                Ok(dev) => return Ok(dev),
                Err(e) => {
                    debug!(path, error = %e, "candidate device unusable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            M2mError::DeviceOpen(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no candidate device paths",
            ))
        }))
    }

    fn try_open(path: &str) -> Result<Self> {
        let c_path = CString::new(path).expect("device path contains no NUL bytes");
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_NONBLOCK) };
        if fd < 0 {
            return Err(M2mError::DeviceOpen(std::io::Error::last_os_error()));
        }
        let dev = Device { fd };

        let mut cap = ffi::V4l2Capability {
            driver: [0; 16],
            card: [0; 32],
            bus_info: [0; 32],
            version: 0,
            capabilities: 0,
            device_caps: 0,
            reserved: [0; 3],
        };
        match unsafe {
            ffi::ioctl(
                dev.fd,
                ffi::VIDIOC_QUERYCAP,
                &mut cap as *mut _ as *mut libc::c_void,
            )
        } {
            Ok(_) => {}
            Err(e) => return Err(M2mError::Ioctl("VIDIOC_QUERYCAP", e)),
        }

        let caps = if cap.device_caps != 0 {
            cap.device_caps
        } else {
            cap.capabilities
        };
        let is_m2m = caps & (ffi::V4L2_CAP_VIDEO_M2M_MPLANE | ffi::V4L2_CAP_VIDEO_M2M) != 0;
        if !is_m2m {
            return Err(M2mError::DeviceOpen(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("{path} does not report M2M capability"),
            )));
        }

        debug!(path, "opened M2M device");
        Ok(dev)
    }

    pub fn fd(&self) -> c_int {
        self.fd
    }

    /// Enumerates the pixel formats the kernel driver reports for
    /// `buf_type` (the capture/output queue), in ascending index order,
    /// stopping at the first `EINVAL`. Used to populate the advertised
    /// profile list from whichever codec/pixel fourccs the hardware
    /// actually supports, rather than hard-coding it.
    pub fn enumerate_formats(&self, buf_type: u32) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for index in 0.. {
            let mut desc = ffi::V4l2Fmtdesc {
                index,
                type_: buf_type,
                ..Default::default()
            };
            match unsafe {
                ffi::ioctl(self.fd, ffi::VIDIOC_ENUM_FMT, &mut desc as *mut _ as *mut libc::c_void)
            } {
                Ok(_) => out.push(desc.pixelformat),
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) => break,
                Err(e) => return Err(M2mError::Ioctl("VIDIOC_ENUM_FMT", e)),
            }
        }
        Ok(out)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

// Sessions hand this across whatever thread the consumer happens to call
// from; the fd itself imposes no thread affinity.
unsafe impl Send for Device {}
