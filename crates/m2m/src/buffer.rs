//! Per-kernel-buffer bookkeeping: mmap'd plane pointers, queued state, and
//! lazily-populated export fd / readback mappings.
//!
//! Mapping follows the same `libc::mmap`/`munmap` pattern as
//! `rtmp-vcam-app::ipc`'s shared frame buffer, generalised from one
//! anonymous `shm_open` mapping to N kernel-buffer-backed ones.

use std::os::raw::c_int;
use std::ptr;

use crate::error::{M2mError, Result};

/// One mapped plane: base pointer plus mapped length.
#[derive(Debug, Clone, Copy)]
pub struct PlaneMapping {
    pub base: *mut libc::c_void,
    pub len: usize,
}

// Kernel buffer mappings outlive the threads that created them; the
// session's mutex already serialises all access.
unsafe impl Send for PlaneMapping {}

/// Bookkeeping for one kernel buffer (one per queue slot). Input buffers
/// use only `planes[0]`; output buffers (NV12) use `planes[0]` (Y) and
/// `planes[1]` (UV), both mapped lazily on first readback.
pub struct BufferDescriptor {
    pub index: u32,
    pub planes: Vec<Option<PlaneMapping>>,
    pub plane_lengths: Vec<u32>,
    pub queued: bool,
    pub exported_fd: Option<i32>,
}

impl BufferDescriptor {
    pub fn new(index: u32, num_planes: usize) -> Self {
        BufferDescriptor {
            index,
            planes: vec![None; num_planes],
            plane_lengths: vec![0; num_planes],
            queued: false,
            exported_fd: None,
        }
    }

    /// Maps `plane` (if not already mapped) using `mem_offset`/`length`
    /// returned by `VIDIOC_QUERYBUF`.
    pub fn ensure_mapped(&mut self, fd: c_int, plane: usize, mem_offset: u32, length: u32) -> Result<PlaneMapping> {
        if let Some(existing) = self.planes[plane] {
            return Ok(existing);
        }
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                length as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                mem_offset as libc::off_t,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(M2mError::Mmap(std::io::Error::last_os_error()));
        }
        let mapping = PlaneMapping {
            base,
            len: length as usize,
        };
        self.planes[plane] = Some(mapping);
        self.plane_lengths[plane] = length;
        Ok(mapping)
    }

    /// Byte slice over plane 0, for copying input bitstream data in.
    pub fn plane0_mut(&mut self) -> Option<&mut [u8]> {
        let m = self.planes[0]?;
        Some(unsafe { std::slice::from_raw_parts_mut(m.base as *mut u8, m.len) })
    }

    pub fn plane_slice(&self, plane: usize) -> Option<&[u8]> {
        let m = self.planes[plane]?;
        Some(unsafe { std::slice::from_raw_parts(m.base as *const u8, m.len) })
    }
}

impl Drop for BufferDescriptor {
    fn drop(&mut self) {
        for mapping in self.planes.iter().flatten() {
            unsafe {
                libc::munmap(mapping.base, mapping.len);
            }
        }
        if let Some(fd) = self.exported_fd.take() {
            unsafe {
                libc::close(fd);
            }
        }
    }
}
