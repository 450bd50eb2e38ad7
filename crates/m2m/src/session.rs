//! Per-decode-session queue orchestration: queue setup, the source-change
//! handshake, input-buffer recycling, output-buffer dequeue, descriptor
//! export, and memory-mapped readback.
//!
//! All session-mutating operations are expected to be called with the
//! consumer's own per-session mutex already held (see `va-shim`); nothing
//! here does its own session-wide locking, matching §5's "no dedicated
//! worker thread, dequeues happen inline" model.

use std::collections::VecDeque;
use std::os::raw::c_int;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::buffer::BufferDescriptor;
use crate::device::Device;
use crate::error::{M2mError, Result};
use crate::ffi;

const INPUT_BUFFER_COUNT: u32 = 8;
const OUTPUT_BUFFER_COUNT: u32 = 16;
const INPUT_PLANE_SIZE: u32 = 4 * 1024 * 1024;
const OUTPUT_PLANE_COUNT: usize = 2; // NV12: Y, UV

const POLL_STEP: Duration = Duration::from_millis(10);
const HANDSHAKE_ITERS: u32 = 100; // <= 1s
const RECYCLE_ITERS: u32 = 100; // <= 1s
const SYNC_ITERS: u32 = 50; // <= 500ms

/// Per-surface state a session writes into once a decoded frame is
/// available for it. Owned by the VA-facing surface object; the session
/// only ever sees it through this handle.
#[derive(Default)]
pub struct BindingState {
    pub buffer_index: Option<u32>,
    pub decoded: bool,
}

pub struct OutputBinding {
    pub state: Mutex<BindingState>,
    pub condvar: Condvar,
}

impl OutputBinding {
    pub fn new() -> Arc<Self> {
        Arc::new(OutputBinding {
            state: Mutex::new(BindingState::default()),
            condvar: Condvar::new(),
        })
    }
}

/// Negotiated output geometry, known only after the source-change
/// handshake completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
    pub plane_lengths: [u32; OUTPUT_PLANE_COUNT],
}

pub struct Session {
    device: Device,
    max_width: u32,
    max_height: u32,

    input: Vec<BufferDescriptor>,
    output: Vec<BufferDescriptor>,

    input_streaming: bool,
    output_streaming: bool,
    output_geometry: OutputGeometry,

    /// Render targets awaiting a decoded frame, FIFO — correct because the
    /// driver advertises zero reordering, so kernel output order equals
    /// submission order.
    pending: VecDeque<Arc<OutputBinding>>,
}

impl Session {
    /// Opens a device, configures the input queue for `codec_fourcc`, and
    /// subscribes to source-change/EOS events. The output queue is left
    /// unconfigured until the first-input handshake completes.
    pub fn open(codec_fourcc: u32, max_width: u32, max_height: u32) -> Result<Self> {
        let device = Device::discover()?;

        set_format_output(&device, codec_fourcc, INPUT_PLANE_SIZE)?;
        let input_count = request_buffers(&device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE, INPUT_BUFFER_COUNT)?;

        let mut input = Vec::with_capacity(input_count as usize);
        for index in 0..input_count {
            let mut desc = BufferDescriptor::new(index, 1);
            let planes = query_buffer(&device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE, index, 1)?;
            desc.ensure_mapped(device.fd(), 0, planes[0].0, planes[0].1)?;
            input.push(desc);
        }

        subscribe_event(&device, ffi::V4L2_EVENT_SUB_ID_SOURCE_CHANGE)?;
        subscribe_event(&device, ffi::V4L2_EVENT_SUB_ID_EOS)?;

        debug!(max_width, max_height, "M2M session opened, input queue configured");

        Ok(Session {
            device,
            max_width,
            max_height,
            input,
            output: Vec::new(),
            input_streaming: false,
            output_streaming: false,
            output_geometry: OutputGeometry::default(),
            pending: VecDeque::new(),
        })
    }

    /// Submits one fully-assembled picture's bitstream, binding the
    /// eventual decoded frame to `target`. Returns once the kernel has
    /// accepted the input buffer; decode completion is observed later via
    /// [`Session::sync_output`] or the opportunistic dequeue this call
    /// performs.
    pub fn submit_picture(&mut self, data: &[u8], target: Arc<OutputBinding>) -> Result<()> {
        self.recycle_input()?;

        let index = self.find_or_wait_for_free_input()?;
        let first_enqueue = !self.input_streaming;

        {
            let desc = &mut self.input[index as usize];
            let plane = desc.plane0_mut().expect("input buffer is always mapped");
            let len = data.len().min(plane.len);
            plane[..len].copy_from_slice(&data[..len]);
            queue_buffer(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE, index, &[len as u32])?;
            desc.queued = true;
        }

        if first_enqueue {
            self.handshake()?;
        }

        self.pending.push_back(target);
        self.drain_output()?;
        Ok(())
    }

    /// Non-blocking drain of the input queue: reclaims any buffers the
    /// kernel has finished consuming.
    fn recycle_input(&mut self) -> Result<()> {
        loop {
            match dequeue_buffer_nonblocking(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE)? {
                Some(index) => {
                    self.input[index as usize].queued = false;
                    trace!(index, "input buffer recycled");
                }
                None => return Ok(()),
            }
        }
    }

    fn find_or_wait_for_free_input(&mut self) -> Result<u32> {
        if let Some(desc) = self.input.iter().find(|d| !d.queued) {
            return Ok(desc.index);
        }
        for _ in 0..RECYCLE_ITERS {
            thread::sleep(POLL_STEP);
            if let Some(index) = dequeue_buffer_nonblocking(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE)? {
                self.input[index as usize].queued = false;
                return Ok(index);
            }
        }
        warn!("input queue exhausted after bounded recycle wait");
        Err(M2mError::Transient)
    }

    /// Polls for the source-change event (or times out), negotiates the
    /// output format, and brings the output queue up.
    fn handshake(&mut self) -> Result<()> {
        stream_on(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE)?;
        self.input_streaming = true;

        let mut source_changed = false;
        for _ in 0..HANDSHAKE_ITERS {
            if let Some(event_type) = dequeue_event_nonblocking(&self.device)? {
                if event_type == ffi::V4L2_EVENT_SOURCE_CHANGE {
                    source_changed = true;
                    break;
                }
            }
            thread::sleep(POLL_STEP);
        }
        if !source_changed {
            warn!("source-change event not observed within bound, proceeding with fallback geometry");
        }

        let geometry = match get_format_capture(&self.device) {
            Ok(g) => g,
            Err(e) => {
                warn!(error = %e, "querying negotiated output format failed, falling back to declared size");
                set_format_capture_fallback(&self.device, self.max_width, self.max_height)?;
                OutputGeometry {
                    width: self.max_width,
                    height: self.max_height,
                    plane_lengths: [
                        self.max_width * self.max_height,
                        self.max_width * self.max_height / 2,
                    ],
                }
            }
        };
        self.output_geometry = geometry;

        let count = request_buffers(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE, OUTPUT_BUFFER_COUNT)?;
        let mut output = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut desc = BufferDescriptor::new(index, OUTPUT_PLANE_COUNT);
            let planes = query_buffer(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE, index, OUTPUT_PLANE_COUNT)?;
            for (plane_idx, (offset, length)) in planes.iter().enumerate() {
                desc.ensure_mapped(self.device.fd(), plane_idx, *offset, *length)?;
            }
            queue_buffer(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE, index, &[0; OUTPUT_PLANE_COUNT])?;
            desc.queued = true;
            output.push(desc);
        }
        self.output = output;

        stream_on(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE)?;
        self.output_streaming = true;
        debug!(width = geometry.width, height = geometry.height, "output queue configured");
        Ok(())
    }

    /// Non-blocking dequeue of completed output buffers; assigns each to
    /// the oldest unsatisfied pending surface (FIFO — see `pending`'s
    /// doc comment).
    fn drain_output(&mut self) -> Result<()> {
        if !self.output_streaming {
            return Ok(());
        }
        while let Some(index) = dequeue_buffer_nonblocking(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE)? {
            self.output[index as usize].queued = false;
            if let Some(target) = self.pending.pop_front() {
                let mut state = target.state.lock().unwrap();
                state.buffer_index = Some(index);
                state.decoded = true;
                drop(state);
                target.condvar.notify_all();
            } else {
                warn!(index, "decoded buffer dequeued with no pending surface; re-queuing");
                queue_buffer(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE, index, &[0; OUTPUT_PLANE_COUNT])?;
                self.output[index as usize].queued = true;
            }
        }
        Ok(())
    }

    /// Drives the output dequeue under a bounded wall-clock budget; marks
    /// `target` decoded regardless of whether a buffer actually arrived
    /// (liveness-over-completeness, see spec §7/§9).
    pub fn sync_output(&mut self, target: &OutputBinding) -> Result<()> {
        for _ in 0..SYNC_ITERS {
            {
                let state = target.state.lock().unwrap();
                if state.decoded {
                    return Ok(());
                }
            }
            self.drain_output()?;
            {
                let state = target.state.lock().unwrap();
                if state.decoded {
                    return Ok(());
                }
            }
            thread::sleep(POLL_STEP);
        }
        warn!("SyncSurface bound elapsed without a decoded buffer; marking ready anyway");
        let mut state = target.state.lock().unwrap();
        state.decoded = true;
        Ok(())
    }

    /// Exports plane 0 of `index` as a dma-buf fd, caching the result.
    pub fn export_output_buffer(&mut self, index: u32) -> Result<c_int> {
        let desc = &mut self.output[index as usize];
        if let Some(fd) = desc.exported_fd {
            return Ok(fd);
        }
        let mut export = ffi::V4l2ExportBuffer {
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
            index,
            plane: 0,
            flags: libc::O_RDONLY as u32,
            fd: -1,
            reserved: [0; 11],
        };
        unsafe {
            ffi::ioctl(
                self.device.fd(),
                ffi::VIDIOC_EXPBUF,
                &mut export as *mut _ as *mut libc::c_void,
            )
        }
        .map_err(|e| M2mError::Ioctl("VIDIOC_EXPBUF", e))?;
        desc.exported_fd = Some(export.fd);
        Ok(export.fd)
    }

    /// Copies Y then UV planes of output buffer `index` into `y_out` /
    /// `uv_out`, mapping either plane on first use.
    pub fn read_back(&mut self, index: u32, y_out: &mut [u8], uv_out: &mut [u8]) -> Result<()> {
        let geometry = self.output_geometry;
        let fd = self.device.fd();
        let desc = &mut self.output[index as usize];

        desc.ensure_mapped(fd, 0, 0, geometry.plane_lengths[0])?;
        desc.ensure_mapped(fd, 1, 0, geometry.plane_lengths[1])?;

        if let Some(y) = desc.plane_slice(0) {
            let len = y.len().min(y_out.len());
            y_out[..len].copy_from_slice(&y[..len]);
        }
        if let Some(uv) = desc.plane_slice(1) {
            let len = uv.len().min(uv_out.len());
            uv_out[..len].copy_from_slice(&uv[..len]);
        }
        Ok(())
    }

    pub fn output_geometry(&self) -> OutputGeometry {
        self.output_geometry
    }

    /// Returns output buffer `index` to the kernel's free list. Called by
    /// the surface-binding layer when a surface is re-used as a render
    /// target and its previously-bound buffer must be released before the
    /// next picture's slices are appended (spec §3 invariant (i) / end-to-
    /// end scenario 5).
    pub fn requeue_output(&mut self, index: u32) -> Result<()> {
        let desc = &mut self.output[index as usize];
        if desc.queued {
            return Ok(());
        }
        queue_buffer(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE, index, &[0; OUTPUT_PLANE_COUNT])?;
        desc.queued = true;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.input_streaming {
            let _ = stream_off(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE);
        }
        if self.output_streaming {
            let _ = stream_off(&self.device, ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE);
        }
        // Buffer descriptors unmap themselves and close exported fds in
        // their own Drop; the device fd closes last.
    }
}

// --- free functions wrapping individual ioctls ---

fn set_format_output(device: &Device, fourcc: u32, plane_size: u32) -> Result<()> {
    let mut fmt = ffi::V4l2Format {
        type_: ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE,
        fmt: ffi::V4l2FormatUnion {
            pix_mp: ffi::V4l2PixFormatMplane {
                width: 0,
                height: 0,
                pixelformat: fourcc,
                field: 0,
                colorspace: 0,
                plane_fmt: Default::default(),
                num_planes: 1,
                flags: 0,
                ycbcr_enc_or_hsv_enc: 0,
                quantization: 0,
                xfer_func: 0,
                reserved: [0; 7],
            },
        },
    };
    unsafe {
        fmt.fmt.pix_mp.plane_fmt[0].sizeimage = plane_size;
        ffi::ioctl(device.fd(), ffi::VIDIOC_S_FMT, &mut fmt as *mut _ as *mut libc::c_void)
    }
    .map_err(|e| M2mError::Ioctl("VIDIOC_S_FMT(output)", e))?;
    Ok(())
}

fn get_format_capture(device: &Device) -> Result<OutputGeometry> {
    let mut fmt = ffi::V4l2Format {
        type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
        fmt: ffi::V4l2FormatUnion { raw_data: [0; 200] },
    };
    unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_G_FMT, &mut fmt as *mut _ as *mut libc::c_void) }
        .map_err(|e| M2mError::Ioctl("VIDIOC_G_FMT(capture)", e))?;
    let pix_mp = unsafe { fmt.fmt.pix_mp };
    Ok(OutputGeometry {
        width: pix_mp.width,
        height: pix_mp.height,
        plane_lengths: [
            pix_mp.plane_fmt[0].sizeimage,
            pix_mp.plane_fmt[1].sizeimage,
        ],
    })
}

fn set_format_capture_fallback(device: &Device, width: u32, height: u32) -> Result<()> {
    let mut fmt = ffi::V4l2Format {
        type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
        fmt: ffi::V4l2FormatUnion {
            pix_mp: ffi::V4l2PixFormatMplane {
                width,
                height,
                pixelformat: ffi::V4L2_PIX_FMT_YUV420,
                field: 0,
                colorspace: 0,
                plane_fmt: Default::default(),
                num_planes: 1,
                flags: 0,
                ycbcr_enc_or_hsv_enc: 0,
                quantization: 0,
                xfer_func: 0,
                reserved: [0; 7],
            },
        },
    };
    unsafe {
        fmt.fmt.pix_mp.plane_fmt[0].sizeimage = width * height * 3 / 2;
        ffi::ioctl(device.fd(), ffi::VIDIOC_S_FMT, &mut fmt as *mut _ as *mut libc::c_void)
    }
    .map_err(|e| M2mError::Ioctl("VIDIOC_S_FMT(capture fallback)", e))?;
    Ok(())
}

fn request_buffers(device: &Device, buf_type: u32, count: u32) -> Result<u32> {
    let mut req = ffi::V4l2RequestBuffers {
        count,
        type_: buf_type,
        memory: ffi::V4L2_MEMORY_MMAP,
        capabilities: 0,
        flags: 0,
        reserved: [0; 3],
    };
    unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_REQBUFS, &mut req as *mut _ as *mut libc::c_void) }
        .map_err(|e| M2mError::Ioctl("VIDIOC_REQBUFS", e))?;
    Ok(req.count)
}

/// Returns `(mem_offset, length)` for each of `num_planes` planes.
fn query_buffer(device: &Device, buf_type: u32, index: u32, num_planes: usize) -> Result<Vec<(u32, u32)>> {
    let mut planes = vec![ffi::V4l2Plane::default(); num_planes];
    let mut buf = ffi::V4l2Buffer {
        index,
        type_: buf_type,
        memory: ffi::V4L2_MEMORY_MMAP,
        m_planes: planes.as_mut_ptr(),
        length: num_planes as u32,
        ..Default::default()
    };
    unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_QUERYBUF, &mut buf as *mut _ as *mut libc::c_void) }
        .map_err(|e| M2mError::Ioctl("VIDIOC_QUERYBUF", e))?;
    Ok(planes.iter().map(|p| (p.m_mem_offset, p.length)).collect())
}

fn queue_buffer(device: &Device, buf_type: u32, index: u32, bytesused: &[u32]) -> Result<()> {
    let mut planes: Vec<ffi::V4l2Plane> = bytesused
        .iter()
        .map(|&b| ffi::V4l2Plane {
            bytesused: b,
            ..Default::default()
        })
        .collect();
    let mut buf = ffi::V4l2Buffer {
        index,
        type_: buf_type,
        memory: ffi::V4L2_MEMORY_MMAP,
        m_planes: planes.as_mut_ptr(),
        length: planes.len() as u32,
        ..Default::default()
    };
    unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_QBUF, &mut buf as *mut _ as *mut libc::c_void) }
        .map_err(|e| M2mError::Ioctl("VIDIOC_QBUF", e))?;
    Ok(())
}

/// Non-blocking dequeue; `Ok(None)` on `EAGAIN` (queue currently empty).
fn dequeue_buffer_nonblocking(device: &Device, buf_type: u32) -> Result<Option<u32>> {
    let mut planes = vec![ffi::V4l2Plane::default(); ffi::VIDEO_MAX_PLANES];
    let mut buf = ffi::V4l2Buffer {
        type_: buf_type,
        memory: ffi::V4L2_MEMORY_MMAP,
        m_planes: planes.as_mut_ptr(),
        length: planes.len() as u32,
        ..Default::default()
    };
    match unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_DQBUF, &mut buf as *mut _ as *mut libc::c_void) } {
        Ok(_) => Ok(Some(buf.index)),
        Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => Ok(None),
        Err(e) => Err(M2mError::Ioctl("VIDIOC_DQBUF", e)),
    }
}

fn stream_on(device: &Device, buf_type: u32) -> Result<()> {
    let mut t = buf_type as c_int;
    unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_STREAMON, &mut t as *mut _ as *mut libc::c_void) }
        .map_err(|e| M2mError::Ioctl("VIDIOC_STREAMON", e))?;
    Ok(())
}

fn stream_off(device: &Device, buf_type: u32) -> Result<()> {
    let mut t = buf_type as c_int;
    unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_STREAMOFF, &mut t as *mut _ as *mut libc::c_void) }
        .map_err(|e| M2mError::Ioctl("VIDIOC_STREAMOFF", e))?;
    Ok(())
}

fn subscribe_event(device: &Device, event_type: u32) -> Result<()> {
    let mut sub = ffi::V4l2EventSubscription {
        type_: event_type,
        id: 0,
        flags: 0,
        reserved: [0; 5],
    };
    unsafe {
        ffi::ioctl(
            device.fd(),
            ffi::VIDIOC_SUBSCRIBE_EVENT,
            &mut sub as *mut _ as *mut libc::c_void,
        )
    }
    .map_err(|e| M2mError::Ioctl("VIDIOC_SUBSCRIBE_EVENT", e))?;
    Ok(())
}

/// Non-blocking event dequeue; `Ok(None)` when no event is pending.
fn dequeue_event_nonblocking(device: &Device) -> Result<Option<u32>> {
    let mut event = ffi::V4l2Event {
        type_: 0,
        u: [0; 64],
        pending: 0,
        sequence: 0,
        timestamp_sec: 0,
        timestamp_nsec: 0,
        id: 0,
        reserved: [0; 8],
    };
    match unsafe { ffi::ioctl(device.fd(), ffi::VIDIOC_DQEVENT, &mut event as *mut _ as *mut libc::c_void) } {
        Ok(_) => Ok(Some(event.type_)),
        Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => Ok(None),
        Err(e) => Err(M2mError::Ioctl("VIDIOC_DQEVENT", e)),
    }
}
