//! M2M session manager: queue setup, the source-change handshake, input
//! recycling, output dequeue, and descriptor export/readback for ARM VPU
//! stateful kernel video decoders.
//!
//! This crate owns the *stateful* half of the bridge described by the
//! workspace: it knows nothing about parsed VA parameters or Annex-B
//! framing (that's `headers`), only about moving bytes through two V4L2
//! multi-planar queues.

pub mod buffer;
pub mod device;
pub mod error;
pub mod ffi;
pub mod session;

pub use buffer::BufferDescriptor;
pub use device::Device;
pub use error::{M2mError, Result};
pub use session::{OutputBinding, OutputGeometry, Session};
