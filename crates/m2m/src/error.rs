use std::fmt;
use std::io;

/// Errors raised by the M2M session manager. Every fatal-kernel-error path
/// (stream-on failure, format-set failure, mmap failure) converts into one
/// of these and is propagated to the caller rather than panicking; the
/// session is left in a coherent but non-progressing state, matching the
/// upper layer's "destroy it" contract.
#[derive(Debug)]
pub enum M2mError {
    /// No usable M2M device node was found among the candidates tried.
    DeviceOpen(io::Error),
    /// A named ioctl failed; the `&'static str` identifies which one for
    /// logging.
    Ioctl(&'static str, io::Error),
    Mmap(io::Error),
    /// Input queue full after the bounded recycle wait, or output queue
    /// empty after the bounded dequeue wait.
    Transient,
    /// A bounded wait (source-change, recycle, sync) elapsed without the
    /// expected kernel event.
    Timeout,
}

impl fmt::Display for M2mError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            M2mError::DeviceOpen(e) => write!(f, "no usable M2M device node found: {e}"),
            M2mError::Ioctl(name, e) => write!(f, "ioctl {name} failed: {e}"),
            M2mError::Mmap(e) => write!(f, "mmap failed: {e}"),
            M2mError::Transient => write!(f, "kernel queue transiently busy"),
            M2mError::Timeout => write!(f, "bounded wait elapsed"),
        }
    }
}

impl std::error::Error for M2mError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            M2mError::DeviceOpen(e) | M2mError::Ioctl(_, e) | M2mError::Mmap(e) => Some(e),
            M2mError::Transient | M2mError::Timeout => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, M2mError>;
