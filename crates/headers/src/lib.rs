//! Header synthesis and Annex-B bitstream assembly for the codecs this
//! driver decodes.
//!
//! `h264` and `hevc` turn parsed VA picture parameters into synthesised
//! parameter-set NALs; `assembler` decides, per slice, whether those NALs
//! need to precede the slice payload and frames everything with Annex-B
//! start codes.

pub mod assembler;
pub mod h264;
pub mod hevc;

use std::fmt;

/// Error type for header synthesis and assembly. Currently uninhabited:
/// every picture-parameter combination this driver accepts synthesises
/// successfully. Kept so [`assembler::CodecHeaders`] stays `Result`-shaped
/// for codecs that may one day need to reject malformed parameters.
#[derive(Debug)]
pub enum HeaderError {}

impl fmt::Display for HeaderError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
