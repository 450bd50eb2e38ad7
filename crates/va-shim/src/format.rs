//! Codec identity ↔ kernel pixel-format mapping (spec §6) and the
//! reverse mapping used to populate the advertised `VAProfile` list from
//! whichever fourccs the kernel driver actually reports.

use m2m::Device;

use crate::types::{
    VAProfile, VA_PROFILE_H264_CONSTRAINED_BASELINE, VA_PROFILE_H264_HIGH, VA_PROFILE_H264_MAIN,
    VA_PROFILE_HEVC_MAIN, VA_PROFILE_HEVC_MAIN10, VA_PROFILE_VP8_VERSION0_3, VA_PROFILE_VP9_PROFILE0,
    VA_PROFILE_VP9_PROFILE2,
};

/// The codecs this driver's header synthesiser / assembler knows about.
/// AV1 is included for fourcc pass-through only (spec §9 open question):
/// it advertises via format mapping but has no header synthesiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
}

impl Codec {
    pub fn fourcc(self) -> u32 {
        match self {
            Codec::H264 => m2m::ffi::V4L2_PIX_FMT_H264,
            Codec::Hevc => m2m::ffi::V4L2_PIX_FMT_HEVC,
            Codec::Vp8 => m2m::ffi::V4L2_PIX_FMT_VP8,
            Codec::Vp9 => m2m::ffi::V4L2_PIX_FMT_VP9,
            Codec::Av1 => m2m::ffi::V4L2_PIX_FMT_AV1,
        }
    }

    fn from_fourcc(fourcc: u32) -> Option<Codec> {
        match fourcc {
            f if f == m2m::ffi::V4L2_PIX_FMT_H264 => Some(Codec::H264),
            f if f == m2m::ffi::V4L2_PIX_FMT_HEVC => Some(Codec::Hevc),
            f if f == m2m::ffi::V4L2_PIX_FMT_VP8 => Some(Codec::Vp8),
            f if f == m2m::ffi::V4L2_PIX_FMT_VP9 => Some(Codec::Vp9),
            f if f == m2m::ffi::V4L2_PIX_FMT_AV1 => Some(Codec::Av1),
            _ => None,
        }
    }

    pub fn from_profile(profile: VAProfile) -> Option<Codec> {
        match profile {
            VA_PROFILE_H264_CONSTRAINED_BASELINE | VA_PROFILE_H264_MAIN | VA_PROFILE_H264_HIGH => {
                Some(Codec::H264)
            }
            VA_PROFILE_HEVC_MAIN | VA_PROFILE_HEVC_MAIN10 => Some(Codec::Hevc),
            VA_PROFILE_VP8_VERSION0_3 => Some(Codec::Vp8),
            VA_PROFILE_VP9_PROFILE0 | VA_PROFILE_VP9_PROFILE2 => Some(Codec::Vp9),
            _ => None,
        }
    }

    /// `VAProfile` values this codec's fourcc advertises, per spec §6's
    /// reverse-mapping table.
    fn profiles(self) -> &'static [VAProfile] {
        match self {
            Codec::H264 => &[
                VA_PROFILE_H264_CONSTRAINED_BASELINE,
                VA_PROFILE_H264_MAIN,
                VA_PROFILE_H264_HIGH,
            ],
            Codec::Hevc => &[VA_PROFILE_HEVC_MAIN, VA_PROFILE_HEVC_MAIN10],
            Codec::Vp9 => &[VA_PROFILE_VP9_PROFILE0, VA_PROFILE_VP9_PROFILE2],
            Codec::Vp8 => &[VA_PROFILE_VP8_VERSION0_3],
            Codec::Av1 => &[],
        }
    }
}

/// Queries the kernel's enumerated output-queue (bitstream) pixel formats
/// and expands each recognised fourcc into its advertised `VAProfile`
/// list. Falls back to advertising every known codec's profiles if device
/// enumeration fails (e.g. running without hardware present in a test
/// harness) rather than leaving the profile list empty.
pub fn supported_profiles() -> Vec<VAProfile> {
    match enumerate_device_codecs() {
        Ok(codecs) if !codecs.is_empty() => codecs.iter().flat_map(|c| c.profiles().iter().copied()).collect(),
        _ => [Codec::H264, Codec::Hevc, Codec::Vp8, Codec::Vp9]
            .iter()
            .flat_map(|c| c.profiles().iter().copied())
            .collect(),
    }
}

fn enumerate_device_codecs() -> m2m::Result<Vec<Codec>> {
    let device = Device::discover()?;
    let fourccs = device.enumerate_formats(m2m::ffi::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE)?;
    Ok(fourccs.into_iter().filter_map(Codec::from_fourcc).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h264_profile_round_trips_to_codec() {
        assert_eq!(Codec::from_profile(VA_PROFILE_H264_HIGH), Some(Codec::H264));
    }

    #[test]
    fn hevc_fourcc_round_trips() {
        assert_eq!(Codec::from_fourcc(Codec::Hevc.fourcc()), Some(Codec::Hevc));
    }

    #[test]
    fn av1_advertises_no_profiles() {
        assert!(Codec::Av1.profiles().is_empty());
    }
}
