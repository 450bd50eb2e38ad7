//! `VAConfig`: the (profile, entrypoint) pair a consumer negotiates before
//! creating a context. Only `VAEntrypointVLD` (decode) is supported; any
//! other entrypoint, or a profile this driver has no codec for, is
//! rejected at creation time with no state mutation.

use crate::format::Codec;
use crate::types::{VAEntrypoint, VAProfile, VA_ENTRYPOINT_VLD};

pub struct Config {
    pub profile: VAProfile,
    pub entrypoint: VAEntrypoint,
    pub codec: Codec,
}

#[derive(Debug)]
pub enum ConfigError {
    UnsupportedProfile,
    UnsupportedEntrypoint,
}

impl Config {
    pub fn create(profile: VAProfile, entrypoint: VAEntrypoint) -> Result<Config, ConfigError> {
        if entrypoint != VA_ENTRYPOINT_VLD {
            return Err(ConfigError::UnsupportedEntrypoint);
        }
        let codec = Codec::from_profile(profile).ok_or(ConfigError::UnsupportedProfile)?;
        Ok(Config {
            profile,
            entrypoint,
            codec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VA_PROFILE_H264_HIGH, VA_PROFILE_HEVC_MAIN};

    #[test]
    fn vld_h264_high_accepted() {
        let cfg = Config::create(VA_PROFILE_H264_HIGH, VA_ENTRYPOINT_VLD).unwrap();
        assert_eq!(cfg.codec, Codec::H264);
    }

    #[test]
    fn non_vld_entrypoint_rejected() {
        assert!(matches!(
            Config::create(VA_PROFILE_HEVC_MAIN, 2),
            Err(ConfigError::UnsupportedEntrypoint)
        ));
    }

    #[test]
    fn unknown_profile_rejected() {
        assert!(matches!(
            Config::create(9999, VA_ENTRYPOINT_VLD),
            Err(ConfigError::UnsupportedProfile)
        ));
    }
}
