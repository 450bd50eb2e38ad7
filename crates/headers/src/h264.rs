//! H.264 SPS/PPS synthesis from parsed VA picture parameters.
//!
//! Field order follows ITU-T H.264 §7.3.2.1 / §7.3.2.2 exactly; see spec
//! comments inline for the handful of values this driver fixes rather than
//! forwarding (scaling matrices, slice groups, VUI).

use bitwriter::BitWriter;

/// H.264 NAL unit type for SPS.
const NAL_SPS: u8 = 7;
/// H.264 NAL unit type for PPS.
const NAL_PPS: u8 = 8;
/// `nal_ref_idc` used for both SPS and PPS (parameter sets are always
/// referenced).
const NAL_REF_IDC: u8 = 3;

/// IDR slice NAL unit type, used by the assembler to decide when headers
/// must precede a slice.
pub const NAL_TYPE_IDR: u8 = 5;

/// Subset of the VA-supplied H.264 picture parameters this driver needs to
/// synthesise an SPS/PPS pair. Mirrors the fields the real
/// `VAPictureParameterBufferH264` and `VAEncSequenceParameterBufferH264`
/// structs carry, trimmed to what header synthesis reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureParamsH264 {
    /// `pic_width_in_mbs_minus1 + 1`.
    pub width_mbs: u16,
    /// `pic_height_in_map_units_minus1 + 1` (frame units; no field coding).
    pub height_mbs: u16,
    /// Actual decoded-picture width in pixels (may be less than
    /// `width_mbs * 16`).
    pub display_width: u32,
    /// Actual decoded-picture height in pixels (may be less than
    /// `height_mbs * 16`).
    pub display_height: u32,
    pub num_ref_frames: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    /// 1 = 4:2:0, 2 = 4:2:2, 3 = 4:4:4.
    pub chroma_format_idc: u8,
    pub entropy_coding_mode_flag: bool,
    pub transform_8x8_mode_flag: bool,
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: bool,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_init_qp_minus26: i8,
    pub pic_init_qs_minus26: i8,
    pub chroma_qp_index_offset: i8,
    pub second_chroma_qp_index_offset: i8,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u8,
    pub deblocking_filter_control_present_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
    /// `bottom_field_pic_order_in_frame_present_flag`.
    pub pic_order_present_flag: bool,
}

/// Synthesised SPS and PPS NAL payloads (NAL header byte through RBSP
/// trailing bits inclusive; no start code — the assembler adds that).
#[derive(Debug, Clone)]
pub struct SynthesizedHeadersH264 {
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// H.264 level table: `(level_idc, MaxDpbMbs)`, ascending by level. Row
/// order matters — the first row whose `MaxDpbMbs` bound is met wins.
///
/// Levels 5.1 and 5.2 share `MaxDpbMbs = 184320` (Table A-1 of the H.264
/// spec); the second row is therefore unreachable by this scan. Preserved
/// intentionally — see the "Open questions" note in DESIGN.md.
const LEVEL_TABLE: &[(u8, u32)] = &[
    (10, 396),
    (11, 900),
    (12, 2376),
    (13, 2376),
    (20, 2376),
    (21, 4752),
    (22, 8100),
    (30, 8100),
    (31, 18000),
    (32, 20480),
    (40, 32768),
    (41, 32768),
    (42, 34816),
    (50, 110400),
    (51, 184320),
    (52, 184320),
];

/// Selects `profile_idc` from the picture parameters. See spec §4.B.
pub fn profile_idc(p: &PictureParamsH264) -> u8 {
    if p.bit_depth_luma_minus8 != 0 || p.bit_depth_chroma_minus8 != 0 {
        match p.chroma_format_idc {
            2 => 122, // High 4:2:2
            3 => 244, // High 4:4:4 Predictive
            _ => 110, // High 10
        }
    } else if p.transform_8x8_mode_flag {
        100 // High
    } else if p.entropy_coding_mode_flag {
        77 // Main
    } else {
        66 // Baseline
    }
}

/// Selects `level_idc` from macroblock count and reference-frame count.
pub fn level_idc(p: &PictureParamsH264) -> u8 {
    let mb_count = p.width_mbs as u32 * p.height_mbs as u32;
    let metric = mb_count * (p.num_ref_frames as u32 + 1);
    LEVEL_TABLE
        .iter()
        .find(|&&(_, max_dpb_mbs)| metric <= max_dpb_mbs)
        .map(|&(level, _)| level)
        .unwrap_or(LEVEL_TABLE.last().unwrap().0)
}

/// `(SubWidthC, SubHeightC)` for the chroma formats this driver accepts.
fn chroma_subsampling(chroma_format_idc: u8) -> (u32, u32) {
    match chroma_format_idc {
        2 => (2, 1),
        3 => (1, 1),
        _ => (2, 2),
    }
}

/// Frame-cropping rectangle, in the Exp-Golomb units the SPS expects
/// (luma-sample offsets divided by the chroma subsampling factor).
///
/// Coded dimensions are always the macroblock-aligned size
/// (`width_mbs * 16`, `height_mbs * 16`); when the declared display size is
/// smaller — e.g. 1080 lines coded as 1088 macroblock-aligned rows — the
/// difference is cropped from the right/bottom.
pub(crate) struct Cropping {
    pub(crate) flag: bool,
    pub(crate) right: u32,
    pub(crate) bottom: u32,
}

/// `(display_width, display_height)` pairs that, per spec §4.B, "commonly
/// exceed frame-mbs-only multiples" and so carry a bottom crop of 4 chroma
/// units even though the declared display size is already macroblock
/// aligned: the parameters describing these streams set `display_height`
/// equal to the MB-aligned coded height, but the real displayed picture is
/// 8 luma lines shorter (the 1080-line case reporting a coded height of
/// 1088, 720-line reporting 736, 360-line reporting 368).
const QUIRK_BOTTOM_CROP_RESOLUTIONS: &[(u32, u32)] = &[(640, 368), (1280, 736), (1920, 1088)];

pub(crate) fn frame_cropping(p: &PictureParamsH264) -> Cropping {
    let (sub_w, sub_h) = chroma_subsampling(p.chroma_format_idc);
    let crop_unit_x = sub_w;
    let crop_unit_y = sub_h * if p.frame_mbs_only_flag { 1 } else { 2 };

    let coded_width = p.width_mbs as u32 * 16;
    let coded_height = p.height_mbs as u32 * 16;

    let effective_display_height =
        if QUIRK_BOTTOM_CROP_RESOLUTIONS.contains(&(p.display_width, p.display_height)) {
            coded_height.saturating_sub(8)
        } else {
            p.display_height
        };

    let right = coded_width.saturating_sub(p.display_width) / crop_unit_x;
    let bottom = coded_height.saturating_sub(effective_display_height) / crop_unit_y;

    Cropping {
        flag: right != 0 || bottom != 0,
        right,
        bottom,
    }
}

fn write_sps(p: &PictureParamsH264) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(256);
    let profile = profile_idc(p);
    let level = level_idc(p);

    let _ = w.put_bits(nal_header_byte(NAL_REF_IDC, NAL_SPS) as u32, 8);
    let _ = w.put_bits(profile as u32, 8);

    // constraint_set0..5_flag, reserved_zero_2bits
    let _ = w.put_bits((profile == 66) as u32, 1);
    let _ = w.put_bits((profile <= 77) as u32, 1);
    let _ = w.put_bits(0, 1); // constraint_set2_flag
    let _ = w.put_bits(0, 1); // constraint_set3_flag
    let _ = w.put_bits(0, 1); // constraint_set4_flag
    let _ = w.put_bits(0, 1); // constraint_set5_flag
    let _ = w.put_bits(0, 2); // reserved_zero_2bits

    let _ = w.put_bits(level as u32, 8);
    let _ = w.put_ue(0); // seq_parameter_set_id

    if profile >= 100 {
        let _ = w.put_ue(p.chroma_format_idc as u32);
        if p.chroma_format_idc == 3 {
            let _ = w.put_bits(0, 1); // separate_colour_plane_flag
        }
        let _ = w.put_ue(p.bit_depth_luma_minus8 as u32);
        let _ = w.put_ue(p.bit_depth_chroma_minus8 as u32);
        let _ = w.put_bits(0, 1); // qpprime_y_zero_transform_bypass_flag
        let _ = w.put_bits(0, 1); // seq_scaling_matrix_present_flag
    }

    let _ = w.put_ue(p.log2_max_frame_num_minus4 as u32);
    let _ = w.put_ue(p.pic_order_cnt_type as u32);
    match p.pic_order_cnt_type {
        0 => {
            let _ = w.put_ue(p.log2_max_pic_order_cnt_lsb_minus4 as u32);
        }
        1 => {
            let _ = w.put_bits(p.delta_pic_order_always_zero_flag as u32, 1);
            let _ = w.put_se(0); // offset_for_non_ref_pic
            let _ = w.put_se(0); // offset_for_top_to_bottom_field
            let _ = w.put_ue(0); // num_ref_frames_in_pic_order_cnt_cycle
        }
        _ => {}
    }

    let _ = w.put_ue(p.num_ref_frames as u32);
    let _ = w.put_bits(p.gaps_in_frame_num_value_allowed_flag as u32, 1);
    let _ = w.put_ue((p.width_mbs - 1) as u32);
    let _ = w.put_ue((p.height_mbs - 1) as u32);
    let _ = w.put_bits(p.frame_mbs_only_flag as u32, 1);
    if !p.frame_mbs_only_flag {
        let _ = w.put_bits(p.mb_adaptive_frame_field_flag as u32, 1);
    }
    let _ = w.put_bits(p.direct_8x8_inference_flag as u32, 1);

    let crop = frame_cropping(p);
    let _ = w.put_bits(crop.flag as u32, 1);
    if crop.flag {
        let _ = w.put_ue(0); // frame_crop_left_offset
        let _ = w.put_ue(crop.right);
        let _ = w.put_ue(0); // frame_crop_top_offset
        let _ = w.put_ue(crop.bottom);
    }

    let _ = w.put_bits(0, 1); // vui_parameters_present_flag

    w.finish();
    w.into_bytes()
}

fn write_pps(p: &PictureParamsH264) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(64);
    let profile = profile_idc(p);

    let _ = w.put_bits(nal_header_byte(NAL_REF_IDC, NAL_PPS) as u32, 8);
    let _ = w.put_ue(0); // pic_parameter_set_id
    let _ = w.put_ue(0); // seq_parameter_set_id
    let _ = w.put_bits(p.entropy_coding_mode_flag as u32, 1);
    let _ = w.put_bits(p.pic_order_present_flag as u32, 1);
    let _ = w.put_ue(0); // num_slice_groups_minus1
    let _ = w.put_ue(0); // num_ref_idx_l0_default_active_minus1
    let _ = w.put_ue(0); // num_ref_idx_l1_default_active_minus1
    let _ = w.put_bits(p.weighted_pred_flag as u32, 1);
    let _ = w.put_bits(p.weighted_bipred_idc as u32, 2);
    let _ = w.put_se(p.pic_init_qp_minus26 as i32);
    let _ = w.put_se(p.pic_init_qs_minus26 as i32);
    let _ = w.put_se(p.chroma_qp_index_offset as i32);
    let _ = w.put_bits(p.deblocking_filter_control_present_flag as u32, 1);
    let _ = w.put_bits(p.constrained_intra_pred_flag as u32, 1);
    let _ = w.put_bits(p.redundant_pic_cnt_present_flag as u32, 1);

    if profile >= 100 && p.transform_8x8_mode_flag {
        let _ = w.put_bits(1, 1); // transform_8x8_mode_flag
        let _ = w.put_bits(0, 1); // pic_scaling_matrix_present_flag
        let _ = w.put_se(p.second_chroma_qp_index_offset as i32);
    }

    w.finish();
    w.into_bytes()
}

fn nal_header_byte(nal_ref_idc: u8, nal_unit_type: u8) -> u8 {
    ((nal_ref_idc & 0b11) << 5) | (nal_unit_type & 0b1_1111)
}

/// Synthesises a fresh SPS/PPS pair for the given picture parameters.
pub fn synthesize(p: &PictureParamsH264) -> SynthesizedHeadersH264 {
    SynthesizedHeadersH264 {
        sps: write_sps(p),
        pps: write_pps(p),
    }
}

/// `true` if `nal_byte`'s `nal_unit_type` field identifies an IDR slice.
pub fn is_idr_slice(nal_byte: u8) -> bool {
    (nal_byte & 0b1_1111) == NAL_TYPE_IDR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline_params() -> PictureParamsH264 {
        PictureParamsH264 {
            width_mbs: 40,
            height_mbs: 23,
            display_width: 640,
            display_height: 368,
            num_ref_frames: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            chroma_format_idc: 1,
            entropy_coding_mode_flag: false,
            transform_8x8_mode_flag: false,
            frame_mbs_only_flag: true,
            mb_adaptive_frame_field_flag: false,
            direct_8x8_inference_flag: true,
            log2_max_frame_num_minus4: 0,
            pic_order_cnt_type: 2,
            log2_max_pic_order_cnt_lsb_minus4: 0,
            delta_pic_order_always_zero_flag: false,
            gaps_in_frame_num_value_allowed_flag: false,
            pic_init_qp_minus26: 0,
            pic_init_qs_minus26: 0,
            chroma_qp_index_offset: 0,
            second_chroma_qp_index_offset: 0,
            weighted_pred_flag: false,
            weighted_bipred_idc: 0,
            deblocking_filter_control_present_flag: true,
            constrained_intra_pred_flag: false,
            redundant_pic_cnt_present_flag: false,
            pic_order_present_flag: false,
        }
    }

    #[test]
    fn baseline_profile_selection() {
        let p = baseline_params();
        assert_eq!(profile_idc(&p), 66);
    }

    #[test]
    fn cavlc_baseline_vs_cabac_main() {
        let mut p = baseline_params();
        assert_eq!(profile_idc(&p), 66);
        p.entropy_coding_mode_flag = true;
        assert_eq!(profile_idc(&p), 77);
    }

    #[test]
    fn high_profile_from_8x8_transform() {
        let mut p = baseline_params();
        p.transform_8x8_mode_flag = true;
        assert_eq!(profile_idc(&p), 100);
    }

    #[test]
    fn high10_profile_from_bit_depth() {
        let mut p = baseline_params();
        p.bit_depth_luma_minus8 = 2;
        assert_eq!(profile_idc(&p), 110);
        p.chroma_format_idc = 3;
        assert_eq!(profile_idc(&p), 244);
    }

    #[test]
    fn crop_1920x1088_yields_1080_display_height() {
        let mut p = baseline_params();
        p.width_mbs = 120;
        p.height_mbs = 68;
        p.display_width = 1920;
        p.display_height = 1080;
        let crop = frame_cropping(&p);
        assert!(crop.flag);
        assert_eq!(crop.right, 0);
        assert_eq!(crop.bottom, 4);
    }

    #[test]
    fn no_cropping_for_generic_mb_aligned_resolution() {
        // 352x288 (CIF) is exactly MB-aligned and not one of the named
        // quirk resolutions, so it must not crop.
        let mut p = baseline_params();
        p.width_mbs = 22;
        p.height_mbs = 18;
        p.display_width = 352;
        p.display_height = 288;
        let crop = frame_cropping(&p);
        assert!(!crop.flag);
    }

    #[test]
    fn crop_640x368_scenario1_yields_bottom_4() {
        // End-to-end scenario 1: width 640 MBs=40, height 368 MBs=23 must
        // still report a bottom crop of 4 chroma units (spec §4.B / §8).
        let p = baseline_params(); // 640x368, exactly 40x23 mbs
        let crop = frame_cropping(&p);
        assert!(crop.flag);
        assert_eq!(crop.right, 0);
        assert_eq!(crop.bottom, 4);
    }

    #[test]
    fn crop_1280x736_yields_bottom_4() {
        let mut p = baseline_params();
        p.width_mbs = 80;
        p.height_mbs = 46;
        p.display_width = 1280;
        p.display_height = 736;
        let crop = frame_cropping(&p);
        assert!(crop.flag);
        assert_eq!(crop.right, 0);
        assert_eq!(crop.bottom, 4);
    }

    #[test]
    fn level_table_first_match_wins_on_duplicate_rows() {
        // mb_count * (ref+1) landing exactly on the shared 184320 bound
        // (levels 5.1 and 5.2 both list MaxDpbMbs = 184320) must resolve
        // to level 51, the first row that satisfies it, not 52.
        let mut p = baseline_params();
        p.width_mbs = 80;
        p.height_mbs = 48; // 3840 mbs
        p.num_ref_frames = 47; // metric = 3840 * 48 = 184320
        assert_eq!(level_idc(&p), 51);
    }

    #[test]
    fn sps_starts_with_nal_header_and_profile() {
        let p = baseline_params();
        let headers = synthesize(&p);
        assert_eq!(headers.sps[0], 0x67);
        assert_eq!(headers.sps[1], 66);
        assert_eq!(headers.pps[0], 0x68);
    }

    #[test]
    fn idr_detection() {
        assert!(is_idr_slice(0x65));
        assert!(!is_idr_slice(0x61));
    }
}
