//! HEVC VPS/SPS/PPS synthesis from parsed VA picture parameters.
//!
//! Field order follows ITU-T H.265 §7.3.2 exactly for the single-layer,
//! single-temporal-sub-layer case this driver targets (no scalability, no
//! temporal sub-layering — `vps_max_sub_layers_minus1` /
//! `sps_max_sub_layers_minus1` are always 0).

use bitwriter::BitWriter;

const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;
const NAL_IDR_W_RADL: u8 = 19;
const NAL_IDR_N_LP: u8 = 20;
const NAL_CRA_NUT: u8 = 21;

/// HEVC profile idc for Main.
const PROFILE_MAIN: u8 = 1;
/// HEVC profile idc for Main 10.
const PROFILE_MAIN10: u8 = 2;

/// Subset of the VA-supplied HEVC picture/sequence parameters needed to
/// synthesise VPS/SPS/PPS. Mirrors the fields carried by
/// `VAPictureParameterBufferHEVC` / the HEVC `VAEncSequenceParameterBuffer`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureParamsHevc {
    pub display_width: u32,
    pub display_height: u32,
    /// `log2(CtbSizeY)`, typically 6 (64x64 CTBs).
    pub ctb_log2_size_y: u8,
    pub min_cb_log2_size_y: u8,
    pub min_tb_log2_size_y: u8,
    pub max_transform_hierarchy_depth_inter: u8,
    pub max_transform_hierarchy_depth_intra: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    /// 1 = 4:2:0, 3 = 4:4:4.
    pub chroma_format_idc: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    /// Echoed into both `vps_max_dec_pic_buffering_minus1[0]` and
    /// `sps_max_dec_pic_buffering_minus1[0]`.
    pub max_dec_pic_buffering_minus1: u8,
    pub amp_enabled_flag: bool,
    pub sample_adaptive_offset_enabled_flag: bool,
    pub sps_temporal_mvp_enabled_flag: bool,
    pub strong_intra_smoothing_enabled_flag: bool,

    pub sign_data_hiding_enabled_flag: bool,
    pub init_qp_minus26: i8,
    pub constrained_intra_pred_flag: bool,
    pub transform_skip_enabled_flag: bool,
    pub cu_qp_delta_enabled_flag: bool,
    pub diff_cu_qp_delta_depth: u8,
    pub pps_cb_qp_offset: i8,
    pub pps_cr_qp_offset: i8,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_flag: bool,
    pub pps_loop_filter_across_slices_enabled_flag: bool,
    pub deblocking_filter_override_enabled_flag: bool,
    pub pps_deblocking_filter_disabled_flag: bool,
    pub pps_beta_offset_div2: i8,
    pub pps_tc_offset_div2: i8,
}

#[derive(Debug, Clone)]
pub struct SynthesizedHeadersHevc {
    pub vps: Vec<u8>,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// HEVC level table: `(MaxLumaPs, level_idc)`. `level_idc` is already
/// `level_number * 30` (general_level_idc encoding).
const LEVEL_TABLE: &[(u64, u8)] = &[
    (36_864, 30),
    (122_880, 60),
    (245_760, 63),
    (552_960, 90),
    (983_040, 93),
    (2_228_224, 120),
    (8_912_896, 150),
    (35_651_584, 180),
];

/// Minimum luma sample count for tier selection to consider "High" at all
/// (approximately 4K).
const HIGH_TIER_MIN_SAMPLES: u64 = 8_294_400;

fn luma_sample_count(p: &PictureParamsHevc) -> u64 {
    p.display_width as u64 * p.display_height as u64
}

/// HEVC profile idc: Main-10 if any bit-depth extension is requested, else
/// Main.
pub fn profile_idc(p: &PictureParamsHevc) -> u8 {
    if p.bit_depth_luma_minus8 > 0 {
        PROFILE_MAIN10
    } else {
        PROFILE_MAIN
    }
}

/// `general_level_idc`, derived from the luma sample count.
pub fn level_idc(p: &PictureParamsHevc) -> u8 {
    let samples = luma_sample_count(p);
    LEVEL_TABLE
        .iter()
        .find(|&&(max_luma_ps, _)| samples <= max_luma_ps)
        .map(|&(_, level)| level)
        .unwrap_or(LEVEL_TABLE.last().unwrap().1)
}

/// `true` for the High tier.
pub fn high_tier(p: &PictureParamsHevc) -> bool {
    level_idc(p) >= 150 && luma_sample_count(p) >= HIGH_TIER_MIN_SAMPLES
}

fn profile_compatibility_flags(profile: u8) -> u32 {
    // general_profile_compatibility_flag[j] occupies bit (31 - j), written
    // MSB-first, j = 0..31.
    match profile {
        PROFILE_MAIN10 => 1 << 29, // flag[2]
        _ => (1 << 30) | (1 << 29), // Main sets flag[1] and flag[2]
    }
}

/// `(SubWidthC, SubHeightC)` for the chroma formats this driver accepts.
fn chroma_subsampling(chroma_format_idc: u8) -> (u32, u32) {
    match chroma_format_idc {
        3 => (1, 1),
        _ => (2, 2),
    }
}

struct ConformanceWindow {
    flag: bool,
    right: u32,
    bottom: u32,
}

fn coded_dimensions(p: &PictureParamsHevc) -> (u32, u32) {
    let ctb = 1u32 << p.ctb_log2_size_y;
    let align = |v: u32| -> u32 { ((v + ctb - 1) / ctb) * ctb };
    (align(p.display_width), align(p.display_height))
}

fn conformance_window(p: &PictureParamsHevc) -> ConformanceWindow {
    let (coded_w, coded_h) = coded_dimensions(p);
    let (sub_w, sub_h) = chroma_subsampling(p.chroma_format_idc);
    let right = coded_w.saturating_sub(p.display_width) / sub_w;
    let bottom = coded_h.saturating_sub(p.display_height) / sub_h;
    ConformanceWindow {
        flag: right != 0 || bottom != 0,
        right,
        bottom,
    }
}

fn write_profile_tier_level(w: &mut BitWriter, profile: u8, high_tier: bool, level: u8) {
    let _ = w.put_bits(0, 2); // general_profile_space
    let _ = w.put_bits(high_tier as u32, 1); // general_tier_flag
    let _ = w.put_bits(profile as u32, 5); // general_profile_idc
    let _ = w.put_bits(profile_compatibility_flags(profile), 32);
    let _ = w.put_bits(1, 1); // general_progressive_source_flag
    let _ = w.put_bits(0, 1); // general_interlaced_source_flag
    let _ = w.put_bits(0, 1); // general_non_packed_constraint_flag
    let _ = w.put_bits(1, 1); // general_frame_only_constraint_flag
    let _ = w.put_bits(0, 32); // general_reserved_zero_44bits, high half
    let _ = w.put_bits(0, 12); // general_reserved_zero_44bits, low half
    let _ = w.put_bits(level as u32, 8); // general_level_idc
    // vps/sps_max_sub_layers_minus1 == 0: no sub-layer loops.
}

fn nal_header(nal_unit_type: u8) -> [u8; 2] {
    let byte0 = nal_unit_type << 1; // forbidden_zero_bit=0, nuh_layer_id high bit=0
    let byte1 = 1u8; // nuh_layer_id low bits=0, nuh_temporal_id_plus1=1
    [byte0, byte1]
}

fn write_vps(p: &PictureParamsHevc) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(64);
    let header = nal_header(NAL_VPS);
    w.put_bytes(&header);

    let _ = w.put_bits(0, 4); // vps_video_parameter_set_id
    let _ = w.put_bits(1, 1); // vps_base_layer_internal_flag
    let _ = w.put_bits(1, 1); // vps_base_layer_available_flag
    let _ = w.put_bits(0, 6); // vps_max_layers_minus1
    let _ = w.put_bits(0, 3); // vps_max_sub_layers_minus1
    let _ = w.put_bits(1, 1); // vps_temporal_id_nesting_flag
    let _ = w.put_bits(0xFFFF, 16); // vps_reserved_0xffff_16bits

    let profile = profile_idc(p);
    let tier = high_tier(p);
    let level = level_idc(p);
    write_profile_tier_level(&mut w, profile, tier, level);

    let _ = w.put_bits(0, 1); // vps_sub_layer_ordering_info_present_flag
    let _ = w.put_ue(p.max_dec_pic_buffering_minus1 as u32); // vps_max_dec_pic_buffering_minus1[0]
    let _ = w.put_ue(0); // vps_max_num_reorder_pics[0] -- zero reordering
    let _ = w.put_ue(0); // vps_max_latency_increase_plus1[0]

    let _ = w.put_bits(0, 6); // vps_max_layer_id
    let _ = w.put_ue(0); // vps_num_layer_sets_minus1
    let _ = w.put_bits(0, 1); // vps_timing_info_present_flag
    let _ = w.put_bits(0, 1); // vps_extension_flag

    w.finish();
    w.into_bytes()
}

fn write_vui(w: &mut BitWriter, p: &PictureParamsHevc) {
    let _ = w.put_bits(0, 1); // aspect_ratio_info_present_flag
    let _ = w.put_bits(0, 1); // overscan_info_present_flag

    let _ = w.put_bits(1, 1); // video_signal_type_present_flag
    let _ = w.put_bits(5, 3); // video_format: unspecified
    let _ = w.put_bits(0, 1); // video_full_range_flag
    let _ = w.put_bits(1, 1); // colour_description_present_flag
    if p.bit_depth_luma_minus8 > 0 {
        let _ = w.put_bits(9, 8); // colour_primaries: BT.2020
        let _ = w.put_bits(16, 8); // transfer_characteristics: SMPTE ST 2084 (PQ)
        let _ = w.put_bits(9, 8); // matrix_coeffs: BT.2020 non-constant luminance
    } else {
        let _ = w.put_bits(1, 8); // colour_primaries: BT.709
        let _ = w.put_bits(1, 8); // transfer_characteristics: BT.709
        let _ = w.put_bits(1, 8); // matrix_coeffs: BT.709
    }

    let _ = w.put_bits(0, 1); // chroma_loc_info_present_flag
    let _ = w.put_bits(0, 1); // neutral_chroma_indication_flag
    let _ = w.put_bits(0, 1); // field_seq_flag
    let _ = w.put_bits(0, 1); // frame_field_info_present_flag
    let _ = w.put_bits(0, 1); // default_display_window_flag
    let _ = w.put_bits(0, 1); // vui_timing_info_present_flag
    let _ = w.put_bits(0, 1); // bitstream_restriction_flag
}

fn write_sps(p: &PictureParamsHevc) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(128);
    let header = nal_header(NAL_SPS);
    w.put_bytes(&header);

    let _ = w.put_bits(0, 4); // sps_video_parameter_set_id
    let _ = w.put_bits(0, 3); // sps_max_sub_layers_minus1
    let _ = w.put_bits(1, 1); // sps_temporal_id_nesting_flag

    let profile = profile_idc(p);
    let tier = high_tier(p);
    let level = level_idc(p);
    write_profile_tier_level(&mut w, profile, tier, level);

    let _ = w.put_ue(0); // sps_seq_parameter_set_id
    let _ = w.put_ue(p.chroma_format_idc as u32);
    if p.chroma_format_idc == 3 {
        let _ = w.put_bits(0, 1); // separate_colour_plane_flag
    }

    let (coded_w, coded_h) = coded_dimensions(p);
    let _ = w.put_ue(coded_w);
    let _ = w.put_ue(coded_h);

    let conf = conformance_window(p);
    let _ = w.put_bits(conf.flag as u32, 1);
    if conf.flag {
        let _ = w.put_ue(0); // conf_win_left_offset
        let _ = w.put_ue(conf.right);
        let _ = w.put_ue(0); // conf_win_top_offset
        let _ = w.put_ue(conf.bottom);
    }

    let _ = w.put_ue(p.bit_depth_luma_minus8 as u32);
    let _ = w.put_ue(p.bit_depth_chroma_minus8 as u32);
    let _ = w.put_ue(p.log2_max_pic_order_cnt_lsb_minus4 as u32);

    let _ = w.put_bits(0, 1); // sps_sub_layer_ordering_info_present_flag
    let _ = w.put_ue(p.max_dec_pic_buffering_minus1 as u32);
    let _ = w.put_ue(0); // sps_max_num_reorder_pics[0]
    let _ = w.put_ue(0); // sps_max_latency_increase_plus1[0]

    let _ = w.put_ue((p.min_cb_log2_size_y.saturating_sub(3)) as u32); // log2_min_luma_coding_block_size_minus3
    let _ = w.put_ue((p.ctb_log2_size_y - p.min_cb_log2_size_y) as u32); // log2_diff_max_min_luma_coding_block_size
    let _ = w.put_ue((p.min_tb_log2_size_y.saturating_sub(2)) as u32); // log2_min_luma_transform_block_size_minus2
    let _ = w.put_ue((p.min_cb_log2_size_y - p.min_tb_log2_size_y) as u32); // log2_diff_max_min_luma_transform_block_size
    let _ = w.put_ue(p.max_transform_hierarchy_depth_inter as u32);
    let _ = w.put_ue(p.max_transform_hierarchy_depth_intra as u32);

    let _ = w.put_bits(0, 1); // scaling_list_enabled_flag
    let _ = w.put_bits(p.amp_enabled_flag as u32, 1);
    let _ = w.put_bits(p.sample_adaptive_offset_enabled_flag as u32, 1);
    let _ = w.put_bits(0, 1); // pcm_enabled_flag

    let _ = w.put_ue(0); // num_short_term_ref_pic_sets
    let _ = w.put_bits(0, 1); // long_term_ref_pics_present_flag
    let _ = w.put_bits(p.sps_temporal_mvp_enabled_flag as u32, 1);
    let _ = w.put_bits(p.strong_intra_smoothing_enabled_flag as u32, 1);

    let _ = w.put_bits(1, 1); // vui_parameters_present_flag
    write_vui(&mut w, p);

    let _ = w.put_bits(0, 1); // sps_extension_present_flag

    w.finish();
    w.into_bytes()
}

fn write_pps(p: &PictureParamsHevc) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(64);
    let header = nal_header(NAL_PPS);
    w.put_bytes(&header);

    let _ = w.put_ue(0); // pps_pic_parameter_set_id
    let _ = w.put_ue(0); // pps_seq_parameter_set_id
    let _ = w.put_bits(0, 1); // dependent_slice_segments_enabled_flag
    let _ = w.put_bits(0, 1); // output_flag_present_flag
    let _ = w.put_bits(0, 3); // num_extra_slice_header_bits
    let _ = w.put_bits(p.sign_data_hiding_enabled_flag as u32, 1);
    let _ = w.put_bits(0, 1); // cabac_init_present_flag
    let _ = w.put_ue(0); // num_ref_idx_l0_default_active_minus1
    let _ = w.put_ue(0); // num_ref_idx_l1_default_active_minus1
    let _ = w.put_se(p.init_qp_minus26 as i32);
    let _ = w.put_bits(p.constrained_intra_pred_flag as u32, 1);
    let _ = w.put_bits(p.transform_skip_enabled_flag as u32, 1);
    let _ = w.put_bits(p.cu_qp_delta_enabled_flag as u32, 1);
    if p.cu_qp_delta_enabled_flag {
        let _ = w.put_ue(p.diff_cu_qp_delta_depth as u32);
    }
    let _ = w.put_se(p.pps_cb_qp_offset as i32);
    let _ = w.put_se(p.pps_cr_qp_offset as i32);
    let _ = w.put_bits(0, 1); // pps_slice_chroma_qp_offsets_present_flag
    let _ = w.put_bits(p.weighted_pred_flag as u32, 1);
    let _ = w.put_bits(p.weighted_bipred_flag as u32, 1);
    let _ = w.put_bits(0, 1); // transquant_bypass_enabled_flag
    let _ = w.put_bits(0, 1); // tiles_enabled_flag
    let _ = w.put_bits(0, 1); // entropy_coding_sync_enabled_flag

    let _ = w.put_bits(p.pps_loop_filter_across_slices_enabled_flag as u32, 1);

    let deblocking_present =
        p.deblocking_filter_override_enabled_flag || p.pps_deblocking_filter_disabled_flag;
    let _ = w.put_bits(deblocking_present as u32, 1);
    if deblocking_present {
        let _ = w.put_bits(p.deblocking_filter_override_enabled_flag as u32, 1);
        let _ = w.put_bits(p.pps_deblocking_filter_disabled_flag as u32, 1);
        if !p.pps_deblocking_filter_disabled_flag {
            let _ = w.put_se(p.pps_beta_offset_div2 as i32);
            let _ = w.put_se(p.pps_tc_offset_div2 as i32);
        }
    }

    let _ = w.put_bits(0, 1); // pps_scaling_list_data_present_flag
    let _ = w.put_bits(0, 1); // lists_modification_present_flag
    let _ = w.put_ue(0); // log2_parallel_merge_level_minus2
    let _ = w.put_bits(0, 1); // slice_segment_header_extension_present_flag
    let _ = w.put_bits(0, 1); // pps_extension_present_flag

    w.finish();
    w.into_bytes()
}

/// Synthesises a fresh VPS/SPS/PPS set for the given picture parameters.
pub fn synthesize(p: &PictureParamsHevc) -> SynthesizedHeadersHevc {
    SynthesizedHeadersHevc {
        vps: write_vps(p),
        sps: write_sps(p),
        pps: write_pps(p),
    }
}

/// `nal_unit_type` field, bits 1-6 of the first NAL header byte.
fn nal_unit_type(first_byte: u8) -> u8 {
    (first_byte >> 1) & 0x3F
}

/// `true` if `first_byte` identifies an IDR (W_RADL or N_LP) or CRA slice.
pub fn is_irap_slice(first_byte: u8) -> bool {
    matches!(
        nal_unit_type(first_byte),
        NAL_IDR_W_RADL | NAL_IDR_N_LP | NAL_CRA_NUT
    )
}

/// `true` if `first_byte` identifies an in-band VPS/SPS/PPS NAL — these are
/// dropped by the assembler in favour of the synthesised versions.
pub fn is_parameter_set(first_byte: u8) -> bool {
    matches!(nal_unit_type(first_byte), NAL_VPS | NAL_SPS | NAL_PPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_params() -> PictureParamsHevc {
        PictureParamsHevc {
            display_width: 1920,
            display_height: 1080,
            ctb_log2_size_y: 6,
            min_cb_log2_size_y: 3,
            min_tb_log2_size_y: 2,
            max_transform_hierarchy_depth_inter: 0,
            max_transform_hierarchy_depth_intra: 0,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            chroma_format_idc: 1,
            log2_max_pic_order_cnt_lsb_minus4: 4,
            max_dec_pic_buffering_minus1: 4,
            amp_enabled_flag: true,
            sample_adaptive_offset_enabled_flag: true,
            sps_temporal_mvp_enabled_flag: true,
            strong_intra_smoothing_enabled_flag: true,
            sign_data_hiding_enabled_flag: true,
            init_qp_minus26: 0,
            constrained_intra_pred_flag: false,
            transform_skip_enabled_flag: true,
            cu_qp_delta_enabled_flag: false,
            diff_cu_qp_delta_depth: 0,
            pps_cb_qp_offset: 0,
            pps_cr_qp_offset: 0,
            weighted_pred_flag: false,
            weighted_bipred_flag: false,
            pps_loop_filter_across_slices_enabled_flag: true,
            deblocking_filter_override_enabled_flag: false,
            pps_deblocking_filter_disabled_flag: false,
            pps_beta_offset_div2: 0,
            pps_tc_offset_div2: 0,
        }
    }

    #[test]
    fn main_profile_selection() {
        let p = main_params();
        assert_eq!(profile_idc(&p), PROFILE_MAIN);
    }

    #[test]
    fn main10_hdr_profile_tier_level() {
        let mut p = main_params();
        p.display_width = 3840;
        p.display_height = 2160;
        p.bit_depth_luma_minus8 = 2;
        p.bit_depth_chroma_minus8 = 2;

        assert_eq!(profile_idc(&p), PROFILE_MAIN10);
        assert_eq!(level_idc(&p), 150);
        assert!(high_tier(&p));
    }

    #[test]
    fn sub_4k_is_main_tier_even_at_high_level() {
        // Artificially high ref count wouldn't apply here (HEVC has no such
        // input), so check directly below the 4K sample-count bound.
        let mut p = main_params();
        p.display_width = 1920;
        p.display_height = 1080;
        assert!(!high_tier(&p));
    }

    #[test]
    fn vps_sps_pps_start_with_expected_nal_types() {
        let p = main_params();
        let h = synthesize(&p);
        assert_eq!(nal_unit_type(h.vps[0]), NAL_VPS);
        assert_eq!(nal_unit_type(h.sps[0]), NAL_SPS);
        assert_eq!(nal_unit_type(h.pps[0]), NAL_PPS);
    }

    #[test]
    fn irap_detection() {
        assert!(is_irap_slice(NAL_IDR_W_RADL << 1));
        assert!(is_irap_slice(NAL_CRA_NUT << 1));
        assert!(!is_irap_slice(1 << 1)); // TRAIL_N
    }

    #[test]
    fn parameter_set_detection_for_scrubbing() {
        assert!(is_parameter_set(NAL_VPS << 1));
        assert!(is_parameter_set(NAL_SPS << 1));
        assert!(is_parameter_set(NAL_PPS << 1));
        assert!(!is_parameter_set(NAL_IDR_W_RADL << 1));
    }

    #[test]
    fn conformance_window_rounds_to_ctb() {
        let mut p = main_params();
        p.display_width = 3840;
        p.display_height = 2160; // 2160 / 64 = 33.75, rounds up to 2176
        let conf = conformance_window(&p);
        assert!(conf.flag);
        assert_eq!(conf.bottom, 8); // (2176-2160)/2
        assert_eq!(conf.right, 0);
    }
}
