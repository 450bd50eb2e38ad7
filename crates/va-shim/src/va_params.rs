//! Wire structs for the VA picture/slice parameter buffers this driver
//! reads, and the conversions into `headers`' codec-specific parameter
//! types.
//!
//! The real `VAPictureParameterBufferH264`/`...HEVC` carry several
//! C-bitfield unions (`seq_fields.bits.*`, `pic_fields.bits.*`). This
//! driver flattens them into plain fields in the same declared order —
//! faithful to what each field means, not to the exact bit-packed C
//! layout libva ships, since only this crate's own `RenderPicture`
//! marshalling code ever constructs one. Noted as a deliberate
//! simplification in DESIGN.md.

use headers::h264::PictureParamsH264;
use headers::hevc::PictureParamsHevc;

use crate::context::SliceRange;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPictureParameterBufferH264 {
    pub picture_width_in_mbs_minus1: u16,
    pub picture_height_in_mbs_minus1: u16,
    pub display_width: u32,
    pub display_height: u32,
    pub num_ref_frames: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub chroma_format_idc: u8,
    pub entropy_coding_mode_flag: u8,
    pub transform_8x8_mode_flag: u8,
    pub frame_mbs_only_flag: u8,
    pub mb_adaptive_frame_field_flag: u8,
    pub direct_8x8_inference_flag: u8,
    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: u8,
    pub gaps_in_frame_num_value_allowed_flag: u8,
    pub pic_init_qp_minus26: i8,
    pub pic_init_qs_minus26: i8,
    pub chroma_qp_index_offset: i8,
    pub second_chroma_qp_index_offset: i8,
    pub weighted_pred_flag: u8,
    pub weighted_bipred_idc: u8,
    pub deblocking_filter_control_present_flag: u8,
    pub constrained_intra_pred_flag: u8,
    pub redundant_pic_cnt_present_flag: u8,
    pub pic_order_present_flag: u8,
}

impl From<RawPictureParameterBufferH264> for PictureParamsH264 {
    fn from(r: RawPictureParameterBufferH264) -> Self {
        PictureParamsH264 {
            width_mbs: r.picture_width_in_mbs_minus1 + 1,
            height_mbs: r.picture_height_in_mbs_minus1 + 1,
            display_width: r.display_width,
            display_height: r.display_height,
            num_ref_frames: r.num_ref_frames,
            bit_depth_luma_minus8: r.bit_depth_luma_minus8,
            bit_depth_chroma_minus8: r.bit_depth_chroma_minus8,
            chroma_format_idc: r.chroma_format_idc,
            entropy_coding_mode_flag: r.entropy_coding_mode_flag != 0,
            transform_8x8_mode_flag: r.transform_8x8_mode_flag != 0,
            frame_mbs_only_flag: r.frame_mbs_only_flag != 0,
            mb_adaptive_frame_field_flag: r.mb_adaptive_frame_field_flag != 0,
            direct_8x8_inference_flag: r.direct_8x8_inference_flag != 0,
            log2_max_frame_num_minus4: r.log2_max_frame_num_minus4,
            pic_order_cnt_type: r.pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb_minus4: r.log2_max_pic_order_cnt_lsb_minus4,
            delta_pic_order_always_zero_flag: r.delta_pic_order_always_zero_flag != 0,
            gaps_in_frame_num_value_allowed_flag: r.gaps_in_frame_num_value_allowed_flag != 0,
            pic_init_qp_minus26: r.pic_init_qp_minus26,
            pic_init_qs_minus26: r.pic_init_qs_minus26,
            chroma_qp_index_offset: r.chroma_qp_index_offset,
            second_chroma_qp_index_offset: r.second_chroma_qp_index_offset,
            weighted_pred_flag: r.weighted_pred_flag != 0,
            weighted_bipred_idc: r.weighted_bipred_idc,
            deblocking_filter_control_present_flag: r.deblocking_filter_control_present_flag != 0,
            constrained_intra_pred_flag: r.constrained_intra_pred_flag != 0,
            redundant_pic_cnt_present_flag: r.redundant_pic_cnt_present_flag != 0,
            pic_order_present_flag: r.pic_order_present_flag != 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPictureParameterBufferHevc {
    pub display_width: u32,
    pub display_height: u32,
    pub ctb_log2_size_y: u8,
    pub min_cb_log2_size_y: u8,
    pub min_tb_log2_size_y: u8,
    pub max_transform_hierarchy_depth_inter: u8,
    pub max_transform_hierarchy_depth_intra: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub chroma_format_idc: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub max_dec_pic_buffering_minus1: u8,
    pub amp_enabled_flag: u8,
    pub sample_adaptive_offset_enabled_flag: u8,
    pub sps_temporal_mvp_enabled_flag: u8,
    pub strong_intra_smoothing_enabled_flag: u8,
    pub sign_data_hiding_enabled_flag: u8,
    pub init_qp_minus26: i8,
    pub constrained_intra_pred_flag: u8,
    pub transform_skip_enabled_flag: u8,
    pub cu_qp_delta_enabled_flag: u8,
    pub diff_cu_qp_delta_depth: u8,
    pub pps_cb_qp_offset: i8,
    pub pps_cr_qp_offset: i8,
    pub weighted_pred_flag: u8,
    pub weighted_bipred_flag: u8,
    pub pps_loop_filter_across_slices_enabled_flag: u8,
    pub deblocking_filter_override_enabled_flag: u8,
    pub pps_deblocking_filter_disabled_flag: u8,
    pub pps_beta_offset_div2: i8,
    pub pps_tc_offset_div2: i8,
}

impl From<RawPictureParameterBufferHevc> for PictureParamsHevc {
    fn from(r: RawPictureParameterBufferHevc) -> Self {
        PictureParamsHevc {
            display_width: r.display_width,
            display_height: r.display_height,
            ctb_log2_size_y: r.ctb_log2_size_y,
            min_cb_log2_size_y: r.min_cb_log2_size_y,
            min_tb_log2_size_y: r.min_tb_log2_size_y,
            max_transform_hierarchy_depth_inter: r.max_transform_hierarchy_depth_inter,
            max_transform_hierarchy_depth_intra: r.max_transform_hierarchy_depth_intra,
            bit_depth_luma_minus8: r.bit_depth_luma_minus8,
            bit_depth_chroma_minus8: r.bit_depth_chroma_minus8,
            chroma_format_idc: r.chroma_format_idc,
            log2_max_pic_order_cnt_lsb_minus4: r.log2_max_pic_order_cnt_lsb_minus4,
            max_dec_pic_buffering_minus1: r.max_dec_pic_buffering_minus1,
            amp_enabled_flag: r.amp_enabled_flag != 0,
            sample_adaptive_offset_enabled_flag: r.sample_adaptive_offset_enabled_flag != 0,
            sps_temporal_mvp_enabled_flag: r.sps_temporal_mvp_enabled_flag != 0,
            strong_intra_smoothing_enabled_flag: r.strong_intra_smoothing_enabled_flag != 0,
            sign_data_hiding_enabled_flag: r.sign_data_hiding_enabled_flag != 0,
            init_qp_minus26: r.init_qp_minus26,
            constrained_intra_pred_flag: r.constrained_intra_pred_flag != 0,
            transform_skip_enabled_flag: r.transform_skip_enabled_flag != 0,
            cu_qp_delta_enabled_flag: r.cu_qp_delta_enabled_flag != 0,
            diff_cu_qp_delta_depth: r.diff_cu_qp_delta_depth,
            pps_cb_qp_offset: r.pps_cb_qp_offset,
            pps_cr_qp_offset: r.pps_cr_qp_offset,
            weighted_pred_flag: r.weighted_pred_flag != 0,
            weighted_bipred_flag: r.weighted_bipred_flag != 0,
            pps_loop_filter_across_slices_enabled_flag: r.pps_loop_filter_across_slices_enabled_flag != 0,
            deblocking_filter_override_enabled_flag: r.deblocking_filter_override_enabled_flag != 0,
            pps_deblocking_filter_disabled_flag: r.pps_deblocking_filter_disabled_flag != 0,
            pps_beta_offset_div2: r.pps_beta_offset_div2,
            pps_tc_offset_div2: r.pps_tc_offset_div2,
        }
    }
}

/// `VASliceParameterBufferBase`-equivalent, repeated once per slice in
/// the buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSliceParameterBufferBase {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    pub slice_data_flag: u32,
}

/// Reinterprets `bytes` as a `[RawSliceParameterBufferBase]` array,
/// returning the `SliceRange`s the slice-data buffer should be cut at.
/// Returns an empty vec (rather than panicking) if `bytes` isn't an exact
/// multiple of the element size — a malformed buffer produces no slices
/// instead of an out-of-bounds read.
pub fn parse_slice_ranges(bytes: &[u8]) -> Vec<SliceRange> {
    let elem = std::mem::size_of::<RawSliceParameterBufferBase>();
    if elem == 0 || bytes.len() % elem != 0 {
        return Vec::new();
    }
    bytes
        .chunks_exact(elem)
        .map(|chunk| {
            // SAFETY: `chunk` is exactly `elem` bytes and the struct is
            // `repr(C)` with only plain integer fields (no padding-sensitive
            // invariants), so any bit pattern is valid.
            let raw: RawSliceParameterBufferBase = unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const _) };
            SliceRange {
                offset: raw.slice_data_offset,
                size: raw.slice_data_size,
            }
        })
        .collect()
}

/// Reinterprets `bytes` as a `T`, returning `None` if the length doesn't
/// match exactly.
pub fn parse_fixed<T: Copy>(bytes: &[u8]) -> Option<T> {
    if bytes.len() != std::mem::size_of::<T>() {
        return None;
    }
    // SAFETY: length checked above; every `T` this is called with here is
    // `repr(C)` and made only of plain integer fields.
    Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_slice_params_yield_no_ranges() {
        assert!(parse_slice_ranges(&[0u8; 5]).is_empty());
    }

    #[test]
    fn one_slice_range_round_trips() {
        let raw = RawSliceParameterBufferBase {
            slice_data_size: 100,
            slice_data_offset: 4,
            slice_data_flag: 0,
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &raw as *const _ as *const u8,
                std::mem::size_of::<RawSliceParameterBufferBase>(),
            )
        };
        let ranges = parse_slice_ranges(bytes);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].offset, 4);
        assert_eq!(ranges[0].size, 100);
    }
}
