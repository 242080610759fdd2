//! 8-bit unsigned to 16-bit signed PCM conversion
//!
//! Effect samples are stored as unsigned 8-bit PCM behind a short header.
//! The mixer works in signed 16-bit, so each sample is widened and its DC
//! bias removed: `(s << 8) ^ 0x8000`. This is bit-exact; any other mapping
//! changes what comes out of the speaker.

use crate::types::Sample;

/// Length of the header in front of raw effect sample data
pub const SAMPLE_HEADER_LEN: usize = 8;

/// Convert one unsigned 8-bit sample to signed 16-bit
#[inline]
pub fn u8_to_i16(sample: u8) -> Sample {
    (((sample as u16) << 8) ^ 0x8000) as i16
}

/// Convert a block of unsigned 8-bit samples
pub fn convert_u8_pcm(data: &[u8]) -> Vec<Sample> {
    data.iter().copied().map(u8_to_i16).collect()
}

/// Strip the sample header when the data is long enough to carry one
///
/// Data of [`SAMPLE_HEADER_LEN`] bytes or fewer is returned untouched.
pub fn strip_header(raw: &[u8]) -> &[u8] {
    if raw.len() > SAMPLE_HEADER_LEN {
        &raw[SAMPLE_HEADER_LEN..]
    } else {
        raw
    }
}
