use crate::audio::buffer::SampleAccumulator;
use crate::language::Language;

/// Bytes per sample in the wire format. The server interprets the payload
/// as 16-bit signed little-endian PCM.
pub const SAMPLE_WIDTH: u16 = 2;

/// One completed utterance, encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmPayload {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub sample_width: u16,
    pub language: Language,
}

impl PcmPayload {
    /// Number of encoded samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / usize::from(SAMPLE_WIDTH)
    }
}

/// Quantize one normalized sample to i16.
///
/// Negative values scale by 32768 and non-negative by 32767, matching the
/// asymmetry of the two's-complement range. The product truncates toward
/// zero; no dithering. Both choices are part of the wire contract and must
/// not change.
#[must_use]
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Convert the accumulated session audio into a transport payload.
///
/// Returns `None` when nothing was recorded; the caller must not send.
/// Blocks are concatenated in arrival order, so output sample `i` of block
/// `k` lands at offset `len(block_0..k) + i`. Runs once per session after
/// capture has fully stopped, so allocation here is fine.
#[must_use]
pub fn convert(
    accumulator: &SampleAccumulator,
    sample_rate: u32,
    language: Language,
) -> Option<PcmPayload> {
    if accumulator.is_empty() {
        return None;
    }

    let mut bytes = Vec::with_capacity(accumulator.len() * usize::from(SAMPLE_WIDTH));
    for block in accumulator.blocks() {
        for &sample in block {
            bytes.extend_from_slice(&quantize(sample).to_le_bytes());
        }
    }

    Some(PcmPayload {
        bytes,
        sample_rate,
        sample_width: SAMPLE_WIDTH,
        language,
    })
}
