use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::audio::pcm::PcmPayload;
use crate::error::{Result, TerpError};

/// Write a converted utterance to a timestamped WAV file for debugging.
///
/// Off the hot path entirely; called once per utterance when
/// `audio.dump_dir` is configured.
pub fn dump_utterance(dir: &Path, payload: &PcmPayload) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let name = format!("utterance-{}.wav", Local::now().format("%Y%m%d-%H%M%S%.3f"));
    let path = dir.join(name);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: payload.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)
        .map_err(|e| TerpError::Output(format!("failed to create {}: {e}", path.display())))?;

    for pair in payload.bytes.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        writer
            .write_sample(sample)
            .map_err(|e| TerpError::Output(format!("failed to write {}: {e}", path.display())))?;
    }

    writer
        .finalize()
        .map_err(|e| TerpError::Output(format!("failed to finalize {}: {e}", path.display())))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleAccumulator;
    use crate::audio::pcm;
    use crate::language::Language;

    #[test]
    fn dump_round_trips_samples() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));

        let mut acc = SampleAccumulator::new();
        acc.push_block(vec![0.0, 0.5, -0.5, 1.0, -1.0]);
        let payload = pcm::convert(&acc, 16000, Language::Hindi)
            .unwrap_or_else(|| panic!("expected payload"));

        let path = dump_utterance(dir.path(), &payload).unwrap_or_else(|e| panic!("{e}"));

        let mut reader = hound::WavReader::open(&path).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);

        let samples: Vec<i16> = reader
            .samples::<i16>()
            .map(|s| s.unwrap_or_else(|e| panic!("{e}")))
            .collect();
        assert_eq!(
            samples,
            vec![0, pcm::quantize(0.5), pcm::quantize(-0.5), 32767, -32768]
        );
    }
}
