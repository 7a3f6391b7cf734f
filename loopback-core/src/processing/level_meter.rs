use crate::models::audio_models::AudioLevels;

/// Decode one little-endian signed PCM sample and normalise it to `[-1.0, 1.0)`.
///
/// `bytes.len()` is the sample width in bytes (1–4).
pub fn decode_sample(bytes: &[u8]) -> f32 {
    let width = bytes.len();
    debug_assert!((1..=4).contains(&width));

    // Sign-extend by placing the sample in the top bytes of an i32.
    let mut word = [0u8; 4];
    word[4 - width..].copy_from_slice(bytes);
    let value = i32::from_le_bytes(word);
    value as f32 / i32::MAX as f32
}

/// Peak and RMS level of interleaved PCM bytes.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn measure(pcm: &[u8], bytes_per_sample: usize) -> AudioLevels {
    if bytes_per_sample == 0 {
        return AudioLevels::default();
    }

    let mut count = 0usize;
    let mut sum_sq = 0.0f64;
    let mut peak = 0.0f32;
    for chunk in pcm.chunks_exact(bytes_per_sample) {
        let sample = decode_sample(chunk);
        sum_sq += (sample as f64) * (sample as f64);
        peak = peak.max(sample.abs());
        count += 1;
    }

    if count == 0 {
        return AudioLevels::default();
    }

    AudioLevels {
        rms_level: (sum_sq / count as f64).sqrt() as f32,
        peak_level: peak.min(1.0),
    }
}

/// Whether any whole sample in `pcm` is non-zero.
pub fn has_signal(pcm: &[u8], bytes_per_sample: usize) -> bool {
    if bytes_per_sample == 0 {
        return false;
    }
    pcm.chunks_exact(bytes_per_sample)
        .any(|chunk| chunk.iter().any(|&b| b != 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pcm32(samples: &[i32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decode_16_bit_extremes() {
        assert_relative_eq!(decode_sample(&i16::MAX.to_le_bytes()), 1.0, epsilon = 1e-4);
        assert_relative_eq!(decode_sample(&i16::MIN.to_le_bytes()), -1.0, epsilon = 1e-4);
        assert_eq!(decode_sample(&0i16.to_le_bytes()), 0.0);
    }

    #[test]
    fn decode_24_bit_negative() {
        // -1 in 24-bit two's complement.
        assert!(decode_sample(&[0xFF, 0xFF, 0xFF]) < 0.0);
        // Half scale positive: 0x400000.
        assert_relative_eq!(decode_sample(&[0x00, 0x00, 0x40]), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn silence_measures_zero() {
        let levels = measure(&pcm32(&[0, 0, 0, 0]), 4);
        assert_eq!(levels, AudioLevels::default());
        assert!(!has_signal(&pcm32(&[0, 0, 0]), 4));
    }

    #[test]
    fn peak_and_rms_of_square_wave() {
        let half = i32::MAX / 2;
        let levels = measure(&pcm32(&[half, -half, half, -half]), 4);
        assert_relative_eq!(levels.peak_level, 0.5, epsilon = 1e-4);
        assert_relative_eq!(levels.rms_level, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn single_nonzero_sample_counts_as_signal() {
        assert!(has_signal(&pcm32(&[0, 0, 1, 0]), 4));
    }

    #[test]
    fn partial_trailing_sample_is_ignored() {
        let mut pcm = pcm32(&[0, 0]);
        pcm.push(0x7F);
        assert!(!has_signal(&pcm, 4));
        assert_eq!(measure(&pcm, 4).peak_level, 0.0);
    }
}
