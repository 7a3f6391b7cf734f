use crate::models::audio_models::AudioLevels;
use crate::processing::level_meter;

/// Byte buffer holding exactly one DMA transfer.
///
/// Allocated by the loop thread when a session starts and dropped when the
/// thread exits. Sessions never share a buffer.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    bytes_per_sample: usize,
    filled: usize,
}

impl FrameBuffer {
    pub fn new(len: usize, bytes_per_sample: usize) -> Self {
        Self {
            data: vec![0; len],
            bytes_per_sample,
            filled: 0,
        }
    }

    /// Whole buffer, to be handed to a read.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Record how many bytes the last read produced.
    ///
    /// Values past the capacity are clamped.
    pub fn set_filled(&mut self, len: usize) {
        self.filled = len.min(self.data.len());
    }

    /// Bytes produced by the last read.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    pub fn filled_len(&self) -> usize {
        self.filled
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether the last read contains any non-zero sample.
    pub fn has_signal(&self) -> bool {
        level_meter::has_signal(self.filled(), self.bytes_per_sample)
    }

    pub fn levels(&self) -> AudioLevels {
        level_meter::measure(self.filled(), self.bytes_per_sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_with_full_capacity() {
        let buf = FrameBuffer::new(4092, 4);
        assert_eq!(buf.capacity(), 4092);
        assert_eq!(buf.filled_len(), 0);
        assert!(buf.filled().is_empty());
        assert!(!buf.has_signal());
    }

    #[test]
    fn filled_tracks_last_read() {
        let mut buf = FrameBuffer::new(8, 4);
        buf.as_mut_slice()[..4].copy_from_slice(&7i32.to_le_bytes());
        buf.set_filled(4);

        assert_eq!(buf.filled(), &7i32.to_le_bytes());
        assert!(buf.has_signal());
        assert!(buf.levels().peak_level > 0.0);
    }

    #[test]
    fn set_filled_clamps_to_capacity() {
        let mut buf = FrameBuffer::new(8, 4);
        buf.set_filled(100);
        assert_eq!(buf.filled_len(), 8);
    }

    #[test]
    fn stale_bytes_past_filled_are_ignored() {
        let mut buf = FrameBuffer::new(8, 4);
        buf.as_mut_slice()[4..].copy_from_slice(&1i32.to_le_bytes());
        buf.set_filled(4);
        assert!(!buf.has_signal());
    }
}
