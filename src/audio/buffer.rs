/// Session-scoped buffer of audio blocks captured since the last start.
///
/// Blocks arrive from the capture callback in production order and are
/// appended as-is; nothing is flattened until conversion time, so the
/// control loop never copies sample data while a session is live.
#[derive(Debug, Default)]
pub struct SampleAccumulator {
    blocks: Vec<Vec<f32>>,
    total_samples: usize,
}

impl SampleAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one block, taking ownership. Arrival order is preserved.
    pub fn push_block(&mut self, block: Vec<f32>) {
        self.total_samples += block.len();
        self.blocks.push(block);
    }

    #[must_use]
    pub fn blocks(&self) -> &[Vec<f32>] {
        &self.blocks
    }

    /// Total samples across all blocks.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.total_samples
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Drop all buffered audio. Called at session start and after a send.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.total_samples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_total_length() {
        let mut acc = SampleAccumulator::new();
        acc.push_block(vec![0.0; 128]);
        acc.push_block(vec![0.0; 64]);
        acc.push_block(vec![0.0; 128]);
        assert_eq!(acc.len(), 320);
        assert_eq!(acc.block_count(), 3);
    }

    #[test]
    fn preserves_arrival_order() {
        let mut acc = SampleAccumulator::new();
        acc.push_block(vec![1.0, 1.0]);
        acc.push_block(vec![2.0]);
        acc.push_block(vec![3.0, 3.0, 3.0]);

        let flat: Vec<f32> = acc.blocks().iter().flatten().copied().collect();
        assert_eq!(flat, vec![1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut acc = SampleAccumulator::new();
        acc.push_block(vec![0.5; 256]);
        assert!(!acc.is_empty());

        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.len(), 0);
        assert_eq!(acc.block_count(), 0);
    }

    #[test]
    fn empty_blocks_count_nothing() {
        let mut acc = SampleAccumulator::new();
        acc.push_block(Vec::new());
        assert_eq!(acc.block_count(), 1);
        assert!(acc.is_empty());
    }
}
