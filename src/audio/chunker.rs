//! Fixed-size chunking of captured audio.

/// Accumulates arbitrary-length reads and emits fixed-size chunks.
///
/// Device callbacks deliver whatever the backend buffer size happens to be;
/// the uplink wants exactly `chunk_size` samples per message.
#[derive(Debug, Clone)]
pub struct FixedChunker {
    chunk_size: usize,
    pending: Vec<f32>,
}

impl FixedChunker {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Samples held back waiting for the next boundary.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed samples, returning every chunk completed by them, in order.
    pub fn push(&mut self, mut samples: &[f32]) -> Vec<Vec<f32>> {
        let mut chunks = Vec::new();
        while !samples.is_empty() {
            let wanted = self.chunk_size - self.pending.len();
            let take = wanted.min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.chunk_size {
                let chunk =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_size));
                chunks.push(chunk);
            }
        }
        chunks
    }

    /// Drop any partial chunk.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
