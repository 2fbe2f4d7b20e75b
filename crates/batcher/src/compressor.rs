//! Compression is a pure byte-to-bytes function behind a trait, so an
//! embedder can swap in whatever the collector expects without touching the
//! batching state machine.

/// A compression backend. Implementations must be safe to share across the
/// background worker's lifetime.
pub trait Compressor: Send + Sync {
    /// # Errors
    /// Returns an error if the underlying codec fails on this input.
    fn compress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// The default backend: zstd at a fixed level, matching the compression
/// story used elsewhere in this workspace for binary payloads.
#[derive(Clone, Copy, Debug)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut reader: &[u8] = data;
        let mut encoder = zstd::Encoder::new(Vec::new(), self.level)?;
        std::io::copy(&mut reader, &mut encoder)?;
        Ok(encoder.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_zstd() {
        let compressor = ZstdCompressor::default();
        let input = b"hello batcher".repeat(64);
        let compressed = compressor.compress(&input).expect("compress");
        let decompressed = zstd::decode_all(compressed.as_slice()).expect("decompress");
        assert_eq!(decompressed, input);
    }
}
