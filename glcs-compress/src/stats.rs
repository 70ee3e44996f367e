//! Running `pack_size`/`unpack_size` counters shared across worker
//! threads: atomically incremented, logged as a final compression
//! ratio when the stage's `finish` hook fires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CompressionStats {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    input_bytes: AtomicU64,
    output_bytes: AtomicU64,
}

impl CompressionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, input_bytes: u64, output_bytes: u64) {
        self.inner.input_bytes.fetch_add(input_bytes, Ordering::Relaxed);
        self.inner.output_bytes.fetch_add(output_bytes, Ordering::Relaxed);
    }

    pub fn ratio(&self) -> f64 {
        let input = self.inner.input_bytes.load(Ordering::Relaxed);
        let output = self.inner.output_bytes.load(Ordering::Relaxed);
        if output == 0 {
            1.0
        } else {
            input as f64 / output as f64
        }
    }

    pub fn log_summary(&self, label: &str) {
        log::info!(
            target: "compress",
            "{label}: {} -> {} bytes (ratio {:.3})",
            self.inner.input_bytes.load(Ordering::Relaxed),
            self.inner.output_bytes.load(Ordering::Relaxed),
            self.ratio()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_reflects_recorded_bytes() {
        let stats = CompressionStats::new();
        stats.record(1000, 250);
        assert!((stats.ratio() - 4.0).abs() < 1e-9);
    }
}
