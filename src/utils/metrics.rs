//! Observability and Metrics
//!
//! Process-wide counters for descriptor resolution, message coding and
//! transport activity.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for codec and transport operations
#[derive(Debug)]
pub struct Metrics {
    /// Record descriptors built from declarations
    pub descriptors_resolved: AtomicU64,
    /// Descriptor lookups served from the cache
    pub cache_hits: AtomicU64,
    /// Descriptor lookups that had to resolve
    pub cache_misses: AtomicU64,
    /// Top-level messages encoded
    pub messages_encoded: AtomicU64,
    /// Top-level messages decoded
    pub messages_decoded: AtomicU64,
    /// Bytes produced by encoding
    pub bytes_encoded: AtomicU64,
    /// Bytes consumed by decoding
    pub bytes_decoded: AtomicU64,
    /// Encode or decode calls that failed
    pub codec_errors: AtomicU64,
    /// Chunks written to a connection
    pub chunks_sent: AtomicU64,
    /// Chunks read from a connection
    pub chunks_received: AtomicU64,
    /// Bytes written in chunks, headers included
    pub bytes_sent: AtomicU64,
    /// Bytes read in chunks, headers included
    pub bytes_received: AtomicU64,
    /// Errors reported through a channel error sink
    pub channel_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            descriptors_resolved: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            messages_encoded: AtomicU64::new(0),
            messages_decoded: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            bytes_decoded: AtomicU64::new(0),
            codec_errors: AtomicU64::new(0),
            chunks_sent: AtomicU64::new(0),
            chunks_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            channel_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn descriptor_resolved(&self) {
        self.descriptors_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an encoded message of `byte_count` bytes
    pub fn message_encoded(&self, byte_count: usize) {
        self.messages_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Record a decoded message that consumed `byte_count` bytes
    pub fn message_decoded(&self, byte_count: usize) {
        self.messages_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn codec_error(&self) {
        self.codec_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chunk written to the wire
    pub fn chunk_sent(&self, byte_count: usize) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Record a chunk read from the wire
    pub fn chunk_received(&self, byte_count: usize) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn channel_error(&self) {
        self.channel_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            descriptors_resolved: self.descriptors_resolved.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            messages_encoded: self.messages_encoded.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            codec_errors: self.codec_errors.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            channel_errors: self.channel_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            descriptors_resolved = snapshot.descriptors_resolved,
            cache_hits = snapshot.cache_hits,
            cache_misses = snapshot.cache_misses,
            messages_encoded = snapshot.messages_encoded,
            messages_decoded = snapshot.messages_decoded,
            bytes_encoded = snapshot.bytes_encoded,
            bytes_decoded = snapshot.bytes_decoded,
            codec_errors = snapshot.codec_errors,
            chunks_sent = snapshot.chunks_sent,
            chunks_received = snapshot.chunks_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            channel_errors = snapshot.channel_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Codec metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub descriptors_resolved: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub messages_encoded: u64,
    pub messages_decoded: u64,
    pub bytes_encoded: u64,
    pub bytes_decoded: u64,
    pub codec_errors: u64,
    pub chunks_sent: u64,
    pub chunks_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub channel_errors: u64,
    pub uptime_seconds: u64,
}

/// Get the global metrics instance
pub fn global() -> &'static Metrics {
    static METRICS: OnceLock<Metrics> = OnceLock::new();
    METRICS.get_or_init(Metrics::new)
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.message_encoded(10);
        metrics.message_encoded(5);
        metrics.message_decoded(7);
        metrics.cache_miss();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.codec_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.messages_encoded, 2);
        assert_eq!(snap.bytes_encoded, 15);
        assert_eq!(snap.messages_decoded, 1);
        assert_eq!(snap.bytes_decoded, 7);
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.codec_errors, 1);
        assert_eq!(snap.chunks_sent, 0);
    }

    #[test]
    fn test_chunk_counters() {
        let metrics = Metrics::new();
        metrics.chunk_sent(64);
        metrics.chunk_received(32);
        metrics.channel_error();

        let snap = metrics.snapshot();
        assert_eq!((snap.chunks_sent, snap.bytes_sent), (1, 64));
        assert_eq!((snap.chunks_received, snap.bytes_received), (1, 32));
        assert_eq!(snap.channel_errors, 1);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(global(), global()));
    }
}
