//! Observability and Metrics
//!
//! Counters for package traffic, group mutations and channel migrations.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for protocol operations
#[derive(Debug)]
pub struct Metrics {
    /// Packages delivered to a channel
    pub packages_received: AtomicU64,
    /// Packages rejected before reaching a handler (sequence, type, binding)
    pub packages_rejected: AtomicU64,
    /// Packages sent by this chain
    pub packages_sent: AtomicU64,
    /// Total bytes received in package envelopes
    pub bytes_received: AtomicU64,
    /// Success acks produced
    pub acks_success: AtomicU64,
    /// Fail acks produced
    pub acks_failed: AtomicU64,
    /// Groups created
    pub groups_created: AtomicU64,
    /// Groups deleted
    pub groups_deleted: AtomicU64,
    /// Member update mutations applied
    pub member_updates: AtomicU64,
    /// Mutations rolled back
    pub rollbacks: AtomicU64,
    /// Channel migrations applied
    pub migrations: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            packages_received: AtomicU64::new(0),
            packages_rejected: AtomicU64::new(0),
            packages_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            acks_success: AtomicU64::new(0),
            acks_failed: AtomicU64::new(0),
            groups_created: AtomicU64::new(0),
            groups_deleted: AtomicU64::new(0),
            member_updates: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            migrations: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn package_received(&self, byte_count: u64) {
        self.packages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn package_rejected(&self) {
        self.packages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn package_sent(&self) {
        self.packages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ack produced for an inbound request
    pub fn ack(&self, success: bool) {
        if success {
            self.acks_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.acks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn group_created(&self) {
        self.groups_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn group_deleted(&self) {
        self.groups_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn member_update(&self) {
        self.member_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn migration(&self) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packages_received: self.packages_received.load(Ordering::Relaxed),
            packages_rejected: self.packages_rejected.load(Ordering::Relaxed),
            packages_sent: self.packages_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            acks_success: self.acks_success.load(Ordering::Relaxed),
            acks_failed: self.acks_failed.load(Ordering::Relaxed),
            groups_created: self.groups_created.load(Ordering::Relaxed),
            groups_deleted: self.groups_deleted.load(Ordering::Relaxed),
            member_updates: self.member_updates.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            migrations: self.migrations.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            packages_received = snapshot.packages_received,
            packages_rejected = snapshot.packages_rejected,
            packages_sent = snapshot.packages_sent,
            bytes_received = snapshot.bytes_received,
            acks_success = snapshot.acks_success,
            acks_failed = snapshot.acks_failed,
            groups_created = snapshot.groups_created,
            groups_deleted = snapshot.groups_deleted,
            member_updates = snapshot.member_updates,
            rollbacks = snapshot.rollbacks,
            migrations = snapshot.migrations,
            uptime_seconds = snapshot.uptime_seconds,
            "Protocol metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub packages_received: u64,
    pub packages_rejected: u64,
    pub packages_sent: u64,
    pub bytes_received: u64,
    pub acks_success: u64,
    pub acks_failed: u64,
    pub groups_created: u64,
    pub groups_deleted: u64,
    pub member_updates: u64,
    pub rollbacks: u64,
    pub migrations: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
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
