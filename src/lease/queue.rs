use crate::error::{MotionvidError, Result};
use crate::frame::FrameBuffer;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;
use tracing::{trace, warn};

/// Identifier handed out for every submitted buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeaseId(u64);

impl LeaseId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lease-{}", self.0)
    }
}

/// A frame buffer held on behalf of the encoder until it signals completion
#[derive(Debug)]
pub struct BufferLease {
    pub id: LeaseId,
    pub buffer: FrameBuffer,
    pub submitted_at: Instant,
}

#[derive(Debug, Default)]
struct LeaseState {
    leases: VecDeque<BufferLease>,
    next_id: u64,
    submitted: u64,
    released: u64,
    peak_outstanding: usize,
}

/// Snapshot of lease queue statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseStatsSnapshot {
    pub submitted: u64,
    pub released: u64,
    pub outstanding: usize,
    pub peak_outstanding: usize,
}

/// FIFO registry of buffers in flight to the encoder.
///
/// Completions carry no buffer identity: the encoder finishes work in
/// submission order, so every completion releases the oldest lease. An
/// encoder that can complete out of order needs per-buffer matching instead.
///
/// All reads and writes go through a single lock shared by the capture thread
/// (`submit`) and the completion thread (`release_one`).
#[derive(Debug, Default)]
pub struct BufferLeaseQueue {
    state: Mutex<LeaseState>,
}

impl BufferLeaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer as in flight; the queue keeps it alive until released
    pub fn submit(&self, buffer: FrameBuffer) -> LeaseId {
        let mut state = self.state.lock();
        let id = LeaseId(state.next_id);
        state.next_id += 1;
        state.submitted += 1;

        trace!("Submitting frame {} as {}", buffer.id, id);

        state.leases.push_back(BufferLease {
            id,
            buffer,
            submitted_at: Instant::now(),
        });
        state.peak_outstanding = state.peak_outstanding.max(state.leases.len());

        id
    }

    /// Release the oldest outstanding lease.
    ///
    /// A completion with nothing outstanding means the encoder signalled work
    /// it was never given, which is reported as a protocol violation.
    pub fn release_one(&self) -> Result<BufferLease> {
        let mut state = self.state.lock();
        let lease = state.leases.pop_front().ok_or_else(|| {
            MotionvidError::protocol_violation("encode completion with no buffer outstanding")
        })?;
        state.released += 1;

        trace!(
            "Released {} (frame {}) after {:?}",
            lease.id,
            lease.buffer.id,
            lease.submitted_at.elapsed()
        );

        Ok(lease)
    }

    /// Take back a lease whose buffer the encoder refused.
    ///
    /// Only the most recent submission can be withdrawn; returns `None` if
    /// `id` is no longer the newest outstanding lease.
    pub fn withdraw(&self, id: LeaseId) -> Option<BufferLease> {
        let mut state = self.state.lock();
        if state.leases.back().map(|lease| lease.id) != Some(id) {
            return None;
        }
        let lease = state.leases.pop_back()?;
        state.submitted -= 1;

        trace!("Withdrew {} (frame {})", lease.id, lease.buffer.id);
        Some(lease)
    }

    /// Number of leases currently held
    pub fn outstanding(&self) -> usize {
        self.state.lock().leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding() == 0
    }

    /// Drop every outstanding lease without waiting for completions.
    ///
    /// Only valid once the encoder is gone; returns how many were dropped.
    pub fn abandon_all(&self) -> usize {
        let mut state = self.state.lock();
        let abandoned = state.leases.len();
        state.leases.clear();
        if abandoned > 0 {
            warn!("Abandoning {} outstanding buffer leases", abandoned);
        }
        abandoned
    }

    pub fn stats(&self) -> LeaseStatsSnapshot {
        let state = self.state.lock();
        LeaseStatsSnapshot {
            submitted: state.submitted,
            released: state.released,
            outstanding: state.leases.len(),
            peak_outstanding: state.peak_outstanding,
        }
    }
}
