use crate::config::{MotionConfig, MAX_BLOCK_SIZE};
use crate::error::{MotionvidError, Result};
use tracing::{debug, trace};

/// Fixed-size batch of consecutive motion samples
#[derive(Debug, Clone)]
pub struct EvaluationBlock {
    samples: Vec<bool>,
    capacity: usize,
}

impl EvaluationBlock {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample; returns true once the block is full
    fn push(&mut self, sample: bool) -> bool {
        self.samples.push(sample);
        self.samples.len() == self.capacity
    }

    fn motion_count(&self) -> usize {
        self.samples.iter().filter(|s| **s).count()
    }

    fn reset(&mut self) {
        self.samples.clear();
    }

    /// Samples collected so far in the current block
    pub fn samples(&self) -> &[bool] {
        &self.samples
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Tumbling-window motion gate.
///
/// Collects one flag per frame and emits a verdict once per full block: the
/// block counts as motion if any of its samples does. Between evaluations the
/// last verdict stays in force, starting at "no motion".
#[derive(Debug)]
pub struct MotionGate {
    block: EvaluationBlock,
    verdict: bool,
    blocks_evaluated: u64,
}

impl MotionGate {
    /// Create a gate evaluating blocks of `block_size` samples
    pub fn new(block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(MotionvidError::invalid_config(
                "Motion block size must be greater than 0",
            ));
        }
        if block_size > MAX_BLOCK_SIZE {
            return Err(MotionvidError::invalid_config(format!(
                "Motion block size {} exceeds the maximum of {}",
                block_size, MAX_BLOCK_SIZE
            )));
        }

        debug!("Created motion gate with block size {}", block_size);

        Ok(Self {
            block: EvaluationBlock::new(block_size),
            verdict: false,
            blocks_evaluated: 0,
        })
    }

    pub fn from_config(config: &MotionConfig) -> Result<Self> {
        Self::new(config.block_size)
    }

    /// Feed one frame's motion flag; returns the new verdict when a block completes
    pub fn observe(&mut self, sample: bool) -> Option<bool> {
        if !self.block.push(sample) {
            return None;
        }

        let motion_frames = self.block.motion_count();
        self.verdict = motion_frames > 0;
        self.blocks_evaluated += 1;
        self.block.reset();

        trace!(
            "Block {} evaluated: {} motion frames, verdict {}",
            self.blocks_evaluated,
            motion_frames,
            self.verdict
        );

        Some(self.verdict)
    }

    /// Verdict from the most recent completed block
    pub fn verdict(&self) -> bool {
        self.verdict
    }

    pub fn block_size(&self) -> usize {
        self.block.capacity()
    }

    pub fn blocks_evaluated(&self) -> u64 {
        self.blocks_evaluated
    }

    /// The partially filled current block
    pub fn current_block(&self) -> &EvaluationBlock {
        &self.block
    }
}
