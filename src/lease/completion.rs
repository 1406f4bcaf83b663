use super::BufferLeaseQueue;
use crate::error::{MotionvidError, Result};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Completion signal sent by the encoder once it is done with an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeCompletion {
    /// Frame the encoder believes it finished, when it knows
    pub frame_id: Option<u64>,
}

pub type CompletionSender = Sender<EncodeCompletion>;

/// Create the channel carrying encoder completions to the lease queue
pub fn completion_channel() -> (CompletionSender, Receiver<EncodeCompletion>) {
    channel::unbounded()
}

/// Background thread that turns encoder completions into lease releases
pub struct CompletionListener {
    handle: Option<JoinHandle<()>>,
    faults: Receiver<MotionvidError>,
}

impl CompletionListener {
    /// Spawn the listener. It runs until every `CompletionSender` is dropped
    /// or the first protocol violation.
    pub fn spawn(
        leases: Arc<BufferLeaseQueue>,
        completions: Receiver<EncodeCompletion>,
    ) -> Result<Self> {
        let (fault_tx, fault_rx) = channel::bounded(1);

        let handle = thread::Builder::new()
            .name("encode-completion".to_string())
            .spawn(move || {
                debug!("Encode completion listener started");
                let mut released = 0u64;

                for completion in completions.iter() {
                    match leases.release_one() {
                        Ok(lease) => {
                            released += 1;
                            if let Some(frame_id) = completion.frame_id {
                                if frame_id != lease.buffer.id {
                                    warn!(
                                        "Encoder completed frame {} but oldest lease held frame {}",
                                        frame_id, lease.buffer.id
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            error!("Encode completion rejected: {}", e);
                            let _ = fault_tx.try_send(e);
                            break;
                        }
                    }
                }

                info!(
                    "Encode completion listener stopped after {} releases",
                    released
                );
            })?;

        Ok(Self {
            handle: Some(handle),
            faults: fault_rx,
        })
    }

    /// Report a protocol violation raised on the listener thread, if any
    pub fn check(&self) -> Result<()> {
        match self.faults.try_recv() {
            Ok(fault) => Err(fault),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(()),
        }
    }

    /// Wait for the listener to finish. Blocks until all completion senders
    /// have been dropped, so the encoder must be stopped first.
    pub fn join(mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| MotionvidError::system("Encode completion listener panicked"))?;
        }
        self.check()
    }
}
