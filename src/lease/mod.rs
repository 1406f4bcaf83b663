mod completion;
mod queue;

pub use completion::{completion_channel, CompletionListener, CompletionSender, EncodeCompletion};
pub use queue::{BufferLease, BufferLeaseQueue, LeaseId, LeaseStatsSnapshot};
