mod controller;
mod metadata;
mod naming;
#[cfg(test)]
mod tests;

pub use controller::{SegmentController, SegmentState, StepOutcome};
pub use metadata::{save_metadata, SegmentMetadata};
pub use naming::{NamingZone, Segment, SegmentNamer, SEGMENT_LABEL};
