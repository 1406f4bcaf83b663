mod gate;

pub use gate::{EvaluationBlock, MotionGate};
