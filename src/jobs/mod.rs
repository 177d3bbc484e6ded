//! Background workers of the watch pipeline

pub mod processor;
pub mod scanner;
pub mod stability;

pub use processor::{ProcessOutcome, Processor};
pub use scanner::Scanner;
pub use stability::{GateOutcome, StabilityGate, StabilitySettings, StabilityTracker};
