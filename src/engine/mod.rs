pub mod cycles;
pub mod error;
pub mod format;
pub mod machine;
pub mod program;
pub mod sequencer;
pub mod state;

pub use cycles::{CycleAccumulator, CycleOutcome};
pub use error::{ConfigError, EngineError};
pub use format::{format_clock, format_countdown, format_elapsed};
pub use machine::{CommandOutcome, Engine, EngineOptions, TickReport, BREATHING_TICK, SCRIPT_TICK};
pub use program::{Program, ProgramKind, Segment};
pub use state::{EngineSnapshot, RunState, RunStatus};
