//! Error types for program configuration and engine commands.

use thiserror::Error;

/// Result type used by the engine module.
pub type Result<T> = std::result::Result<T, EngineError>;

/// A program or option set that can never run correctly.
///
/// These are rejected when a program is built or selected, never at tick time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("program `{0}` has no segments")]
    EmptyProgram(String),

    #[error("program `{0}` has no segment with a positive duration")]
    ZeroLengthProgram(String),

    #[error("program `{0}` is too long to time")]
    ProgramTooLong(String),

    #[error("segment `{label}` has invalid duration {seconds}s")]
    InvalidDuration { label: String, seconds: f64 },

    #[error("target cycles must be at least 1")]
    ZeroTargetCycles,

    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,
}

/// Errors surfaced synchronously by engine commands.
///
/// Opportunistic commands (`start` while running, `pause` while idle) are not
/// errors; they report [`CommandOutcome::Ignored`](super::CommandOutcome).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("target cycles cannot change while the engine is running")]
    TargetLocked,

    #[error("target of {target} cycles is not above the {completed} already completed")]
    TargetAlreadyPassed { target: u32, completed: u32 },
}
