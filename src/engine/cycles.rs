use std::num::NonZeroU32;

use super::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Counted,
    TargetReached,
}

/// Counts full traversals of a cycling program against an optional target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleAccumulator {
    completed: u32,
    target: Option<NonZeroU32>,
}

impl CycleAccumulator {
    pub fn new(target: Option<u32>) -> Result<Self, ConfigError> {
        Ok(Self {
            completed: 0,
            target: parse_target(target)?,
        })
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn target(&self) -> Option<u32> {
        self.target.map(NonZeroU32::get)
    }

    /// Records exactly one completed cycle. Once the target is met further
    /// wraps are not counted.
    pub fn on_wrap(&mut self) -> CycleOutcome {
        if !self.is_target_reached() {
            self.completed += 1;
        }
        if self.is_target_reached() {
            CycleOutcome::TargetReached
        } else {
            CycleOutcome::Counted
        }
    }

    pub fn is_target_reached(&self) -> bool {
        self.target
            .is_some_and(|target| self.completed >= target.get())
    }

    /// Cycles still to run before the target, `None` when unbounded.
    pub fn remaining(&self) -> Option<u32> {
        self.target
            .map(|target| target.get().saturating_sub(self.completed))
    }

    pub fn set_target(&mut self, target: Option<u32>) -> Result<(), ConfigError> {
        self.target = parse_target(target)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.completed = 0;
    }
}

fn parse_target(target: Option<u32>) -> Result<Option<NonZeroU32>, ConfigError> {
    match target {
        None => Ok(None),
        Some(value) => NonZeroU32::new(value)
            .map(Some)
            .ok_or(ConfigError::ZeroTargetCycles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_target_is_rejected() {
        assert_eq!(CycleAccumulator::new(Some(0)), Err(ConfigError::ZeroTargetCycles));
    }

    #[test]
    fn counts_one_per_wrap_and_stops_at_target() {
        let mut cycles = CycleAccumulator::new(Some(2)).unwrap();
        assert_eq!(cycles.on_wrap(), CycleOutcome::Counted);
        assert_eq!(cycles.remaining(), Some(1));
        assert_eq!(cycles.on_wrap(), CycleOutcome::TargetReached);
        assert_eq!(cycles.on_wrap(), CycleOutcome::TargetReached);
        assert_eq!(cycles.completed(), 2);
    }

    #[test]
    fn unbounded_never_reaches_target() {
        let mut cycles = CycleAccumulator::new(None).unwrap();
        for _ in 0..50 {
            assert_eq!(cycles.on_wrap(), CycleOutcome::Counted);
        }
        assert_eq!(cycles.completed(), 50);
        assert_eq!(cycles.remaining(), None);
    }
}
