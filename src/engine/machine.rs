use std::time::Duration;

use super::cycles::{CycleAccumulator, CycleOutcome};
use super::error::{ConfigError, EngineError, Result};
use super::program::{Program, ProgramKind, Segment};
use super::sequencer;
use super::state::{EngineSnapshot, RunState, RunStatus};

/// Fine-grained decay for breathing phases.
pub const BREATHING_TICK: Duration = Duration::from_millis(100);
/// Script players advance once per second.
pub const SCRIPT_TICK: Duration = Duration::from_millis(1000);
pub const DEFAULT_TRANSITION_EPSILON: Duration = Duration::from_millis(1);

pub fn default_tick_interval(kind: ProgramKind) -> Duration {
    match kind {
        ProgramKind::Cycling => BREATHING_TICK,
        ProgramKind::Script { .. } => SCRIPT_TICK,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// `None` uses the default interval for the program kind.
    pub tick_interval: Option<Duration>,
    /// Only consulted for cycling programs. `None` runs until stopped.
    pub target_cycles: Option<u32>,
    pub transition_epsilon: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tick_interval: None,
            target_cycles: None,
            transition_epsilon: DEFAULT_TRANSITION_EPSILON,
        }
    }
}

impl EngineOptions {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn with_target_cycles(mut self, target: Option<u32>) -> Self {
        self.target_cycles = target;
        self
    }

    pub fn validate(&self, program: &Program) -> std::result::Result<(), ConfigError> {
        if self.tick_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::ZeroTickInterval);
        }
        if program.is_cycling() && program.cycle_duration() <= self.transition_epsilon {
            return Err(ConfigError::ZeroLengthProgram(program.id().to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Ignored,
}

/// What a single [`Engine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// False when the tick arrived while not running and was discarded.
    pub processed: bool,
    /// Delta actually applied after clamping to the end of the program.
    pub applied: Duration,
    /// Segment the engine moved into, if it changed.
    pub entered: Option<usize>,
    pub cycles_completed: u32,
    pub finished: bool,
}

/// Timed segment state machine.
///
/// Purely synchronous: it never schedules anything itself. A host (or
/// [`PlaybackController`](crate::timer::PlaybackController)) feeds it
/// measured deltas through [`tick`](Self::tick). Taking `&mut self` means a
/// tick can never re-enter another one.
#[derive(Debug, Clone)]
pub struct Engine {
    program: Program,
    options: EngineOptions,
    state: RunState,
    cycles: CycleAccumulator,
}

impl Engine {
    pub fn new(program: Program, options: EngineOptions) -> std::result::Result<Self, ConfigError> {
        options.validate(&program)?;
        let cycles = CycleAccumulator::new(options.target_cycles)?;

        Ok(Self {
            program,
            options,
            state: RunState::new(),
            cycles,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn is_running(&self) -> bool {
        self.state.status == RunStatus::Running
    }

    pub fn completed_cycles(&self) -> u32 {
        self.cycles.completed()
    }

    /// Effective cycle target; script programs never have one.
    pub fn target_cycles(&self) -> Option<u32> {
        if self.program.is_cycling() {
            self.cycles.target()
        } else {
            None
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.options
            .tick_interval
            .unwrap_or_else(|| default_tick_interval(self.program.kind()))
    }

    /// Begins a fresh run from idle or finished, or resumes a paused one.
    pub fn start(&mut self) -> CommandOutcome {
        match self.state.status {
            RunStatus::Running => CommandOutcome::Ignored,
            RunStatus::Paused => {
                self.state.status = RunStatus::Running;
                CommandOutcome::Applied
            }
            RunStatus::Idle | RunStatus::Finished => {
                self.clear_run();
                self.settle();
                self.state.status = RunStatus::Running;
                CommandOutcome::Applied
            }
        }
    }

    pub fn pause(&mut self) -> CommandOutcome {
        if self.state.status != RunStatus::Running {
            return CommandOutcome::Ignored;
        }
        self.state.status = RunStatus::Paused;
        CommandOutcome::Applied
    }

    pub fn reset(&mut self) -> CommandOutcome {
        if self.state.is_pristine() && self.cycles.completed() == 0 {
            return CommandOutcome::Ignored;
        }
        self.clear_run();
        CommandOutcome::Applied
    }

    /// Swaps the active program and clears all run state. Returns the status
    /// the engine had before the swap so callers can restart it.
    pub fn select_program(&mut self, program: Program) -> std::result::Result<RunStatus, ConfigError> {
        self.options.validate(&program)?;
        let previous = self.state.status;
        self.program = program;
        self.clear_run();
        Ok(previous)
    }

    /// Changes the cycle target. Refused while running; a finished run is
    /// cleared first since its count belongs to the old target.
    pub fn set_target_cycles(&mut self, target: Option<u32>) -> Result<()> {
        let mut cycles = self.cycles;
        cycles.set_target(target)?;

        match self.state.status {
            RunStatus::Running => return Err(EngineError::TargetLocked),
            RunStatus::Paused => {
                let completed = self.cycles.completed();
                if let Some(target) = target.filter(|target| *target <= completed) {
                    return Err(EngineError::TargetAlreadyPassed { target, completed });
                }
            }
            RunStatus::Finished => self.clear_run(),
            RunStatus::Idle => {}
        }

        self.cycles.set_target(target)?;
        self.options.target_cycles = target;
        Ok(())
    }

    /// Time left until the program ends on its own, if it ever does.
    pub fn remaining_total(&self) -> Option<Duration> {
        match self.program.kind() {
            ProgramKind::Script { total } => {
                Some(total.saturating_sub(self.state.session_elapsed_total))
            }
            ProgramKind::Cycling => {
                let cycles_left = self.cycles.remaining()?;
                let position = self
                    .program
                    .segment_start(self.state.current_segment_index)
                    .saturating_add(self.state.elapsed_in_segment);
                let span = self
                    .program
                    .cycle_duration()
                    .checked_mul(cycles_left)
                    .unwrap_or(Duration::MAX);
                Some(span.saturating_sub(position))
            }
        }
    }

    /// Advances a running engine by `delta`. Ticks arriving in any other
    /// state are discarded. A delta past the end of the program is clamped
    /// so the run lands exactly on its terminal state.
    pub fn tick(&mut self, delta: Duration) -> TickReport {
        if self.state.status != RunStatus::Running {
            return TickReport::default();
        }

        let delta = match self.remaining_total() {
            Some(remaining) => delta.min(remaining),
            None => delta,
        };

        let mut report = match self.program.kind() {
            ProgramKind::Cycling => self.tick_cycling(delta),
            ProgramKind::Script { total } => self.tick_script(delta, total),
        };
        report.processed = true;
        report.applied = delta;
        report
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let index = self.state.current_segment_index;
        let segment = self.program.segment(index);
        let duration = segment.map(Segment::duration).unwrap_or_default();
        let elapsed = self.state.elapsed_in_segment.min(duration);

        EngineSnapshot {
            program_id: self.program.id().to_string(),
            status: self.state.status,
            current_segment_index: index,
            segment_label: segment.map(|s| s.label().to_string()).unwrap_or_default(),
            instruction: segment.and_then(Segment::instruction).map(str::to_string),
            elapsed_in_segment: elapsed.as_secs_f64(),
            remaining_in_segment: duration.saturating_sub(elapsed).as_secs_f64(),
            progress_ratio: sequencer::progress_ratio(elapsed, duration),
            completed_cycles: self.cycles.completed(),
            target_cycles: self.target_cycles(),
            session_elapsed_total: self.state.session_elapsed_total.as_secs_f64(),
            remaining_total: self.remaining_total().map(|d| d.as_secs_f64()),
        }
    }

    fn tick_cycling(&mut self, delta: Duration) -> TickReport {
        let mut report = TickReport::default();
        let epsilon = self.options.transition_epsilon;
        let mut pending = delta;

        self.state.session_elapsed_total = self.state.session_elapsed_total.saturating_add(delta);

        loop {
            let step = sequencer::advance(
                self.program.segments(),
                self.state.current_segment_index,
                self.state.elapsed_in_segment,
                pending,
                epsilon,
            );
            self.state.current_segment_index = step.index;
            self.state.elapsed_in_segment = step.elapsed;
            if step.transitioned {
                report.entered = Some(step.index);
            }

            if step.wrapped {
                report.cycles_completed += 1;
                if self.cycles.on_wrap() == CycleOutcome::TargetReached {
                    self.finish();
                    report.finished = true;
                    return report;
                }
            }

            if !step.wrapped || step.leftover.is_zero() {
                break;
            }
            pending = step.leftover;
        }

        if let Some(index) = self.settle() {
            report.entered = Some(index);
        }
        report
    }

    fn tick_script(&mut self, delta: Duration, total: Duration) -> TickReport {
        let mut report = TickReport::default();

        let mut elapsed = self
            .state
            .session_elapsed_total
            .saturating_add(delta)
            .min(total);
        if total.saturating_sub(elapsed) <= self.options.transition_epsilon {
            elapsed = total;
        }
        self.state.session_elapsed_total = elapsed;

        let remaining = total.saturating_sub(elapsed);
        let line_duration = self
            .program
            .segment(0)
            .map(Segment::duration)
            .unwrap_or_default();
        let derived = sequencer::script_line(self.program.len(), line_duration, remaining);

        // A line once shown stays shown.
        let index = derived.max(self.state.current_segment_index);
        if index != self.state.current_segment_index {
            report.entered = Some(index);
        }
        self.state.current_segment_index = index;
        self.state.elapsed_in_segment = elapsed
            .saturating_sub(self.program.segment_start(index))
            .min(line_duration);

        if remaining.is_zero() {
            self.finish();
            report.finished = true;
        }
        report
    }

    /// Moves off instant segments at the current position without spending
    /// time. Returns the new index when it changed.
    fn settle(&mut self) -> Option<usize> {
        if !self.program.is_cycling() {
            return None;
        }
        let step = sequencer::advance(
            self.program.segments(),
            self.state.current_segment_index,
            self.state.elapsed_in_segment,
            Duration::ZERO,
            Duration::ZERO,
        );
        if !step.transitioned {
            return None;
        }
        self.state.current_segment_index = step.index;
        self.state.elapsed_in_segment = step.elapsed;
        Some(step.index)
    }

    fn finish(&mut self) {
        self.state.status = RunStatus::Finished;
    }

    fn clear_run(&mut self) {
        self.state = RunState::new();
        self.cycles.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const TICK: Duration = BREATHING_TICK;

    fn breathing(pattern: [f64; 4], target: Option<u32>) -> Engine {
        let [inhale, hold_in, exhale, hold_out] = pattern;
        let program = Program::breathing("test", "Test", inhale, hold_in, exhale, hold_out).unwrap();
        Engine::new(program, EngineOptions::default().with_target_cycles(target)).unwrap()
    }

    fn script(total_secs: u64, lines: usize) -> Engine {
        let lines = (0..lines).map(|i| format!("line {i}")).collect();
        let program = Program::script("scene", "Scene", Duration::from_secs(total_secs), lines).unwrap();
        Engine::new(program, EngineOptions::default()).unwrap()
    }

    fn run_ticks(engine: &mut Engine, count: usize, delta: Duration) {
        for _ in 0..count {
            engine.tick(delta);
        }
    }

    #[test]
    fn progress_stays_in_unit_range_for_random_ticks() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut engines = vec![
            breathing([4.0, 7.0, 8.0, 0.0], None),
            breathing([5.5, 0.0, 5.5, 0.0], Some(4)),
            breathing([1.0, 0.0, 1.0, 0.0], Some(3)),
            script(300, 10),
            script(270, 13),
        ];

        for engine in &mut engines {
            engine.start();
            for _ in 0..2_000 {
                match rng.gen_range(0..100) {
                    0 => {
                        engine.pause();
                    }
                    1 | 2 => {
                        engine.start();
                    }
                    _ => {}
                }
                engine.tick(Duration::from_millis(rng.gen_range(0..1_500)));

                let snapshot = engine.snapshot();
                assert!((0.0..=1.0).contains(&snapshot.progress_ratio));
                assert!(snapshot.current_segment_index < engine.program().len());
                assert!(snapshot.remaining_in_segment >= 0.0);
                if let Some(target) = snapshot.target_cycles {
                    assert!(snapshot.completed_cycles <= target);
                }
                if let Some(remaining) = snapshot.remaining_total {
                    assert!(remaining >= 0.0);
                }
            }
        }
    }

    #[test]
    fn one_traversal_matches_stated_duration() {
        for (pattern, expected) in [
            ([4.0, 7.0, 8.0, 0.0], 19.0),
            ([4.0, 4.0, 4.0, 4.0], 16.0),
            ([5.5, 0.0, 5.5, 0.0], 11.0),
            ([1.0, 0.0, 1.0, 0.0], 2.0),
        ] {
            let mut engine = breathing(pattern, None);
            engine.start();
            let mut ticks = 0u32;
            while engine.completed_cycles() == 0 {
                engine.tick(TICK);
                ticks += 1;
                assert!(ticks < 1_000, "pattern {pattern:?} never wrapped");
            }
            let measured = f64::from(ticks) * TICK.as_secs_f64();
            assert!(
                (measured - expected).abs() <= TICK.as_secs_f64(),
                "pattern {pattern:?}: {measured}s vs {expected}s"
            );
        }
    }

    #[test]
    fn pause_twice_equals_pause_once() {
        let mut engine = breathing([4.0, 4.0, 4.0, 4.0], None);
        engine.start();
        run_ticks(&mut engine, 25, TICK);

        assert_eq!(engine.pause(), CommandOutcome::Applied);
        let once = engine.snapshot();
        assert_eq!(engine.pause(), CommandOutcome::Ignored);
        assert_eq!(engine.snapshot(), once);

        let report = engine.tick(Duration::from_secs(3));
        assert!(!report.processed);
        assert_eq!(engine.snapshot(), once);

        engine.start();
        engine.tick(TICK);
        assert_eq!(engine.state().session_elapsed_total, Duration::from_millis(2_600));
    }

    #[test]
    fn reset_from_any_state_matches_idle_snapshot() {
        let mut engine = breathing([4.0, 7.0, 8.0, 0.0], Some(2));
        let idle = engine.snapshot();
        assert_eq!(engine.reset(), CommandOutcome::Ignored);

        engine.start();
        run_ticks(&mut engine, 57, TICK);
        assert_eq!(engine.reset(), CommandOutcome::Applied);
        assert_eq!(engine.snapshot(), idle);

        engine.start();
        run_ticks(&mut engine, 230, TICK);
        engine.pause();
        engine.reset();
        assert_eq!(engine.snapshot(), idle);

        engine.start();
        engine.tick(Duration::from_secs(3_600));
        assert_eq!(engine.status(), RunStatus::Finished);
        engine.reset();
        assert_eq!(engine.snapshot(), idle);
    }

    #[test]
    fn stops_exactly_at_target_cycles() {
        let mut engine = breathing([4.0, 4.0, 4.0, 4.0], Some(3));
        engine.start();

        let mut ticks = 0;
        while engine.is_running() {
            engine.tick(TICK);
            ticks += 1;
            assert!(ticks < 10_000);
        }

        assert_eq!(engine.status(), RunStatus::Finished);
        assert_eq!(engine.completed_cycles(), 3);
        assert_eq!(ticks, 480);

        let report = engine.tick(TICK);
        assert!(!report.processed);
        assert_eq!(engine.completed_cycles(), 3);
    }

    #[test]
    fn late_tick_is_clamped_to_program_end() {
        let mut engine = breathing([4.0, 4.0, 4.0, 4.0], Some(3));
        engine.start();
        engine.tick(Duration::from_secs(5));

        let report = engine.tick(Duration::from_secs(3_600));
        assert!(report.finished);
        assert_eq!(report.cycles_completed, 3);
        assert_eq!(report.applied, Duration::from_secs(43));
        assert_eq!(engine.completed_cycles(), 3);
        assert_eq!(engine.state().session_elapsed_total, Duration::from_secs(48));
        assert_eq!(engine.remaining_total(), Some(Duration::ZERO));
    }

    #[test]
    fn zero_length_holds_are_never_visited() {
        let mut engine = breathing([4.0, 0.0, 4.0, 0.0], None);
        engine.start();

        let mut visited = vec![engine.snapshot().current_segment_index];
        for tick in 1..=80 {
            let report = engine.tick(TICK);
            visited.push(engine.snapshot().current_segment_index);
            if tick < 80 {
                assert_eq!(engine.completed_cycles(), 0, "wrapped early at tick {tick}");
            } else {
                assert_eq!(report.cycles_completed, 1);
            }
        }

        assert!(visited.iter().all(|index| *index == 0 || *index == 2));
        assert!(visited.contains(&2));
        assert_eq!(engine.completed_cycles(), 1);
    }

    #[test]
    fn four_seven_eight_scenario() {
        let mut engine = breathing([4.0, 7.0, 8.0, 0.0], None);
        engine.start();

        run_ticks(&mut engine, 40, TICK);
        assert_eq!(engine.snapshot().segment_label, "hold1");

        run_ticks(&mut engine, 149, TICK);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.segment_label, "exhale");
        assert_eq!(snapshot.completed_cycles, 0);
        assert!((snapshot.elapsed_in_segment - 7.9).abs() < 1e-9);

        let report = engine.tick(TICK);
        assert_eq!(report.cycles_completed, 1);
        assert_eq!(engine.completed_cycles(), 1);
        assert_eq!(engine.state().session_elapsed_total, Duration::from_secs(19));
        assert_eq!(engine.snapshot().segment_label, "inhale");
    }

    #[test]
    fn script_lines_follow_remaining_time() {
        let mut engine = script(300, 10);
        engine.start();

        let mut previous = 0;
        for second in 1..=300u64 {
            engine.tick(SCRIPT_TICK);
            let line = engine.snapshot().current_segment_index;
            assert!(line >= previous, "line went back at {second}s");
            previous = line;

            if second < 30 {
                assert_eq!(line, 0, "at {second}s");
            }
            if second >= 270 {
                assert_eq!(line, 9, "at {second}s");
            }
        }

        assert_eq!(engine.status(), RunStatus::Finished);
        assert_eq!(engine.remaining_total(), Some(Duration::ZERO));
        assert_eq!(engine.snapshot().progress_ratio, 1.0);
    }

    #[test]
    fn script_never_skips_a_line_with_uneven_split() {
        let mut engine = script(300, 11);
        engine.start();

        let mut seen = vec![0usize];
        while engine.is_running() {
            let report = engine.tick(SCRIPT_TICK);
            if let Some(line) = report.entered {
                assert_eq!(line, seen.last().copied().unwrap_or_default() + 1);
                seen.push(line);
            }
        }
        assert_eq!(seen, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn script_late_tick_lands_on_finished() {
        let mut engine = script(120, 7);
        engine.start();
        let report = engine.tick(Duration::from_secs(600));

        assert!(report.finished);
        assert_eq!(report.applied, Duration::from_secs(120));
        assert_eq!(engine.state().session_elapsed_total, Duration::from_secs(120));
        assert_eq!(engine.snapshot().current_segment_index, 6);
        assert!(!engine.tick(SCRIPT_TICK).processed);
    }

    #[test]
    fn start_is_ignored_while_running_and_restarts_after_finish() {
        let mut engine = breathing([1.0, 0.0, 1.0, 0.0], Some(1));
        assert_eq!(engine.start(), CommandOutcome::Applied);
        assert_eq!(engine.start(), CommandOutcome::Ignored);

        engine.tick(Duration::from_secs(2));
        assert_eq!(engine.status(), RunStatus::Finished);

        assert_eq!(engine.start(), CommandOutcome::Applied);
        assert_eq!(engine.completed_cycles(), 0);
        assert_eq!(engine.state().session_elapsed_total, Duration::ZERO);
    }

    #[test]
    fn target_changes_are_locked_while_running() {
        let mut engine = breathing([1.0, 0.0, 1.0, 0.0], Some(5));
        engine.start();
        assert_eq!(engine.set_target_cycles(Some(8)), Err(EngineError::TargetLocked));

        engine.tick(Duration::from_secs(4));
        engine.pause();
        assert_eq!(
            engine.set_target_cycles(Some(2)),
            Err(EngineError::TargetAlreadyPassed { target: 2, completed: 2 })
        );
        assert_eq!(engine.set_target_cycles(Some(3)), Ok(()));
        assert_eq!(
            engine.set_target_cycles(Some(0)),
            Err(EngineError::Config(ConfigError::ZeroTargetCycles))
        );
        assert_eq!(engine.target_cycles(), Some(3));
    }

    #[test]
    fn selecting_a_program_clears_run_state() {
        let mut engine = breathing([4.0, 4.0, 4.0, 4.0], None);
        engine.start();
        run_ticks(&mut engine, 170, TICK);

        let next = Program::breathing("resonant", "Resonant", 5.5, 0.0, 5.5, 0.0).unwrap();
        let previous = engine.select_program(next).unwrap();

        assert_eq!(previous, RunStatus::Running);
        assert_eq!(engine.status(), RunStatus::Idle);
        assert_eq!(engine.completed_cycles(), 0);
        assert_eq!(engine.snapshot().program_id, "resonant");
        assert_eq!(engine.state().session_elapsed_total, Duration::ZERO);
    }

    #[test]
    fn leading_instant_segment_is_skipped_on_start() {
        let segments = vec![
            Segment::new("settle", 0.0).unwrap(),
            Segment::new("breathe", 2.0).unwrap(),
        ];
        let program = Program::cycling("lead", "Lead", segments).unwrap();
        let mut engine = Engine::new(program, EngineOptions::default()).unwrap();

        engine.start();
        assert_eq!(engine.snapshot().segment_label, "breathe");

        engine.tick(Duration::from_secs(2));
        assert_eq!(engine.completed_cycles(), 1);
        assert_eq!(engine.snapshot().segment_label, "breathe");
    }

    #[test]
    fn rejects_bad_options() {
        let program = Program::breathing("box", "Box", 4.0, 4.0, 4.0, 4.0).unwrap();
        assert_eq!(
            Engine::new(program.clone(), EngineOptions::default().with_tick_interval(Duration::ZERO))
                .err(),
            Some(ConfigError::ZeroTickInterval)
        );
        assert_eq!(
            Engine::new(program, EngineOptions::default().with_target_cycles(Some(0))).err(),
            Some(ConfigError::ZeroTargetCycles)
        );
    }

    #[test]
    fn tick_interval_follows_program_kind() {
        assert_eq!(breathing([4.0, 4.0, 4.0, 4.0], None).tick_interval(), BREATHING_TICK);
        assert_eq!(script(120, 7).tick_interval(), SCRIPT_TICK);
    }
}
