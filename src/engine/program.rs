use std::time::Duration;

use super::error::ConfigError;

pub const INHALE: &str = "inhale";
pub const HOLD_IN: &str = "hold1";
pub const EXHALE: &str = "exhale";
pub const HOLD_OUT: &str = "hold2";

/// One named, timed step of a program.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    label: String,
    instruction: Option<String>,
    duration: Duration,
}

impl Segment {
    /// Builds a segment from a duration in seconds. Zero is allowed and means
    /// the segment is skipped during playback.
    pub fn new(label: impl Into<String>, seconds: f64) -> Result<Self, ConfigError> {
        let label = label.into();
        // Rejects NaN, negatives, infinities and anything past `Duration::MAX`.
        let Ok(duration) = Duration::try_from_secs_f64(seconds) else {
            return Err(ConfigError::InvalidDuration { label, seconds });
        };

        Ok(Self {
            label,
            instruction: None,
            duration,
        })
    }

    pub fn from_duration(label: impl Into<String>, duration: Duration) -> Self {
        Self {
            label: label.into(),
            instruction: None,
            duration,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_instant(&self) -> bool {
        self.duration.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Repeats its segments until stopped or until a cycle target is met.
    Cycling,
    /// Plays its lines once; `total` is split evenly across them.
    Script { total: Duration },
}

/// An ordered, validated, non-empty list of segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    id: String,
    title: String,
    kind: ProgramKind,
    segments: Vec<Segment>,
}

impl Program {
    pub fn cycling(
        id: impl Into<String>,
        title: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        if segments.is_empty() {
            return Err(ConfigError::EmptyProgram(id));
        }
        if segments.iter().all(Segment::is_instant) {
            return Err(ConfigError::ZeroLengthProgram(id));
        }
        // Later sums over the segments rely on the whole cycle fitting.
        let fits = segments
            .iter()
            .try_fold(Duration::ZERO, |total, segment| total.checked_add(segment.duration()))
            .is_some();
        if !fits {
            return Err(ConfigError::ProgramTooLong(id));
        }

        Ok(Self {
            id,
            title: title.into(),
            kind: ProgramKind::Cycling,
            segments,
        })
    }

    /// Four-phase breathing pattern. Holds set to 0 are kept as instant
    /// segments so segment indices stay stable across patterns.
    pub fn breathing(
        id: impl Into<String>,
        title: impl Into<String>,
        inhale: f64,
        hold_in: f64,
        exhale: f64,
        hold_out: f64,
    ) -> Result<Self, ConfigError> {
        let segments = vec![
            Segment::new(INHALE, inhale)?.with_instruction("Inhale deeply through your nose"),
            Segment::new(HOLD_IN, hold_in)?.with_instruction("Hold your breath"),
            Segment::new(EXHALE, exhale)?.with_instruction("Exhale slowly through your mouth"),
            Segment::new(HOLD_OUT, hold_out)?.with_instruction("Hold your breath"),
        ];
        Self::cycling(id, title, segments)
    }

    /// Script program whose per-line duration is `total / lines.len()`.
    pub fn script(
        id: impl Into<String>,
        title: impl Into<String>,
        total: Duration,
        lines: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        if lines.is_empty() {
            return Err(ConfigError::EmptyProgram(id));
        }
        if total.is_zero() {
            return Err(ConfigError::ZeroLengthProgram(id));
        }

        let line_duration = Duration::from_secs_f64(total.as_secs_f64() / lines.len() as f64);
        let segments = lines
            .into_iter()
            .map(|line| Segment::from_duration(line, line_duration))
            .collect();

        Ok(Self {
            id,
            title: title.into(),
            kind: ProgramKind::Script { total },
            segments,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Time for one full traversal; instant segments contribute nothing.
    pub fn cycle_duration(&self) -> Duration {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Offset of the start of `index` within one traversal.
    pub fn segment_start(&self, index: usize) -> Duration {
        self.segments
            .iter()
            .take(index)
            .map(Segment::duration)
            .sum()
    }

    /// Countdown length for script programs. Cycling programs have none.
    pub fn total_duration(&self) -> Option<Duration> {
        match self.kind {
            ProgramKind::Cycling => None,
            ProgramKind::Script { total } => Some(total),
        }
    }

    pub fn is_cycling(&self) -> bool {
        self.kind == ProgramKind::Cycling
    }
}
