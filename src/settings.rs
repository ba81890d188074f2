use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::engine::{EngineOptions, Program, ProgramKind};

const DEBUG_ENV: &str = "STILLPOINT_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeSettings {
    pub breathing_tick_ms: u64,
    pub script_tick_ms: u64,
    /// Cycle target applied to breathing programs; `null` runs until stopped.
    pub default_target_cycles: Option<u32>,
    pub heartbeat_every_ticks: u32,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            breathing_tick_ms: 100,
            script_tick_ms: 1000,
            default_target_cycles: Some(10),
            heartbeat_every_ticks: 10,
        }
    }
}

impl PracticeSettings {
    pub fn validate(&self) -> Result<()> {
        if self.breathing_tick_ms == 0 || self.script_tick_ms == 0 {
            bail!("tick intervals must be greater than zero");
        }
        if self.default_target_cycles == Some(0) {
            bail!("defaultTargetCycles must be at least 1");
        }
        if self.heartbeat_every_ticks == 0 {
            bail!("heartbeatEveryTicks must be at least 1");
        }
        Ok(())
    }

    pub fn engine_options(&self, program: &Program) -> EngineOptions {
        let tick_ms = match program.kind() {
            ProgramKind::Cycling => self.breathing_tick_ms,
            ProgramKind::Script { .. } => self.script_tick_ms,
        };
        EngineOptions::default()
            .with_tick_interval(Duration::from_millis(tick_ms))
            .with_target_cycles(self.default_target_cycles)
    }

    /// Heartbeat cadence, forced to every tick when `STILLPOINT_DEBUG` is set.
    pub fn heartbeat_every_ticks(&self) -> u32 {
        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            1
        } else {
            self.heartbeat_every_ticks.max(1)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    practice: PracticeSettings,
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing. A file that exists but does not parse is an error.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            let data: UserSettings = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
            data.practice
                .validate()
                .with_context(|| format!("Invalid settings in {}", path.display()))?;
            data
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Defaults only; updates are kept in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(UserSettings::default()),
        }
    }

    pub fn practice(&self) -> PracticeSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .practice
            .clone()
    }

    pub fn update_practice(&self, settings: PracticeSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        guard.practice = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
