//! Built-in breathing patterns, mindfulness exercises and guided
//! visualizations, shipped as embedded JSON.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::{ConfigError, Program};

const BUILTIN_CATALOG: &str = include_str!("catalog.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreathingPattern {
    pub id: String,
    pub name: String,
    pub inhale: f64,
    pub hold1: f64,
    pub exhale: f64,
    pub hold2: f64,
    pub description: String,
}

impl BreathingPattern {
    pub fn to_program(&self) -> Result<Program, ConfigError> {
        Program::breathing(
            &self.id,
            &self.name,
            self.inhale,
            self.hold1,
            self.exhale,
            self.hold2,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEntry {
    pub id: String,
    pub title: String,
    pub duration_secs: u64,
    pub lines: Vec<String>,
}

impl ScriptEntry {
    pub fn to_program(&self) -> Result<Program, ConfigError> {
        Program::script(
            &self.id,
            &self.title,
            Duration::from_secs(self.duration_secs),
            self.lines.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Breathing,
    Mindfulness,
    Visualization,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Breathing => "breathing",
            Category::Mindfulness => "mindfulness",
            Category::Visualization => "visualization",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub breathing: Vec<BreathingPattern>,
    pub mindfulness: Vec<ScriptEntry>,
    pub visualizations: Vec<ScriptEntry>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("built-in catalog is malformed")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        // Surface bad entries at load time rather than when a user picks one.
        for (category, id) in catalog.ids() {
            catalog
                .program(id)
                .with_context(|| format!("{} entry `{id}` is invalid", category.as_str()))?;
        }
        Ok(catalog)
    }

    /// Every entry id with its category, in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = (Category, &str)> {
        let breathing = self
            .breathing
            .iter()
            .map(|p| (Category::Breathing, p.id.as_str()));
        let mindfulness = self
            .mindfulness
            .iter()
            .map(|s| (Category::Mindfulness, s.id.as_str()));
        let visualizations = self
            .visualizations
            .iter()
            .map(|s| (Category::Visualization, s.id.as_str()));
        breathing.chain(mindfulness).chain(visualizations)
    }

    pub fn program(&self, id: &str) -> Result<Program> {
        if let Some(pattern) = self.breathing.iter().find(|p| p.id == id) {
            return Ok(pattern.to_program()?);
        }
        let script = self
            .mindfulness
            .iter()
            .chain(self.visualizations.iter())
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("unknown program `{id}`"))?;
        Ok(script.to_program()?)
    }
}
