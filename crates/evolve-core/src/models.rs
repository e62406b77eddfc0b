//! Shared typed models: goals, constraints, suggestions and the run mode.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{EvolveError, EvolveResult};

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Upper bound on the number of suggestions a single analysis pass returns.
pub const MAX_SUGGESTIONS: usize = 20;

/// Mode value that enables analysis.
pub const DEVELOPMENT_MODE: &str = "development";

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// A named dimension of desired improvement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Readability,
    Performance,
    Security,
    Maintainability,
    Testability,
}

impl Goal {
    pub const ALL: [Goal; 5] = [
        Goal::Readability,
        Goal::Performance,
        Goal::Security,
        Goal::Maintainability,
        Goal::Testability,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Goal::Readability => "readability",
            Goal::Performance => "performance",
            Goal::Security => "security",
            Goal::Maintainability => "maintainability",
            Goal::Testability => "testability",
        }
    }

    /// Parse a goal from its label, ignoring case and surrounding whitespace.
    pub fn parse(label: &str) -> EvolveResult<Goal> {
        let normalized = label.trim().to_lowercase();
        Goal::ALL
            .into_iter()
            .find(|goal| goal.label() == normalized)
            .ok_or_else(|| EvolveError::InvalidGoal(label.to_string()))
    }

    /// Baseline goals used when a binding does not name any.
    pub fn defaults() -> IndexSet<Goal> {
        IndexSet::from([Goal::Readability, Goal::Performance])
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render goals as comma-joined labels, in their set order.
pub fn goal_labels(goals: &IndexSet<Goal>) -> String {
    goals
        .iter()
        .map(Goal::label)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

static RESOURCE_CONSTRAINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(memory|runtime|cpu)\s*<\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z%]*)\s*$").unwrap()
});

static OUTPUT_CONSTRAINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*output\s*=\s*(.*?)\s*$").unwrap());

/// A named condition an improvement must not violate.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    PreserveSemantics,
    /// Output must match this text exactly.
    Output(String),
    MemoryBelow { megabytes: f64 },
    RuntimeBelow(Duration),
    CpuBelow { percent: f64 },
    Custom(String),
}

impl Constraint {
    /// Parse a constraint identifier.
    ///
    /// Recognised forms: `preserve_semantics`, `output=<text>`,
    /// `memory<N(KB|MB|GB)`, `runtime<N(ms|s)`, `cpu<N%`. Anything else is
    /// kept verbatim as a custom constraint.
    pub fn parse(identifier: &str) -> EvolveResult<Constraint> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(EvolveError::InvalidConstraint(identifier.to_string()));
        }
        if trimmed.eq_ignore_ascii_case("preserve_semantics") {
            return Ok(Constraint::PreserveSemantics);
        }
        if let Some(caps) = OUTPUT_CONSTRAINT_RE.captures(trimmed) {
            return Ok(Constraint::Output(caps[1].to_string()));
        }
        let Some(caps) = RESOURCE_CONSTRAINT_RE.captures(trimmed) else {
            return Ok(Constraint::Custom(trimmed.to_string()));
        };
        let value: f64 = caps[2]
            .parse()
            .map_err(|_| EvolveError::InvalidConstraint(identifier.to_string()))?;
        let unit = &caps[3];
        let unsupported = || EvolveError::InvalidConstraint(format!("{identifier}: unsupported unit '{unit}'"));
        match &caps[1] {
            "memory" => {
                let megabytes = match unit {
                    "KB" => value / 1024.0,
                    "MB" => value,
                    "GB" => value * 1024.0,
                    _ => return Err(unsupported()),
                };
                Ok(Constraint::MemoryBelow { megabytes })
            }
            "runtime" => {
                let seconds = match unit {
                    "ms" => value / 1000.0,
                    "s" => value,
                    _ => return Err(unsupported()),
                };
                Duration::try_from_secs_f64(seconds)
                    .map(Constraint::RuntimeBelow)
                    .map_err(|_| EvolveError::InvalidConstraint(identifier.to_string()))
            }
            _ => match unit {
                "%" => Ok(Constraint::CpuBelow { percent: value }),
                _ => Err(unsupported()),
            },
        }
    }

    /// Baseline constraints used when a binding does not name any.
    pub fn defaults() -> Vec<Constraint> {
        vec![Constraint::PreserveSemantics]
    }

    /// One human-readable line describing the constraint, used in prompts.
    pub fn describe(&self) -> String {
        match self {
            Constraint::PreserveSemantics => {
                "The observable behavior of the function must not change".to_string()
            }
            Constraint::Output(expected) => format!("Output must match exactly \"{expected}\""),
            Constraint::MemoryBelow { megabytes } => {
                format!("Memory usage must stay below {megabytes}MB")
            }
            Constraint::RuntimeBelow(limit) => {
                format!("Runtime must stay below {}s", limit.as_secs_f64())
            }
            Constraint::CpuBelow { percent } => format!("CPU usage must stay below {percent}%"),
            Constraint::Custom(text) => text.clone(),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::PreserveSemantics => f.write_str("preserve_semantics"),
            Constraint::Output(expected) => write!(f, "output={expected}"),
            Constraint::MemoryBelow { megabytes } => write!(f, "memory<{megabytes}MB"),
            Constraint::RuntimeBelow(limit) => write!(f, "runtime<{}s", limit.as_secs_f64()),
            Constraint::CpuBelow { percent } => write!(f, "cpu<{percent}%"),
            Constraint::Custom(text) => f.write_str(text),
        }
    }
}

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

/// Categorical impact level of a suggestion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    #[default]
    Medium,
    High,
}

impl Impact {
    pub fn label(&self) -> &'static str {
        match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        }
    }

    pub fn from_label(label: &str) -> Option<Impact> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Impact::Low),
            "medium" | "med" | "moderate" => Some(Impact::Medium),
            "high" => Some(Impact::High),
            _ => None,
        }
    }

    /// Bucket a numeric score in `[0, 1]` into a level.
    pub fn from_score(score: f64) -> Impact {
        if score < 0.34 {
            Impact::Low
        } else if score < 0.67 {
            Impact::Medium
        } else {
            Impact::High
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Suggestion
// ---------------------------------------------------------------------------

/// One proposed improvement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub code_sample: String,
    /// 1 is the highest priority.
    #[serde(deserialize_with = "deserialize_priority")]
    pub priority: u32,
    pub impact: Impact,
    #[serde(default)]
    pub goals: IndexSet<Goal>,
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    u32::deserialize(deserializer).map(|priority| priority.max(1))
}

impl Suggestion {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            code_sample: String::new(),
            priority: 1,
            impact: Impact::Medium,
            goals: IndexSet::new(),
        }
    }

    pub fn with_code_sample(mut self, code_sample: impl Into<String>) -> Self {
        self.code_sample = code_sample.into();
        self
    }

    /// Set the priority, raising anything below 1 to 1.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority.max(1);
        self
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.impact = impact;
        self
    }

    pub fn with_goals(mut self, goals: impl IntoIterator<Item = Goal>) -> Self {
        self.goals = goals.into_iter().collect();
        self
    }
}

/// Stable sort by ascending priority; ties keep production order.
pub fn sort_by_priority(suggestions: &mut [Suggestion]) {
    suggestions.sort_by_key(|s| s.priority);
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Whether bindings analyze before delegating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    /// Only the exact value `"development"` enables analysis.
    pub fn from_setting(value: &str) -> Mode {
        if value == DEVELOPMENT_MODE {
            Mode::Development
        } else {
            Mode::Production
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Mode::Development)
    }
}
