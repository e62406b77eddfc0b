//! Per-function evolution binding.
//!
//! An [`EvolutionWrapper`] owns a callable together with the source text it
//! was bound with. Each [`EvolutionWrapper::call`] reads the injected
//! [`ModeFlag`]; in development mode the source is analyzed and the
//! suggestions reported before the callable runs. Analysis never changes the
//! callable's result: engine errors fall back to the local analyzer and
//! unexpected panics during analysis are reported and swallowed. The
//! callable's own panics propagate untouched.
//!
//! Development calls are also measured. Resource constraints the call did
//! not stay below are logged and kept for [`EvolutionWrapper::last_violations`].

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::analysis::heuristics::LocalHeuristicAnalyzer;
use crate::errors::{EvolveError, EvolveResult};
use crate::evolve::mode::ModeFlag;
use crate::evolve::report::{ConsoleReporter, Reporter};
use crate::evolve::resources::{violations, ResourceMonitor, ResourceUsage, Violation};
use crate::generation::gateway::{SuggestionEngine, SuggestionRequest};
use crate::models::{sort_by_priority, Constraint, Goal, Suggestion};
use crate::source::cache::SourceCache;
use crate::source::language::SourceLanguage;
use crate::source::model::dedent;

/// Collects the settings of one binding. Created by
/// [`EvolutionWrapper::builder`].
pub struct EvolutionBuilder {
    name: String,
    source: String,
    language: SourceLanguage,
    goals: IndexSet<Goal>,
    constraints: Vec<Constraint>,
    instructions: Option<String>,
    engine: Option<Arc<dyn SuggestionEngine>>,
    reporter: Option<Arc<dyn Reporter>>,
    mode: Option<ModeFlag>,
    cache: Option<Arc<SourceCache>>,
}

impl EvolutionBuilder {
    pub fn language(mut self, language: SourceLanguage) -> Self {
        self.language = language;
        self
    }

    /// An empty set falls back to [`Goal::defaults`].
    pub fn goals(mut self, goals: impl IntoIterator<Item = Goal>) -> Self {
        self.goals = goals.into_iter().collect();
        self
    }

    /// Goals given by label, e.g. `["readability", "security"]`.
    pub fn goal_labels<S: AsRef<str>>(self, labels: &[S]) -> EvolveResult<Self> {
        let goals = labels
            .iter()
            .map(|label| Goal::parse(label.as_ref()))
            .collect::<EvolveResult<Vec<_>>>()?;
        Ok(self.goals(goals))
    }

    /// Duplicates are dropped; an empty list falls back to
    /// [`Constraint::defaults`].
    pub fn constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.clear();
        for constraint in constraints {
            if !self.constraints.contains(&constraint) {
                self.constraints.push(constraint);
            }
        }
        self
    }

    /// Constraints given by identifier, e.g. `["preserve_semantics", "runtime<10ms"]`.
    pub fn constraint_ids<S: AsRef<str>>(self, identifiers: &[S]) -> EvolveResult<Self> {
        let constraints = identifiers
            .iter()
            .map(|id| Constraint::parse(id.as_ref()))
            .collect::<EvolveResult<Vec<_>>>()?;
        Ok(self.constraints(constraints))
    }

    /// Blank instructions are ignored.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.instructions = (!instructions.trim().is_empty()).then_some(instructions);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn SuggestionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Defaults to a [`ConsoleReporter`] on stdout.
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Defaults to [`ModeFlag::from_env`].
    pub fn mode(mut self, mode: ModeFlag) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Share parsed models with other bindings.
    pub fn cache(mut self, cache: Arc<SourceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Bind `callable`. Fails immediately when no engine was given.
    pub fn wrap<F>(self, callable: F) -> EvolveResult<EvolutionWrapper<F>> {
        let engine = self
            .engine
            .ok_or_else(|| EvolveError::MissingEngine(self.name.clone()))?;
        let goals = if self.goals.is_empty() {
            Goal::defaults()
        } else {
            self.goals
        };
        let constraints = if self.constraints.is_empty() {
            Constraint::defaults()
        } else {
            self.constraints
        };
        let monitor = ResourceMonitor::for_constraints(&constraints);
        let mut analyzer = LocalHeuristicAnalyzer::new(self.language);
        if let Some(cache) = self.cache {
            analyzer = analyzer.with_cache(cache);
        }
        debug!(function = %self.name, language = %self.language, "bound evolution wrapper");
        Ok(EvolutionWrapper {
            callable,
            name: self.name,
            language: self.language,
            source: self.source,
            goals,
            constraints,
            instructions: self.instructions,
            engine,
            analyzer,
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(ConsoleReporter::stdout())),
            mode: self.mode.unwrap_or_else(ModeFlag::from_env),
            suggestions: Mutex::new(Vec::new()),
            monitor,
            violations: Mutex::new(Vec::new()),
        })
    }
}

pub struct EvolutionWrapper<F> {
    callable: F,
    name: String,
    language: SourceLanguage,
    source: String,
    goals: IndexSet<Goal>,
    constraints: Vec<Constraint>,
    instructions: Option<String>,
    engine: Arc<dyn SuggestionEngine>,
    analyzer: LocalHeuristicAnalyzer,
    reporter: Arc<dyn Reporter>,
    mode: ModeFlag,
    suggestions: Mutex<Vec<Suggestion>>,
    monitor: ResourceMonitor,
    violations: Mutex<Vec<Violation>>,
}

impl EvolutionWrapper<()> {
    /// Start a binding for the function `name` whose source text is
    /// `source`. The text is captured now, with common indentation removed.
    pub fn builder(name: impl Into<String>, source: impl AsRef<str>) -> EvolutionBuilder {
        EvolutionBuilder {
            name: name.into(),
            source: dedent(source.as_ref()),
            language: SourceLanguage::default(),
            goals: IndexSet::new(),
            constraints: Vec::new(),
            instructions: None,
            engine: None,
            reporter: None,
            mode: None,
            cache: None,
        }
    }
}

/// Bind `callable` with default goals and constraints.
pub fn evolve<F>(
    name: impl Into<String>,
    source: impl AsRef<str>,
    engine: Arc<dyn SuggestionEngine>,
    callable: F,
) -> EvolveResult<EvolutionWrapper<F>> {
    EvolutionWrapper::builder(name, source).engine(engine).wrap(callable)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "analysis panicked".to_string()
    }
}

impl<F> EvolutionWrapper<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn goals(&self) -> &IndexSet<Goal> {
        &self.goals
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn mode(&self) -> &ModeFlag {
        &self.mode
    }

    /// Suggestions of the most recent analysis pass.
    pub fn last_suggestions(&self) -> Vec<Suggestion> {
        self.suggestions.lock().clone()
    }

    /// Resource constraints broken by the most recent development call.
    pub fn last_violations(&self) -> Vec<Violation> {
        self.violations.lock().clone()
    }

    fn request(&self) -> SuggestionRequest {
        SuggestionRequest {
            language: self.language,
            source: self.source.clone(),
            goals: self.goals.clone(),
            constraints: self.constraints.clone(),
            instructions: self.instructions.clone(),
        }
    }

    /// Run one analysis pass and store its result, replacing the previous
    /// one. Engine errors fall back to the local analyzer.
    pub fn analyze(&self) -> Vec<Suggestion> {
        let request = self.request();
        if let Some(instructions) = &request.instructions {
            info!(function = %self.name, %instructions, "analyzing with instructions");
        }
        let mut suggestions = match self.engine.request_suggestions(&request) {
            Ok(suggestions) => suggestions,
            Err(err) if err.is_generation_failure() => {
                warn!(function = %self.name, error = %err, "generation unavailable, using local analysis");
                self.analyzer.analyze(&self.source)
            }
            Err(err) => {
                error!(function = %self.name, error = %err, "engine failed, using local analysis");
                self.analyzer.analyze(&self.source)
            }
        };
        sort_by_priority(&mut suggestions);
        *self.suggestions.lock() = suggestions.clone();
        suggestions
    }

    /// Analyze and report; panics are contained here.
    fn analyze_and_report(&self) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let suggestions = self.analyze();
            if !suggestions.is_empty() {
                self.reporter.report(&self.name, &suggestions);
            }
        }));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            error!(function = %self.name, %message, "analysis aborted");
            self.reporter.report_failure(&self.name, &message);
        }
    }

    fn check_resources(&self, usage: &ResourceUsage) {
        let found = violations(&self.constraints, usage);
        for violation in &found {
            warn!(
                function = %self.name,
                constraint = %violation.constraint,
                measured = %violation.measured,
                "resource constraint exceeded"
            );
        }
        *self.violations.lock() = found;
    }

    /// Invoke the wrapped callable, analyzing first in development mode.
    /// The callable's result is returned unchanged.
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        if !self.mode.mode().is_development() {
            return (self.callable)(args);
        }
        self.analyze_and_report();
        let (result, usage) = self.monitor.measure(|| (self.callable)(args));
        self.check_resources(&usage);
        result
    }
}
