//! Evolve core library: development-time improvement suggestions for wrapped
//! functions.
//!
//! A function is bound together with its source text through
//! [`EvolutionWrapper`]. In development mode every call first asks a
//! [`SuggestionEngine`] (normally the [`GenerationGateway`], which rotates
//! through API credentials) for prioritized [`Suggestion`]s, falls back to the
//! [`LocalHeuristicAnalyzer`] when generation is unavailable, reports the
//! result, and then runs the function unchanged. In production mode the
//! wrapper is a plain passthrough.
//!
//! ```no_run
//! use evolve_core::{EvolveConfig, EvolveContext};
//!
//! # fn main() -> evolve_core::EvolveResult<()> {
//! let config = EvolveConfig::load()?;
//! let context = EvolveContext::from_config(&config)?;
//! let add = context
//!     .bind("add", "def add(a, b):\n    print(a)\n    return a + b\n")
//!     .constraint_ids(&["preserve_semantics", "memory<256MB"])?
//!     .wrap(|(a, b): (i64, i64)| a + b)?;
//! assert_eq!(add.call((5, 3)), 8);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod errors;
pub mod evolve;
pub mod generation;
pub mod models;
pub mod source;

pub use analysis::heuristics::LocalHeuristicAnalyzer;
pub use config::EvolveConfig;
pub use errors::{EvolveError, EvolveResult};
pub use evolve::context::EvolveContext;
pub use evolve::mode::ModeFlag;
pub use evolve::report::{ConsoleReporter, Reporter, TracingReporter};
pub use evolve::resources::{ResourceMonitor, ResourceUsage, Violation};
pub use evolve::wrapper::{evolve, EvolutionBuilder, EvolutionWrapper};
pub use generation::gateway::{GenerationGateway, SuggestionEngine, SuggestionRequest};
pub use generation::keys::KeyRotator;
pub use models::{Constraint, Goal, Impact, Mode, Suggestion};
pub use source::language::SourceLanguage;
pub use source::model::SourceModel;
