//! Deterministic, no-network analyzer used when generation is unavailable.

use std::sync::Arc;

use tracing::debug;

use crate::models::{Goal, Impact, Suggestion};
use crate::source::cache::SourceCache;
use crate::source::language::SourceLanguage;
use crate::source::model::{DefinitionKind, SourceModel};

pub const LOGGING_TITLE: &str = "Replace output calls with structured logging";
pub const RETURN_TYPE_TITLE: &str = "Add return type annotations";

#[derive(Clone, Default)]
pub struct LocalHeuristicAnalyzer {
    language: SourceLanguage,
    cache: Option<Arc<SourceCache>>,
}

impl LocalHeuristicAnalyzer {
    pub fn new(language: SourceLanguage) -> Self {
        Self {
            language,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<SourceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Suggestions for `source`, sorted by priority. Never fails: text that
    /// does not parse yields no suggestions.
    pub fn analyze(&self, source: &str) -> Vec<Suggestion> {
        let parsed = match &self.cache {
            Some(cache) => cache.get_or_parse(self.language, source),
            None => SourceModel::parse(self.language, source).map(Arc::new),
        };
        match parsed {
            Ok(model) => self.analyze_model(&model),
            Err(err) => {
                debug!(error = %err, "local analysis skipped");
                Vec::new()
            }
        }
    }

    pub fn analyze_model(&self, model: &SourceModel) -> Vec<Suggestion> {
        let language = model.language();
        let mut suggestions = Vec::new();

        let output_calls = model.find_unstructured_output_calls();
        if !output_calls.is_empty() {
            let lines: Vec<String> = output_calls.iter().map(|c| c.line.to_string()).collect();
            suggestions.push(
                Suggestion::new(
                    LOGGING_TITLE,
                    format!(
                        "Unstructured output calls (line {}) should go through a logger so output can be filtered and routed.",
                        lines.join(", ")
                    ),
                )
                .with_code_sample(language.logging_example())
                .with_priority(1)
                .with_impact(Impact::High)
                .with_goals([Goal::Maintainability]),
            );
        }

        let unannotated: Vec<&str> = model
            .find_definitions()
            .iter()
            .filter(|d| d.kind != DefinitionKind::Constructor && !d.has_return_type())
            .map(|d| d.name.as_str())
            .collect();
        if !unannotated.is_empty() {
            suggestions.push(
                Suggestion::new(
                    RETURN_TYPE_TITLE,
                    format!(
                        "Declare the return type of {} so callers and tools know what comes back.",
                        unannotated.join(", ")
                    ),
                )
                .with_code_sample(language.return_type_example())
                .with_priority(2)
                .with_impact(Impact::Medium)
                .with_goals([Goal::Readability]),
            );
        }

        debug!(count = suggestions.len(), %language, "local analysis finished");
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_and_missing_annotation() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Python);
        let suggestions =
            analyzer.analyze("def test_function():\n    print(\"test\")\n    return True\n");
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].title, LOGGING_TITLE);
        assert_eq!(suggestions[0].priority, 1);
        assert_eq!(suggestions[0].impact, Impact::High);
        assert_eq!(suggestions[1].title, RETURN_TYPE_TITLE);
        assert_eq!(suggestions[1].priority, 2);
        assert_eq!(suggestions[1].impact, Impact::Medium);
    }

    #[test]
    fn test_clean_function_has_no_suggestions() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Python);
        assert!(analyzer.analyze("def add(a: int, b: int) -> int:\n    return a + b\n").is_empty());
    }

    #[test]
    fn test_only_annotation_rule() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Python);
        let suggestions = analyzer.analyze("def add(a, b):\n    return a + b\n");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].priority, 2);
    }

    #[test]
    fn test_print_inside_string_is_ignored() {
        // A textual scan for "print(" would fire here.
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Python);
        let suggestions = analyzer.analyze("def f() -> str:\n    return 'print(x)'\n");
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_unparsable_source_is_empty() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Python);
        assert!(analyzer.analyze("def (:\n").is_empty());
    }

    #[test]
    fn test_java_constructor_not_flagged() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Java);
        let suggestions = analyzer.analyze("class A {\n  A() {}\n  int one() { return 1; }\n}\n");
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_typescript_constructor_not_flagged() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::TypeScript);
        let suggestions =
            analyzer.analyze("class A {\n  constructor(x: number) {}\n  one(): number { return 1; }\n}\n");
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_typescript_arrow_without_return_type() {
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::TypeScript);
        let suggestions = analyzer.analyze("const double = (a: number) => a * 2;\n");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, RETURN_TYPE_TITLE);
        assert!(suggestions[0].description.contains("double"));
    }

    #[test]
    fn test_uses_shared_cache() {
        let cache = Arc::new(SourceCache::new(8));
        let analyzer = LocalHeuristicAnalyzer::new(SourceLanguage::Go).with_cache(Arc::clone(&cache));
        let source = "package main\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";
        let first = analyzer.analyze(source);
        let second = analyzer.analyze(source);
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 1);
        // `main` has no result type, so both rules fire.
        assert_eq!(first.len(), 2);
    }
}
