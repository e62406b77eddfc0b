//! Grammar selection and per-language node tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{EvolveError, EvolveResult};

/// Languages the source analyzer has a grammar for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    #[default]
    Python,
    TypeScript,
    Go,
    Java,
}

/// Definition node kinds per language.
const PYTHON_DEFINITIONS: &[&str] = &["function_definition"];
const TYPESCRIPT_DEFINITIONS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "method_definition",
    "arrow_function",
    "function_expression",
];
const GO_DEFINITIONS: &[&str] = &["function_declaration", "method_declaration"];
const JAVA_DEFINITIONS: &[&str] = &["method_declaration", "constructor_declaration"];

impl SourceLanguage {
    pub const ALL: [SourceLanguage; 4] = [
        SourceLanguage::Python,
        SourceLanguage::TypeScript,
        SourceLanguage::Go,
        SourceLanguage::Java,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "python",
            SourceLanguage::TypeScript => "typescript",
            SourceLanguage::Go => "go",
            SourceLanguage::Java => "java",
        }
    }

    pub fn from_label(label: &str) -> EvolveResult<SourceLanguage> {
        let normalized = label.trim().to_lowercase();
        SourceLanguage::ALL
            .into_iter()
            .find(|lang| lang.label() == normalized)
            .ok_or_else(|| EvolveError::Config(format!("Unsupported language: {label}")))
    }

    /// Fence tag used when embedding source in a prompt.
    pub fn fence_tag(&self) -> &'static str {
        self.label()
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Go => tree_sitter_go::LANGUAGE.into(),
            SourceLanguage::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    pub fn definition_kinds(&self) -> &'static [&'static str] {
        match self {
            SourceLanguage::Python => PYTHON_DEFINITIONS,
            SourceLanguage::TypeScript => TYPESCRIPT_DEFINITIONS,
            SourceLanguage::Go => GO_DEFINITIONS,
            SourceLanguage::Java => JAVA_DEFINITIONS,
        }
    }

    /// Node kind of a call expression.
    pub fn call_kind(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "call",
            SourceLanguage::TypeScript | SourceLanguage::Go => "call_expression",
            SourceLanguage::Java => "method_invocation",
        }
    }

    /// Whether `callee` (the normalized callee text, e.g. `fmt.Println`) is
    /// this language's print equivalent.
    pub fn is_output_callee(&self, callee: &str) -> bool {
        match self {
            SourceLanguage::Python => callee == "print",
            SourceLanguage::TypeScript => matches!(
                callee,
                "console.log" | "console.info" | "console.warn" | "console.error"
            ),
            SourceLanguage::Go => matches!(callee, "fmt.Print" | "fmt.Println" | "fmt.Printf"),
            SourceLanguage::Java => matches!(
                callee,
                "System.out.print"
                    | "System.out.println"
                    | "System.out.printf"
                    | "System.err.print"
                    | "System.err.println"
                    | "System.err.printf"
            ),
        }
    }

    /// Structured logging callee that replaces an output callee.
    pub fn logging_callee(&self, output_callee: &str) -> String {
        match self {
            SourceLanguage::Python => "logging.info".to_string(),
            SourceLanguage::TypeScript => "logger.info".to_string(),
            // fmt.Println -> log.Println keeps the formatting suffix
            SourceLanguage::Go => output_callee.replacen("fmt.", "log.", 1),
            SourceLanguage::Java => "logger.info".to_string(),
        }
    }

    /// Example shown with the structured-logging suggestion.
    pub fn logging_example(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "import logging\nlogging.info('message')",
            SourceLanguage::TypeScript => "logger.info('message');",
            SourceLanguage::Go => "log.Println(\"message\")",
            SourceLanguage::Java => "logger.info(\"message\");",
        }
    }

    /// Example shown with the return-type suggestion.
    pub fn return_type_example(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "def function() -> str:",
            SourceLanguage::TypeScript => "function fn(): string {",
            SourceLanguage::Go => "func function() string {",
            SourceLanguage::Java => "public String method() {",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Build a tree-sitter parser for `language`.
pub fn new_parser(language: SourceLanguage) -> EvolveResult<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| EvolveError::Config(format!("Failed to set language {language}: {e}")))?;
    Ok(parser)
}
