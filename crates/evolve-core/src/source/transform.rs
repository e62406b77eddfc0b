//! Textual rewrites over a parsed [`SourceModel`].
//!
//! Every rewrite is expressed as a set of byte-range edits against the
//! original text. The edited text is parsed again before it is returned, so a
//! caller only ever receives syntactically valid source.

use std::ops::Range;

use tracing::debug;
use tree_sitter::Node;

use crate::errors::{EvolveError, EvolveResult};
use crate::models::Suggestion;
use crate::source::language::SourceLanguage;
use crate::source::model::{dedent, definition_name, node_text, walk_preorder, SourceModel};

struct TextEdit {
    range: Range<usize>,
    replacement: String,
}

impl TextEdit {
    fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }
}

/// Apply non-overlapping edits back to front so earlier offsets stay valid.
fn apply_edits(source: &str, mut edits: Vec<TextEdit>) -> String {
    edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    let mut out = source.to_string();
    for edit in edits {
        out.replace_range(edit.range, &edit.replacement);
    }
    out
}

/// Re-parse the rewritten text; only well-formed output leaves this module.
fn validated(language: SourceLanguage, text: String) -> EvolveResult<String> {
    SourceModel::parse(language, text.as_str())?;
    Ok(text)
}

fn find_definition_node<'t>(model: &'t SourceModel, name: &str) -> Option<Node<'t>> {
    let kinds = model.language().definition_kinds();
    let source = model.source();
    let mut found = None;
    walk_preorder(model.tree().root_node(), |node| {
        if found.is_none()
            && kinds.contains(&node.kind())
            && definition_name(node).is_some_and(|n| node_text(n, source) == name)
        {
            found = Some(node);
        }
    });
    found
}

fn lookup<'a>(param_types: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    param_types
        .iter()
        .find(|(param, _)| *param == name)
        .map(|(_, ty)| *ty)
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```python) on the opening line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim_end()
}

// ---------------------------------------------------------------------------
// Output calls -> structured logging
// ---------------------------------------------------------------------------

/// Replace every print-equivalent callee with the language's logging callee.
pub fn convert_output_to_logging(model: &SourceModel) -> EvolveResult<String> {
    let language = model.language();
    let edits: Vec<TextEdit> = model
        .find_unstructured_output_calls()
        .iter()
        .map(|call| TextEdit::replace(call.callee_range.clone(), language.logging_callee(&call.callee)))
        .collect();
    if edits.is_empty() {
        return Ok(model.source().to_string());
    }
    debug!(count = edits.len(), %language, "rewriting output calls");
    validated(language, apply_edits(model.source(), edits))
}

// ---------------------------------------------------------------------------
// Type annotations
// ---------------------------------------------------------------------------

fn python_annotation_edits(
    params: Node<'_>,
    source: &str,
    param_types: &[(&str, &str)],
) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "identifier" => {
                if let Some(ty) = lookup(param_types, node_text(param, source)) {
                    edits.push(TextEdit::insert(param.end_byte(), format!(": {ty}")));
                }
            }
            "default_parameter" => {
                let (Some(name), Some(value)) = (
                    param.child_by_field_name("name"),
                    param.child_by_field_name("value"),
                ) else {
                    continue;
                };
                let name_text = node_text(name, source);
                if let Some(ty) = lookup(param_types, name_text) {
                    edits.push(TextEdit::replace(
                        param.byte_range(),
                        format!("{name_text}: {ty} = {}", node_text(value, source)),
                    ));
                }
            }
            _ => {}
        }
    }
    edits
}

fn typescript_annotation_edits(
    params: Node<'_>,
    source: &str,
    param_types: &[(&str, &str)],
) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if !matches!(param.kind(), "required_parameter" | "optional_parameter") {
            continue;
        }
        if param.child_by_field_name("type").is_some() {
            continue;
        }
        let Some(pattern) = param.child_by_field_name("pattern") else {
            continue;
        };
        if let Some(ty) = lookup(param_types, node_text(pattern, source)) {
            // Optional parameters carry their `?` after the pattern.
            let at = if param.kind() == "optional_parameter" {
                let mut inner = param.walk();
                let marker = param
                    .children(&mut inner)
                    .find(|child| child.kind() == "?")
                    .map(|child| child.end_byte());
                marker.unwrap_or(pattern.end_byte())
            } else {
                pattern.end_byte()
            };
            edits.push(TextEdit::insert(at, format!(": {ty}")));
        }
    }
    edits
}

/// Add or replace the return annotation of `function` and annotate any
/// listed parameters that have no annotation yet.
///
/// Go parameters are always typed, so only the result type is touched there.
/// Java declarations always carry a type and are not supported.
pub fn annotate_return_type(
    model: &SourceModel,
    function: &str,
    param_types: &[(&str, &str)],
    return_type: &str,
) -> EvolveResult<String> {
    let language = model.language();
    if language == SourceLanguage::Java {
        return Err(EvolveError::UnsupportedTransform(
            "java declarations always carry a return type".to_string(),
        ));
    }
    let source = model.source();
    let node = find_definition_node(model, function)
        .ok_or_else(|| EvolveError::UnknownDefinition(function.to_string()))?;
    let params = node.child_by_field_name("parameters").ok_or_else(|| {
        EvolveError::UnsupportedTransform(format!("'{function}' has no parameter list"))
    })?;

    let mut edits = match language {
        SourceLanguage::Python => python_annotation_edits(params, source, param_types),
        SourceLanguage::TypeScript => typescript_annotation_edits(params, source, param_types),
        _ => {
            if !param_types.is_empty() {
                debug!(%function, "ignoring parameter types for go definition");
            }
            Vec::new()
        }
    };

    let (field, separator) = match language {
        SourceLanguage::Python => ("return_type", " -> "),
        SourceLanguage::TypeScript => ("return_type", ": "),
        _ => ("result", " "),
    };
    match node.child_by_field_name(field) {
        Some(existing) if language == SourceLanguage::TypeScript => {
            edits.push(TextEdit::replace(existing.byte_range(), format!(": {return_type}")));
        }
        Some(existing) => edits.push(TextEdit::replace(existing.byte_range(), return_type)),
        None => edits.push(TextEdit::insert(
            params.end_byte(),
            format!("{separator}{return_type}"),
        )),
    }

    validated(language, apply_edits(source, edits))
}

// ---------------------------------------------------------------------------
// Definition splicing
// ---------------------------------------------------------------------------

/// Indent every line after the first by `column` spaces.
fn reindent(text: &str, column: usize) -> String {
    let pad = " ".repeat(column);
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.lines().enumerate() {
        if index > 0 {
            out.push('\n');
            if !line.trim().is_empty() {
                out.push_str(&pad);
            }
        }
        out.push_str(line);
    }
    out
}

/// Replace the definition named `function` with `replacement`.
pub fn splice_definition(
    model: &SourceModel,
    function: &str,
    replacement: &str,
) -> EvolveResult<String> {
    let definition = model
        .definition(function)
        .ok_or_else(|| EvolveError::UnknownDefinition(function.to_string()))?;
    let body = dedent(strip_code_fence(replacement));
    let text = reindent(body.trim_end(), definition.column);
    let edits = vec![TextEdit::replace(definition.byte_range.clone(), text)];
    validated(model.language(), apply_edits(model.source(), edits))
}

/// Splice the first definition in the suggestion's code sample whose name
/// also exists in `model`.
pub fn apply_suggestion(model: &SourceModel, suggestion: &Suggestion) -> EvolveResult<String> {
    let sample = dedent(strip_code_fence(&suggestion.code_sample));
    let proposal = SourceModel::parse(model.language(), sample.as_str()).map_err(|_| {
        EvolveError::UnsupportedTransform(format!(
            "code sample of '{}' does not parse",
            suggestion.title
        ))
    })?;
    let target = proposal
        .find_definitions()
        .iter()
        .find(|def| model.definition(&def.name).is_some())
        .ok_or_else(|| {
            EvolveError::UnsupportedTransform(format!(
                "code sample of '{}' redefines nothing in the source",
                suggestion.title
            ))
        })?;
    splice_definition(model, &target.name, &proposal.source()[target.byte_range.clone()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python(source: &str) -> SourceModel {
        SourceModel::parse(SourceLanguage::Python, source).unwrap()
    }

    #[test]
    fn test_add_type_hints_python() {
        let model = python("\ndef test_function(a, b):\n    return a + b\n");
        let out = annotate_return_type(&model, "test_function", &[("a", "int"), ("b", "int")], "int")
            .unwrap();
        assert!(out.contains("def test_function(a: int, b: int) -> int:"), "{out}");
    }

    #[test]
    fn test_add_type_hints_default_parameter() {
        let model = python("def greet(name='World'):\n    return name\n");
        let out = annotate_return_type(&model, "greet", &[("name", "str")], "str").unwrap();
        assert!(out.contains("def greet(name: str = 'World') -> str:"), "{out}");
    }

    #[test]
    fn test_replace_existing_return_type() {
        let model = python("def f(x) -> int:\n    return str(x)\n");
        let out = annotate_return_type(&model, "f", &[], "str").unwrap();
        assert!(out.starts_with("def f(x) -> str:"), "{out}");
    }

    #[test]
    fn test_annotate_unknown_function() {
        let model = python("def f():\n    pass\n");
        assert!(matches!(
            annotate_return_type(&model, "g", &[], "None"),
            Err(EvolveError::UnknownDefinition(_))
        ));
    }

    #[test]
    fn test_annotate_typescript_and_go() {
        let ts = SourceModel::parse(
            SourceLanguage::TypeScript,
            "function greet(name, title?) {\n  return name;\n}\n",
        )
        .unwrap();
        let out = annotate_return_type(&ts, "greet", &[("name", "string"), ("title", "string")], "string")
            .unwrap();
        assert!(out.contains("function greet(name: string, title?: string): string {"), "{out}");

        let go = SourceModel::parse(SourceLanguage::Go, "package main\n\nfunc answer() {\n}\n").unwrap();
        let out = annotate_return_type(&go, "answer", &[], "int").unwrap();
        assert!(out.contains("func answer() int {"), "{out}");
    }

    #[test]
    fn test_annotate_typescript_arrow() {
        let ts = SourceModel::parse(SourceLanguage::TypeScript, "const double = (a) => a * 2;\n").unwrap();
        let out = annotate_return_type(&ts, "double", &[("a", "number")], "number").unwrap();
        assert!(out.contains("const double = (a: number): number => a * 2;"), "{out}");
    }

    #[test]
    fn test_annotate_java_unsupported() {
        let java =
            SourceModel::parse(SourceLanguage::Java, "class A {\n  void run() {}\n}\n").unwrap();
        assert!(matches!(
            annotate_return_type(&java, "run", &[], "int"),
            Err(EvolveError::UnsupportedTransform(_))
        ));
    }

    #[test]
    fn test_convert_print_to_logging() {
        let model = python("\ndef test_function():\n    print('test')\n");
        let out = convert_output_to_logging(&model).unwrap();
        assert!(out.contains("logging.info('test')"), "{out}");
        assert!(!out.contains("print("));
    }

    #[test]
    fn test_convert_nested_prints() {
        let model = python("def f(x):\n    print(x, print(x))\n");
        let out = convert_output_to_logging(&model).unwrap();
        assert!(out.contains("logging.info(x, logging.info(x))"), "{out}");
    }

    #[test]
    fn test_convert_go_and_java() {
        let go = SourceModel::parse(
            SourceLanguage::Go,
            "package main\n\nfunc main() {\n\tfmt.Printf(\"%d\", 1)\n}\n",
        )
        .unwrap();
        assert!(convert_output_to_logging(&go).unwrap().contains("log.Printf(\"%d\", 1)"));

        let java = SourceModel::parse(
            SourceLanguage::Java,
            "class A {\n  void run() {\n    System.out.println(\"x\");\n  }\n}\n",
        )
        .unwrap();
        assert!(convert_output_to_logging(&java).unwrap().contains("logger.info(\"x\");"));
    }

    #[test]
    fn test_convert_without_prints_is_identity() {
        let source = "def f():\n    return 1\n";
        assert_eq!(convert_output_to_logging(&python(source)).unwrap(), source);
    }

    #[test]
    fn test_splice_keeps_indentation() {
        let source = "class Greeter:\n    def greet(self):\n        print('hi')\n\n    def other(self):\n        pass\n";
        let model = python(source);
        let out = splice_definition(
            &model,
            "greet",
            "def greet(self) -> None:\n    logging.info('hi')\n",
        )
        .unwrap();
        assert!(out.contains("    def greet(self) -> None:\n        logging.info('hi')\n"), "{out}");
        assert!(out.contains("    def other(self):"));
    }

    #[test]
    fn test_splice_invalid_replacement_is_parse_error() {
        let model = python("def f():\n    return 1\n");
        assert!(matches!(
            splice_definition(&model, "f", "def f(:\n    return"),
            Err(EvolveError::Parse { .. })
        ));
    }

    #[test]
    fn test_apply_suggestion_from_fenced_sample() {
        let model = python("import os\n\ndef add(a, b):\n    print(a + b)\n    return a + b\n");
        let suggestion = Suggestion::new("Typed add", "").with_code_sample(
            "```python\nimport logging\n\ndef add(a: int, b: int) -> int:\n    logging.info(a + b)\n    return a + b\n```",
        );
        let out = apply_suggestion(&model, &suggestion).unwrap();
        assert!(out.starts_with("import os\n\ndef add(a: int, b: int) -> int:"), "{out}");
        // Only the definition is spliced, not the sample's imports.
        assert!(!out.contains("import logging"));
    }

    #[test]
    fn test_apply_suggestion_unrelated_sample() {
        let model = python("def add(a, b):\n    return a + b\n");
        let suggestion =
            Suggestion::new("Other", "").with_code_sample("def sub(a, b):\n    return a - b\n");
        assert!(matches!(
            apply_suggestion(&model, &suggestion),
            Err(EvolveError::UnsupportedTransform(_))
        ));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fence("  x = 1  "), "x = 1");
    }
}
